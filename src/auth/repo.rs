use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::repo_types::{Account, AccountRow, Role};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("an account with this email already exists")]
    DuplicateEmail,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(sqlx::Error),
}

/// Persistence for accounts. `create` must enforce email uniqueness atomically.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Exact-match lookup.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Insert a new account with a fresh id and the default role.
    async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Account, StoreError>;
}

/// Builds the record `create` persists.
pub(crate) fn new_account(name: &str, email: &str, password_hash: &str) -> Account {
    Account {
        id: Uuid::new_v4(),
        name: name.to_owned(),
        email: email.to_owned(),
        password_hash: password_hash.to_owned(),
        role: Role::default(),
        created_at: OffsetDateTime::now_utc(),
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            return StoreError::DuplicateEmail;
        }
        let unavailable = matches!(
            err,
            sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::WorkerCrashed
        );
        if unavailable {
            return StoreError::Unavailable(err.to_string());
        }
        if matches!(err, sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_)) {
            return StoreError::Corrupt(err.to_string());
        }
        StoreError::Database(err)
    }
}

/// Postgres-backed store. Uniqueness is enforced by `accounts_email_key`.
#[derive(Clone)]
pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, name, email, password_hash, role, created_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        row.map(Account::try_from)
            .transpose()
            .map_err(StoreError::Corrupt)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, name, email, password_hash, role, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(Account::try_from)
            .transpose()
            .map_err(StoreError::Corrupt)
    }

    async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Account, StoreError> {
        let account = new_account(name, email, password_hash);
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO accounts (id, name, email, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, email, password_hash, role, created_at
            "#,
        )
        .bind(account.id)
        .bind(&account.name)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(account.created_at)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            let err = StoreError::from(e);
            if matches!(err, StoreError::DuplicateEmail) {
                warn!("insert rejected by unique email constraint");
            }
            err
        })?;
        debug!(account_id = %row.id, "account row inserted");
        Account::try_from(row).map_err(StoreError::Corrupt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::{borrow::Cow, error::Error as StdError, fmt};

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn unique_violation_maps_to_duplicate_email() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));
        assert!(matches!(StoreError::from(err), StoreError::DuplicateEmail));
    }

    #[test]
    fn other_database_errors_pass_through() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("99999"),
        }));
        assert!(!is_unique_violation(&err));
        assert!(matches!(StoreError::from(err), StoreError::Database(_)));
    }

    #[test]
    fn pool_timeout_is_unavailable() {
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn new_account_gets_default_role_and_fresh_id() {
        let a = new_account("A", "a@x.com", "h");
        let b = new_account("A", "a@x.com", "h");
        assert_eq!(a.role, Role::User);
        assert_ne!(a.id, b.id);
    }
}
