use std::{future::Future, sync::Arc, time::Duration};

use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::password::PasswordHashing;
use crate::auth::repo::{CredentialStore, StoreError};
use crate::auth::repo_types::Account;
use crate::error::AuthError;

pub const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// How emails are compared for uniqueness and login.
///
/// The default keeps exact-match semantics, so `A@x.com` and `a@x.com` stay
/// distinct accounts unless `EMAIL_CASE_SENSITIVE=false` opts into folding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmailPolicy {
    /// Trim and lowercase before every lookup and insert.
    CaseInsensitive,
    /// Trim only.
    #[default]
    CaseSensitive,
}

impl EmailPolicy {
    pub fn from_case_sensitive(case_sensitive: bool) -> Self {
        if case_sensitive {
            Self::CaseSensitive
        } else {
            Self::CaseInsensitive
        }
    }

    pub fn normalize(self, email: &str) -> String {
        let trimmed = email.trim();
        match self {
            Self::CaseInsensitive => trimmed.to_lowercase(),
            Self::CaseSensitive => trimmed.to_owned(),
        }
    }
}

/// Registration and login over a [`CredentialStore`].
///
/// Stateless between calls; every store call is bounded by `store_timeout`
/// and a timeout surfaces as [`AuthError::Unavailable`]. Nothing is retried.
///
/// An `Unavailable` from [`register`](Self::register) does not mean nothing was
/// written: the insert may have committed after the deadline passed, so a
/// retry can observe [`AuthError::AccountAlreadyExists`].
#[derive(Clone)]
pub struct CredentialService {
    store: Arc<dyn CredentialStore>,
    hashing: PasswordHashing,
    email_policy: EmailPolicy,
    store_timeout: Duration,
}

impl CredentialService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hashing: PasswordHashing,
        email_policy: EmailPolicy,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            hashing,
            email_policy,
            store_timeout,
        }
    }

    #[instrument(skip(self, name, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Account, AuthError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::malformed("Name is required"));
        }
        let email = self.email_policy.normalize(email);
        if !is_valid_email(&email) {
            return Err(AuthError::malformed("Invalid email"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::malformed("Password too short"));
        }

        if self
            .bounded(self.store.find_by_email(&email))
            .await?
            .is_some()
        {
            warn!("registration rejected: email already registered");
            return Err(AuthError::AccountAlreadyExists);
        }

        let hash = self.hash_blocking(password).await?;

        // The store's uniqueness check also catches a racing registration
        // that slipped in after the lookup above.
        let account = match self.bounded(self.store.create(name, &email, &hash)).await {
            Ok(account) => account,
            Err(AuthError::AccountAlreadyExists) => {
                warn!("registration lost race on email uniqueness");
                return Err(AuthError::AccountAlreadyExists);
            }
            Err(e) => return Err(e),
        };

        info!(account_id = %account.id, role = %account.role, "account registered");
        Ok(account)
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Account, AuthError> {
        let email = self.email_policy.normalize(email);
        if !is_valid_email(&email) {
            return Err(AuthError::malformed("Invalid email"));
        }
        if password.is_empty() {
            return Err(AuthError::malformed("Password is required"));
        }

        let Some(account) = self.bounded(self.store.find_by_email(&email)).await? else {
            // keep the unknown-email path as slow as a wrong password
            self.verify_dummy_blocking(password).await;
            warn!("login failed");
            return Err(AuthError::InvalidCredentials);
        };

        if !self
            .verify_blocking(password, &account.password_hash)
            .await?
        {
            warn!(account_id = %account.id, "login failed");
            return Err(AuthError::InvalidCredentials);
        }

        info!(account_id = %account.id, "account logged in");
        Ok(account)
    }

    /// Loads an account referenced by a previously issued token.
    #[instrument(skip(self))]
    pub async fn account(&self, id: Uuid) -> Result<Account, AuthError> {
        self.bounded(self.store.find_by_id(id))
            .await?
            .ok_or(AuthError::InvalidCredentials)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, AuthError> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result.map_err(AuthError::from),
            Err(_) => {
                warn!(timeout_ms = self.store_timeout.as_millis() as u64, "store call timed out");
                Err(AuthError::Unavailable(format!(
                    "store call exceeded {}ms",
                    self.store_timeout.as_millis()
                )))
            }
        }
    }

    async fn hash_blocking(&self, password: &str) -> Result<String, AuthError> {
        let hashing = self.hashing.clone();
        let password = password.to_owned();
        let hash = tokio::task::spawn_blocking(move || hashing.hash(&password))
            .await
            .context("password hashing task failed")??;
        Ok(hash)
    }

    async fn verify_blocking(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let hashing = self.hashing.clone();
        let password = password.to_owned();
        let hash = hash.to_owned();
        let ok = tokio::task::spawn_blocking(move || hashing.verify(&password, &hash))
            .await
            .context("password verification task failed")??;
        Ok(ok)
    }

    async fn verify_dummy_blocking(&self, password: &str) {
        let hashing = self.hashing.clone();
        let password = password.to_owned();
        let _ = tokio::task::spawn_blocking(move || hashing.verify_dummy(&password)).await;
    }
}
