use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::auth::repo::{new_account, CredentialStore, StoreError};
use crate::auth::repo_types::Account;

/// In-process store keyed by email. Used by tests and `STORE_BACKEND=memory`.
#[derive(Default)]
pub struct MemoryCredentialStore {
    accounts: RwLock<HashMap<String, Account>>, // email -> account
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.read().await.get(email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().find(|a| a.id == id).cloned())
    }

    async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Account, StoreError> {
        // check and insert under one write lock
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(email) {
            return Err(StoreError::DuplicateEmail);
        }
        let account = new_account(name, email, password_hash);
        accounts.insert(email.to_owned(), account.clone());
        debug!(account_id = %account.id, total = accounts.len(), "account stored in memory");
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn create_then_find() {
        let store = MemoryCredentialStore::new();
        let created = store.create("Ada", "ada@x.com", "hash").await.unwrap();
        let by_email = store.find_by_email("ada@x.com").await.unwrap().unwrap();
        let by_id = store.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        assert_eq!(by_id.email, "ada@x.com");
    }

    #[tokio::test]
    async fn lookup_is_exact_match() {
        let store = MemoryCredentialStore::new();
        store.create("Ada", "ada@x.com", "hash").await.unwrap();
        assert!(store.find_by_email("ADA@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryCredentialStore::new();
        store.create("Ada", "ada@x.com", "h1").await.unwrap();
        let err = store.create("Other", "ada@x.com", "h2").await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_leave_one_row() {
        let store = Arc::new(MemoryCredentialStore::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.create(&format!("n{i}"), "race@x.com", "h").await
                })
            })
            .collect();

        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(StoreError::DuplicateEmail) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.len().await, 1);
    }
}
