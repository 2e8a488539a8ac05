use std::{sync::Arc, time::Duration};

use sqlx::PgPool;
use tracing::info;

use crate::auth::{
    jwt::JwtKeys,
    memory::MemoryCredentialStore,
    password::PasswordHashing,
    repo::{CredentialStore, PgCredentialStore},
    services::{CredentialService, EmailPolicy},
};
use crate::config::{AppConfig, StoreBackend};
use crate::db;

/// Shared per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub credentials: Arc<CredentialService>,
    pub keys: JwtKeys,
    pub db: Option<PgPool>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let (store, db): (Arc<dyn CredentialStore>, Option<PgPool>) = match config.store_backend {
            StoreBackend::Postgres => {
                let pool = db::connect(&config).await?;
                db::migrate(&pool).await?;
                (Arc::new(PgCredentialStore::new(pool.clone())), Some(pool))
            }
            StoreBackend::Memory => {
                info!("using in-memory credential store; accounts are lost on restart");
                (Arc::new(MemoryCredentialStore::new()), None)
            }
        };
        Self::from_parts(config, store, db)
    }

    pub fn from_parts(
        config: AppConfig,
        store: Arc<dyn CredentialStore>,
        db: Option<PgPool>,
    ) -> anyhow::Result<Self> {
        let hashing = PasswordHashing::new(config.password_hash)?;
        let credentials = CredentialService::new(
            store,
            hashing,
            EmailPolicy::from_case_sensitive(config.email_case_sensitive),
            Duration::from_millis(config.store_timeout_ms),
        );
        let keys = JwtKeys::from(&config.jwt);
        Ok(Self {
            config: Arc::new(config),
            credentials: Arc::new(credentials),
            keys,
            db,
        })
    }

    /// Releases the pool, if any. Called once the server has stopped accepting requests.
    pub async fn shutdown(&self) {
        if let Some(db) = &self.db {
            db.close().await;
            info!("database pool closed");
        }
    }
}
