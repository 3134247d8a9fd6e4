use std::sync::Arc;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::warn;

use crate::{
    auth::{
        repo::{PgUserStore, UserStore},
        tokens::{PgTokenStore, TokenStore},
    },
    config::AppConfig,
    items::repo::{ItemStore, PgItemStore},
    mailer::{self, Mailer},
    storage::{DiskStore, ImageStore},
};

/// Shared handles behind every request. The stores are trait objects so
/// tests can swap in in-memory fakes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub items: Arc<dyn ItemStore>,
    pub storage: Arc<dyn ImageStore>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let pool: PgPool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await?;

        // Run migrations if present
        if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
            warn!(error = %e, "migrations folder not found or migration failed; continuing");
        }

        let storage = DiskStore::new(config.images_dir.clone()).await?;
        let mailer = mailer::from_config(&config.mail);

        Ok(Self::from_parts(
            Arc::new(config),
            Arc::new(PgUserStore::new(pool.clone())),
            Arc::new(PgTokenStore::new(pool.clone())),
            Arc::new(PgItemStore::new(pool)),
            Arc::new(storage),
            mailer,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
        items: Arc<dyn ItemStore>,
        storage: Arc<dyn ImageStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            config,
            users,
            tokens,
            items,
            storage,
            mailer,
        }
    }

    /// State backed entirely by in-memory fakes.
    #[cfg(test)]
    pub fn fake() -> Self {
        crate::testing::TestState::new().state
    }
}
