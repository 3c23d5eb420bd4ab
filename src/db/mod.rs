use crate::config::Config;
use sqlx::postgres::{PgPool, PgPoolOptions};

pub mod models;

pub async fn create_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
}
