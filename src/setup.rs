use sqlx::{postgres::PgPoolOptions, Executor, Pool, Postgres};

use crate::{config::DatabaseConfig, error::QueryError};

const SCHEMA: &str = include_str!("../schema.sql");

pub async fn connect(config: &DatabaseConfig) -> Result<Pool<Postgres>, potion::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
        .map_err(QueryError::from)?;

    log::info!(
        "Connected to database with up to {} connections",
        config.max_connections
    );

    Ok(pool)
}

/// Creates every table, type and constraint the SDK relies on. Safe to run
/// against an already initialised database.
pub async fn install_schema(pool: &Pool<Postgres>) -> Result<(), potion::Error> {
    pool.execute(SCHEMA).await.map_err(QueryError::from)?;
    log::info!("Database schema installed");

    Ok(())
}
