use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::env;
use std::time::Duration;

/// Resolve the database URL: DATABASE_URL wins, otherwise it is composed from
/// the discrete DB_* variables.
pub fn url_from_env() -> anyhow::Result<String> {
    if let Ok(url) = env::var("DATABASE_URL") {
        return Ok(url);
    }

    let host =
        env::var("DB_HOST").map_err(|_| anyhow::anyhow!("DATABASE_URL or DB_HOST must be set"))?;
    let port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
    let name = env::var("DB_NAME").map_err(|_| anyhow::anyhow!("DB_NAME must be set"))?;
    let user = env::var("DB_USER").map_err(|_| anyhow::anyhow!("DB_USER must be set"))?;
    let password = env::var("DB_PASSWORD").unwrap_or_default();

    Ok(format!(
        "postgres://{}:{}@{}:{}/{}",
        user, password, host, port, name
    ))
}

pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;
    Ok(pool)
}
