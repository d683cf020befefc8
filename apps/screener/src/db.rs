use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates a PostgreSQL connection pool without connecting yet.
/// Connections are opened on first use so the service can start while the database is down.
pub fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect_lazy(database_url)?;

    info!("PostgreSQL pool configured (lazy connect)");
    Ok(pool)
}

/// Creates the `shortlisted` table if it does not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS shortlisted (
            id SERIAL PRIMARY KEY,
            candidate_name TEXT NOT NULL,
            skills TEXT NOT NULL,
            experience INTEGER NOT NULL,
            resume_file TEXT NOT NULL,
            match_percentage INTEGER NOT NULL,
            phone_number TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Schema for `shortlisted` is ready");
    Ok(())
}
