//! Persistence layer: sqlx models and repositories for the canvas engine.
//!
//! Repositories are zero-sized structs with async methods taking `&PgPool`
//! (or an open transaction for the mutation paths driven by the execution
//! engine). SQL is runtime-checked `query_as`; migrations live under
//! `db/migrations` at the repository root.

pub mod models;
pub mod repositories;

/// Convenience alias used across the workspace.
pub type DbPool = sqlx::PgPool;

/// Create a connection pool with sensible defaults.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
