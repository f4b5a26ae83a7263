use anyhow::Result;
use sea_orm::{Database, DatabaseConnection};
use sqlx::migrate::Migrator;

/// Versioned migrations from `migrations/`, embedded at build time and
/// tracked in `_sqlx_migrations`.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Create a SeaORM connection.
pub async fn create_orm_conn(database_url: &str) -> Result<DatabaseConnection> {
    let conn = Database::connect(database_url).await?;
    Ok(conn)
}

/// Apply pending migrations on the pool underneath the SeaORM connection.
pub async fn run_migrations(conn: &DatabaseConnection) -> Result<()> {
    MIGRATOR.run(conn.get_postgres_connection_pool()).await?;
    Ok(())
}
