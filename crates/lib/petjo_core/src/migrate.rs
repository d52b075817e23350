//! Database migration support.
//!
//! Embeds and runs the SQL migrations from `petjo_core/migrations/`: the
//! `users` table and the revocation tables.

use sqlx::PgPool;
use tracing::info;

/// Run all embedded database migrations against the given pool.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    let migrator = sqlx::migrate!("./migrations");
    migrator.run(pool).await?;
    info!(count = migrator.iter().count(), "database migrations applied");
    Ok(())
}
