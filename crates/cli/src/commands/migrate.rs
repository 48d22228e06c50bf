//! Database migration command.
//!
//! Migrations live in `crates/server/migrations/` and are embedded in the server
//! library, so this binary and `barberly-server --migrate` always agree.

/// Apply pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    tracing::info!("Running migrations...");
    barberly_server::db::run_migrations(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
