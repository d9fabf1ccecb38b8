use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr, SqlErr};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use super::migrations::Migrator;
use crate::config::DatabaseConfig;
use crate::domain::error::DomainError;

/// Map a storage error, keeping uniqueness violations distinguishable.
pub(crate) fn db_err<'a>(
    operation: &'static str,
    target: &'a str,
) -> impl FnOnce(DbErr) -> DomainError + 'a {
    move |e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(message)) => DomainError::ConstraintViolation {
            operation,
            target: target.to_owned(),
            message,
        },
        _ => DomainError::database(operation, target, e),
    }
}

/// Open the registry database and bring its schema up to date when asked to.
///
/// # Errors
/// Returns an error if the connection or a migration fails.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.dsn.clone());
    options.sqlx_logging(false);
    // Every pooled connection to an in-memory SQLite DSN would otherwise see
    // its own empty database.
    if config.dsn.starts_with("sqlite") && config.dsn.contains(":memory:") {
        options.max_connections(1);
    }

    let db = Database::connect(options).await?;
    if config.run_migrations {
        Migrator::up(&db, None).await?;
        info!("Services registry schema is up to date");
    }
    Ok(db)
}
