use sea_orm::{ConnectOptions, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::{debug, info};

use crate::{config::DatabaseConfig, database::migrations::Migrator};

pub mod migrations;
pub mod models;

/// Connects to the job store and, when configured, brings the schema up to date.
pub async fn setup_database(db_config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let connection = setup_database_connection(db_config).await?;

    if db_config.run_migrations {
        Migrator::up(&connection, None).await?;
        info!("✅ Database is ready!");
    }

    Ok(connection)
}

pub async fn setup_database_connection(
    db_config: &DatabaseConfig,
) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(db_config.url.clone());

    options.sqlx_logging(false); // Disable SQL query logging to reduce noise
    options.max_connections(db_config.pool_size);

    debug!("Connecting to database at: {}", &db_config.url);

    sea_orm::Database::connect(options).await
}
