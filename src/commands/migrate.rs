use std::cmp;

use sea_orm::{DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;

use crate::{
    boot::BootError,
    cli::MigrateAction,
    config::Config,
    database::{migrations::Migrator, setup_database_connection},
};

pub async fn handle_migrate_command(config: &Config, action: MigrateAction) -> Result<(), BootError> {
    // Plain connection, migrations are driven by the action below
    let db = setup_database_connection(&config.database).await?;

    handle_migration_command(&db, action).await.map_err(|e| {
        eprintln!("❌ Migration failed: {e}");
        BootError::from(e)
    })
}

pub async fn handle_migration_command(
    db: &DatabaseConnection,
    action: MigrateAction,
) -> Result<(), DbErr> {
    match action {
        MigrateAction::Up { steps } => {
            let pending = Migrator::get_pending_migrations(db).await?;

            if pending.is_empty() {
                println!("✅ All migrations are already up to date");
                return Ok(());
            }

            let count = steps.map_or(pending.len(), |steps| {
                cmp::min(steps as usize, pending.len())
            });
            println!("Running {count} migration(s) up:");
            for migration in &pending[..count] {
                println!("  📄 {}", migration.name());
            }
            println!();

            Migrator::up(db, steps).await?;
            println!("✅ Migrations completed successfully");
        }
        MigrateAction::Down { steps } => {
            let applied = Migrator::get_applied_migrations(db).await?;

            if applied.is_empty() {
                println!("❌ No migrations to roll back");
                return Ok(());
            }

            let count = cmp::min(steps as usize, applied.len());
            println!("Rolling back {count} migration(s):");
            for migration in applied[applied.len() - count..].iter().rev() {
                println!("  📄 {}", migration.name());
            }
            println!();

            Migrator::down(db, Some(steps)).await?;
            println!("✅ Rollback completed successfully");
        }
        MigrateAction::Status => {
            let pending = Migrator::get_pending_migrations(db).await?;
            if pending.is_empty() {
                println!("✅ All migrations are up to date");
            } else {
                println!("📋 Pending migrations:");
                for migration in pending {
                    println!("  - {}", migration.name());
                }
            }

            let applied = Migrator::get_applied_migrations(db).await?;
            println!("📋 Applied migrations:");
            for migration in applied {
                println!("  ✓ {}", migration.name());
            }
        }
        MigrateAction::Reset => {
            println!("🔄 Resetting job tables (execution logs are dropped too)...");

            let applied = Migrator::get_applied_migrations(db).await?;
            let num_applied = u32::try_from(applied.len())
                .map_err(|_| DbErr::Custom("Too many migrations to reset".to_string()))?;

            if num_applied > 0 {
                Migrator::down(db, Some(num_applied)).await?;
                println!("✅ Rolled back {num_applied} migration(s)");
            }

            Migrator::up(db, None).await?;
            println!("✅ Database reset completed successfully");
        }
    }

    Ok(())
}
