pub use sea_orm_migration::prelude::*;

mod m20251018_090000_create_job_tables;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20251018_090000_create_job_tables::Migration)]
    }
}

pub struct Migrator;
