pub use sea_orm_migration::prelude::*;

mod m20251120_000001_create_strategy_tables;
mod m20251124_000001_add_strategy_status_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251120_000001_create_strategy_tables::Migration),
            Box::new(m20251124_000001_add_strategy_status_indexes::Migration),
        ]
    }
}
