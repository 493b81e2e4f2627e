pub mod m20250612_101500_create_inventory_tables;
pub mod m20250612_101510_create_history_tables;
pub mod m20250612_101520_create_timeseries_tables;

pub use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250612_101500_create_inventory_tables::Migration),
            Box::new(m20250612_101510_create_history_tables::Migration),
            Box::new(m20250612_101520_create_timeseries_tables::Migration),
        ]
    }
}
