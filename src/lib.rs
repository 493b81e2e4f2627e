pub mod analysis;
pub mod config;
pub mod dao;
pub mod entities;
pub mod influxdb;
pub mod k8s;
pub mod metrics_buffer;
pub mod migrations;
pub mod openapi;
pub mod pod_spec_cache;
pub mod resource_buffers;
pub mod schedulers;
pub mod server;

use crate::migrations::{Migrator, MigratorTrait};
use anyhow::Context;
use sea_orm::{Database, DatabaseConnection};

pub async fn db_connect(database_url: &str) -> anyhow::Result<DatabaseConnection> {
    Database::connect(database_url)
        .await
        .context(format!("Error connecting to database at {database_url}"))
}

pub async fn db_migrate(db: &DatabaseConnection) -> anyhow::Result<()> {
    Migrator::up(db, None)
        .await
        .context("Error migrating database.")
}
