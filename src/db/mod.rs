pub mod entities;
pub mod services;
pub mod writer;

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement,
};
use std::time::Duration;
use tracing::info;

const SCHEMA_SQL: &str = include_str!("../../migrations/20250101000000_create_websites.sql");

pub async fn connect(database_url: &str, max_connections: u32) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(max_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(opt).await
}

/// Creates the monitoring tables if they do not exist yet.
pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.execute_unprepared(SCHEMA_SQL).await?;
    info!("Database schema is up to date.");
    Ok(())
}

pub async fn log_server_version(db: &DatabaseConnection) -> Result<(), DbErr> {
    let row = db
        .query_one(Statement::from_string(
            db.get_database_backend(),
            "SELECT version() AS version",
        ))
        .await?;
    match row {
        Some(row) => {
            let version: String = row.try_get("", "version")?;
            info!(version = %version, "Connected to database.");
        }
        None => info!("Connected to database, server version unavailable."),
    }
    Ok(())
}
