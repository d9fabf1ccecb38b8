use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let conn = manager.get_connection();

        let sql = match backend {
            sea_orm::DatabaseBackend::Postgres => {
                r"
CREATE TABLE IF NOT EXISTS services (
    id BIGSERIAL PRIMARY KEY NOT NULL,
    name VARCHAR(256) NOT NULL,
    type VARCHAR(256) NOT NULL,
    auth_consumer_id VARCHAR(64) NULL,
    last_heartbeat TIMESTAMPTZ NOT NULL,
    config JSONB NOT NULL,
    sig BYTEA NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_services_name ON services(name);
CREATE INDEX IF NOT EXISTS idx_services_type ON services(type);
CREATE INDEX IF NOT EXISTS idx_services_last_heartbeat ON services(last_heartbeat);
CREATE INDEX IF NOT EXISTS idx_services_auth_consumer ON services(auth_consumer_id);

CREATE TABLE IF NOT EXISTS workers (
    id VARCHAR(64) PRIMARY KEY NOT NULL,
    name VARCHAR(256) NOT NULL,
    hatchery_id BIGINT NOT NULL,
    status VARCHAR(64) NOT NULL,
    last_beat TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_workers_hatchery ON workers(hatchery_id);

CREATE TABLE IF NOT EXISTS auth_consumers (
    id VARCHAR(64) PRIMARY KEY NOT NULL,
    name VARCHAR(256) NOT NULL,
    created TIMESTAMPTZ NOT NULL
);
                "
            }
            sea_orm::DatabaseBackend::MySql => {
                r"
CREATE TABLE IF NOT EXISTS services (
    id BIGINT AUTO_INCREMENT PRIMARY KEY NOT NULL,
    name VARCHAR(256) NOT NULL,
    type VARCHAR(256) NOT NULL,
    auth_consumer_id VARCHAR(64) NULL,
    last_heartbeat TIMESTAMP(6) NOT NULL,
    config JSON NOT NULL,
    sig VARBINARY(64) NOT NULL,
    UNIQUE KEY idx_services_name (name),
    KEY idx_services_type (type),
    KEY idx_services_last_heartbeat (last_heartbeat),
    KEY idx_services_auth_consumer (auth_consumer_id)
);

CREATE TABLE IF NOT EXISTS workers (
    id VARCHAR(64) PRIMARY KEY NOT NULL,
    name VARCHAR(256) NOT NULL,
    hatchery_id BIGINT NOT NULL,
    status VARCHAR(64) NOT NULL,
    last_beat TIMESTAMP(6) NOT NULL,
    KEY idx_workers_hatchery (hatchery_id)
);

CREATE TABLE IF NOT EXISTS auth_consumers (
    id VARCHAR(64) PRIMARY KEY NOT NULL,
    name VARCHAR(256) NOT NULL,
    created TIMESTAMP(6) NOT NULL
);
                "
            }
            sea_orm::DatabaseBackend::Sqlite => {
                r"
CREATE TABLE IF NOT EXISTS services (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    auth_consumer_id TEXT NULL,
    last_heartbeat TEXT NOT NULL,
    config TEXT NOT NULL,
    sig BLOB NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_services_name ON services(name);
CREATE INDEX IF NOT EXISTS idx_services_type ON services(type);
CREATE INDEX IF NOT EXISTS idx_services_last_heartbeat ON services(last_heartbeat);
CREATE INDEX IF NOT EXISTS idx_services_auth_consumer ON services(auth_consumer_id);

CREATE TABLE IF NOT EXISTS workers (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    hatchery_id INTEGER NOT NULL,
    status TEXT NOT NULL,
    last_beat TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_workers_hatchery ON workers(hatchery_id);

CREATE TABLE IF NOT EXISTS auth_consumers (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    created TEXT NOT NULL
);
                "
            }
        };

        conn.execute_unprepared(sql).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        let sql = "DROP TABLE IF EXISTS auth_consumers; \
                   DROP TABLE IF EXISTS workers; \
                   DROP TABLE IF EXISTS services;";
        conn.execute_unprepared(sql).await?;
        Ok(())
    }
}
