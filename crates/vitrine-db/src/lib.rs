pub mod config;
pub mod database;
pub mod export_repository;

pub use config::DatabaseConfig;
pub use database::Database;
pub use export_repository::ExportRecordRepository;
