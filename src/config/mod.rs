/// Database connection, table creation and read retries
pub mod database;

/// Secret provider for the attendance token key
pub mod secrets;

/// Settings loading from config.toml
pub mod settings;
