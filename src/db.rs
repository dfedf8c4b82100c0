use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::error::{HistoryError, Result};

fn build_connect_options(db_path: &str) -> SqliteConnectOptions {
    use sqlx::ConnectOptions;

    let mut options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);

    options = options.log_statements(log::LevelFilter::Debug);

    options
}

pub async fn create_pool(db_path: &str) -> Result<Pool<Sqlite>> {
    if db_path.is_empty() {
        return Err(HistoryError::Configuration(
            "Database file path is required".to_string(),
        ));
    }

    let options = build_connect_options(db_path);

    SqlitePoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .idle_timeout(std::time::Duration::from_secs(300))
        .connect_with(options)
        .await
        .map_err(|e| HistoryError::Connection(format!("Failed to create SQLite pool: {}", e)))
}
