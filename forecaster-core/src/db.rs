use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::config::DatabaseConfig;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS predictions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL CHECK (kind IN ('bayesian', 'evolutionary')),
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_predictions_created_at ON predictions (created_at DESC, id DESC);

CREATE TABLE IF NOT EXISTS prediction_inputs (
    prediction_id INTEGER NOT NULL REFERENCES predictions (id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (prediction_id, position)
);

CREATE TABLE IF NOT EXISTS prediction_outputs (
    prediction_id INTEGER PRIMARY KEY REFERENCES predictions (id) ON DELETE CASCADE,
    summary TEXT NOT NULL,
    confidence REAL NOT NULL,
    explanation TEXT,
    interventions TEXT NOT NULL,
    vancomycin_prob REAL,
    ceftaroline_prob REAL,
    threat_level TEXT NOT NULL,
    source TEXT NOT NULL,
    breakdown TEXT NOT NULL,
    contributing_features TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS charts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    prediction_id INTEGER NOT NULL REFERENCES predictions (id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    title TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_charts_prediction ON charts (prediction_id, position);

CREATE TABLE IF NOT EXISTS chart_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chart_id INTEGER NOT NULL REFERENCES charts (id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    value REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chart_data_chart ON chart_data (chart_id, position);

CREATE TABLE IF NOT EXISTS chart_meta (
    chart_id INTEGER PRIMARY KEY REFERENCES charts (id) ON DELETE CASCADE,
    context TEXT,
    interpretation TEXT,
    image TEXT
);
"#;

/// Open the SQLite store, creating the file if needed. An in-memory URL is
/// held on a single connection that never idles out, since every new
/// connection would otherwise see a fresh empty database.
pub async fn create_pool(config: &DatabaseConfig) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let in_memory = config.url.contains(":memory:");
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(config.max_connections)
    };

    pool_options.connect_with(options).await
}

/// Apply the schema. Every statement is idempotent.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    tracing::debug!("Schema ready");
    Ok(())
}

pub async fn health_check(pool: &SqlitePool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT sqlite_version()")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> DatabaseConfig {
        DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 4,
        }
    }

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let pool = create_pool(&memory_config()).await.unwrap();
        init_schema(&pool).await.unwrap();
        init_schema(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "chart_data",
                "chart_meta",
                "charts",
                "prediction_inputs",
                "prediction_outputs",
                "predictions"
            ]
        );
    }

    #[tokio::test]
    async fn test_health_check_reports_version() {
        let pool = create_pool(&memory_config()).await.unwrap();
        let version = health_check(&pool).await.unwrap();
        assert!(version.starts_with('3'));
    }

    #[tokio::test]
    async fn test_file_database_is_created() {
        let dir = std::env::temp_dir().join(format!("forecaster-db-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("store.db");
        let _ = std::fs::remove_file(&path);

        let config = DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            max_connections: 2,
        };
        let pool = create_pool(&config).await.unwrap();
        init_schema(&pool).await.unwrap();
        pool.close().await;

        assert!(path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
