use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL,
    file_data BLOB NOT NULL,
    upload_date TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

/// Listing entry for an uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct FileSummary {
    pub id: i64,
    pub filename: String,
    pub upload_date: NaiveDateTime,
}

/// A stored workbook with its content
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FileRecord {
    pub id: i64,
    pub filename: String,
    pub file_data: Vec<u8>,
    pub upload_date: NaiveDateTime,
}

/// Handle to the `files` table
///
/// Cloning is cheap; every clone shares the same connection pool.
#[derive(Debug, Clone)]
pub struct FileStore {
    pool: SqlitePool,
}

impl FileStore {
    /// Open the database at `url` and create the schema if needed
    ///
    /// The database file is created when missing. In-memory databases exist
    /// per connection, so they are limited to a single pooled connection.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        let pool = if url.contains(":memory:") {
            // the database lives and dies with its only connection
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        }
        .connect_with(options)
        .await?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), sqlx::Error> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert a new record, returning its assigned id
    pub async fn insert(&self, filename: &str, file_data: &[u8]) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO files (filename, file_data) VALUES (?, ?)")
            .bind(filename)
            .bind(file_data)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// All records, newest upload first
    pub async fn list(&self) -> Result<Vec<FileSummary>, sqlx::Error> {
        sqlx::query_as::<_, FileSummary>(
            "SELECT id, filename, upload_date FROM files ORDER BY upload_date DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get(&self, id: i64) -> Result<Option<FileRecord>, sqlx::Error> {
        sqlx::query_as::<_, FileRecord>(
            "SELECT id, filename, file_data, upload_date FROM files WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Replace the stored content of a record
    ///
    /// Returns `false` when no record has this id. Writers are not
    /// coordinated: the last update to complete wins.
    pub async fn update_content(&self, id: i64, file_data: &[u8]) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE files SET file_data = ? WHERE id = ?")
            .bind(file_data)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a record, returning `false` when no record has this id
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
