// src/db/vault/postgres.rs

use std::{str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use sqlx::{
    Connection, FromRow, PgConnection, PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use uuid::Uuid;

use super::{FileTables, VaultDriver, VaultTable};
use crate::{
    error::AppError,
    models::file::{FileIndexEntry, FileLocation, StoredFile},
};

const CREATE_FILES: &str = r#"
    CREATE TABLE IF NOT EXISTS files (
        id UUID PRIMARY KEY,
        course_id UUID NOT NULL,
        topic_id UUID NOT NULL,
        subtopic_id TEXT NOT NULL DEFAULT '',
        filename TEXT NOT NULL,
        original_name TEXT NOT NULL,
        content_type TEXT NOT NULL,
        size BIGINT NOT NULL,
        data BYTEA NOT NULL,
        upload_date TIMESTAMPTZ NOT NULL,
        uploaded_by TEXT NOT NULL
    )
"#;

const CREATE_FILES_BY_COURSE: &str = r#"
    CREATE TABLE IF NOT EXISTS files_by_course (
        course_id UUID NOT NULL,
        topic_id UUID NOT NULL,
        subtopic_id TEXT NOT NULL DEFAULT '',
        file_id UUID NOT NULL,
        filename TEXT NOT NULL,
        original_name TEXT NOT NULL,
        content_type TEXT NOT NULL,
        size BIGINT NOT NULL,
        upload_date TIMESTAMPTZ NOT NULL,
        uploaded_by TEXT NOT NULL,
        PRIMARY KEY (course_id, topic_id, subtopic_id, file_id)
    )
"#;

/// Vault driver that maps the keyspace onto a Postgres schema.
pub struct PgVaultDriver {
    url: String,
    statement_timeout: Duration,
}

impl PgVaultDriver {
    pub fn new(url: &str, statement_timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            statement_timeout,
        }
    }
}

#[async_trait]
impl VaultDriver for PgVaultDriver {
    async fn create_keyspace(&self, keyspace: &str) -> Result<(), AppError> {
        let mut control = PgConnection::connect(&self.url).await.map_err(|e| {
            tracing::error!("Vault control connection failed: {:?}", e);
            AppError::from(e)
        })?;

        // Keyspace names are validated by VaultClient before they get here
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", keyspace))
            .execute(&mut control)
            .await?;

        control.close().await?;
        tracing::info!("Vault keyspace '{}' present, control connection closed", keyspace);
        Ok(())
    }

    async fn connect(&self, keyspace: &str) -> Result<Arc<dyn FileTables>, AppError> {
        let timeout_ms = self.statement_timeout.as_millis().to_string();
        let options = PgConnectOptions::from_str(&self.url)?.options([
            ("search_path", keyspace.to_string()),
            ("statement_timeout", timeout_ms),
        ]);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(options)
            .await
            .map_err(|e| {
                tracing::error!("Vault session connect failed: {:?}", e);
                AppError::from(e)
            })?;

        Ok(Arc::new(PgFileTables { pool }))
    }
}

/// Vault session backed by a pool whose `search_path` is the keyspace.
pub struct PgFileTables {
    pool: PgPool,
}

#[derive(FromRow)]
struct FileRow {
    id: Uuid,
    course_id: Uuid,
    topic_id: Uuid,
    subtopic_id: String,
    filename: String,
    original_name: String,
    content_type: String,
    size: i64,
    data: Vec<u8>,
    upload_date: chrono::DateTime<chrono::Utc>,
    uploaded_by: String,
}

impl From<FileRow> for StoredFile {
    fn from(row: FileRow) -> Self {
        Self {
            id: row.id,
            location: FileLocation {
                course_id: row.course_id,
                topic_id: row.topic_id,
                subtopic_id: row.subtopic_id,
            },
            filename: row.filename,
            original_name: row.original_name,
            content_type: row.content_type,
            size: row.size,
            data: row.data,
            upload_date: row.upload_date,
            uploaded_by: row.uploaded_by,
        }
    }
}

#[derive(FromRow)]
struct IndexRow {
    course_id: Uuid,
    topic_id: Uuid,
    subtopic_id: String,
    file_id: Uuid,
    filename: String,
    original_name: String,
    content_type: String,
    size: i64,
    upload_date: chrono::DateTime<chrono::Utc>,
    uploaded_by: String,
}

impl From<IndexRow> for FileIndexEntry {
    fn from(row: IndexRow) -> Self {
        Self {
            location: FileLocation {
                course_id: row.course_id,
                topic_id: row.topic_id,
                subtopic_id: row.subtopic_id,
            },
            file_id: row.file_id,
            filename: row.filename,
            original_name: row.original_name,
            content_type: row.content_type,
            size: row.size,
            upload_date: row.upload_date,
            uploaded_by: row.uploaded_by,
        }
    }
}

#[async_trait]
impl FileTables for PgFileTables {
    async fn create_table(&self, table: VaultTable) -> Result<(), AppError> {
        let ddl = match table {
            VaultTable::Files => CREATE_FILES,
            VaultTable::FilesByCourse => CREATE_FILES_BY_COURSE,
        };

        sqlx::query(ddl).execute(&self.pool).await.map_err(|e| {
            tracing::error!("Failed to create vault table {}: {:?}", table.name(), e);
            AppError::from(e)
        })?;

        tracing::info!("Vault table {} present", table.name());
        Ok(())
    }

    async fn insert_file(&self, file: &StoredFile) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO files
            (id, course_id, topic_id, subtopic_id, filename, original_name,
             content_type, size, data, upload_date, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(file.id)
        .bind(file.location.course_id)
        .bind(file.location.topic_id)
        .bind(&file.location.subtopic_id)
        .bind(&file.filename)
        .bind(&file.original_name)
        .bind(&file.content_type)
        .bind(file.size)
        .bind(&file.data)
        .bind(file.upload_date)
        .bind(&file.uploaded_by)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_index(&self, entry: &FileIndexEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO files_by_course
            (course_id, topic_id, subtopic_id, file_id, filename, original_name,
             content_type, size, upload_date, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.location.course_id)
        .bind(entry.location.topic_id)
        .bind(&entry.location.subtopic_id)
        .bind(entry.file_id)
        .bind(&entry.filename)
        .bind(&entry.original_name)
        .bind(&entry.content_type)
        .bind(entry.size)
        .bind(entry.upload_date)
        .bind(&entry.uploaded_by)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_file(&self, id: Uuid) -> Result<Option<StoredFile>, AppError> {
        let row = sqlx::query_as::<_, FileRow>(
            r#"
            SELECT id, course_id, topic_id, subtopic_id, filename, original_name,
                   content_type, size, data, upload_date, uploaded_by
            FROM files
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(StoredFile::from))
    }

    async fn get_file_info(&self, id: Uuid) -> Result<Option<FileIndexEntry>, AppError> {
        let row = sqlx::query_as::<_, IndexRow>(
            r#"
            SELECT course_id, topic_id, subtopic_id, id AS file_id, filename, original_name,
                   content_type, size, upload_date, uploaded_by
            FROM files
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FileIndexEntry::from))
    }

    async fn list_index(&self, location: &FileLocation) -> Result<Vec<FileIndexEntry>, AppError> {
        let rows = sqlx::query_as::<_, IndexRow>(
            r#"
            SELECT course_id, topic_id, subtopic_id, file_id, filename, original_name,
                   content_type, size, upload_date, uploaded_by
            FROM files_by_course
            WHERE course_id = $1 AND topic_id = $2 AND subtopic_id = $3
            ORDER BY file_id
            "#,
        )
        .bind(location.course_id)
        .bind(location.topic_id)
        .bind(&location.subtopic_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FileIndexEntry::from).collect())
    }

    async fn delete_file(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_index(&self, location: &FileLocation, file_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            DELETE FROM files_by_course
            WHERE course_id = $1 AND topic_id = $2 AND subtopic_id = $3 AND file_id = $4
            "#,
        )
        .bind(location.course_id)
        .bind(location.topic_id)
        .bind(&location.subtopic_id)
        .bind(file_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
