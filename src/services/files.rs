// src/services/files.rs

//! Upload, listing and deletion of course files across the two vault tables.
//!
//! Each multi-table write runs as a small saga: the intent is logged, every
//! leg runs in turn, and when a later leg fails the legs that already
//! succeeded are undone by a queued compensation.

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    db::vault::VaultClient,
    error::AppError,
    models::file::{
        FileIndexEntry, FileLocation, FileMetadata, FileSummary, StoredFile,
    },
};

/// A file received from a client, not yet stored.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub location: FileLocation,
    /// Display title. Falls back to `original_name` when blank.
    pub title: Option<String>,
    pub original_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub uploaded_by: String,
}

/// Undo step for a partially applied saga.
#[derive(Debug, Clone, PartialEq)]
pub enum Compensation {
    /// The index row never made it; drop the orphaned primary row.
    DeletePrimary { file_id: Uuid },
    /// The primary row is gone but its index row could not be removed.
    DeleteIndex { location: FileLocation, file_id: Uuid },
}

pub struct FileOrchestrator {
    vault: Arc<VaultClient>,
    compensations: mpsc::UnboundedSender<Compensation>,
}

impl FileOrchestrator {
    /// Builds the orchestrator and the worker that applies its compensations.
    /// The worker has to be driven (usually spawned) by the caller.
    pub fn new(vault: Arc<VaultClient>) -> (Self, CompensationWorker) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = CompensationWorker {
            vault: vault.clone(),
            receiver,
        };
        (
            Self {
                vault,
                compensations: sender,
            },
            worker,
        )
    }

    pub async fn upload(&self, upload: NewUpload) -> Result<FileMetadata, AppError> {
        if upload.data.is_empty() {
            return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
        }

        let tables = self.vault.ready().await?;

        let filename = upload
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&upload.original_name)
            .to_string();

        let file = StoredFile {
            id: Uuid::new_v4(),
            location: upload.location,
            filename,
            original_name: upload.original_name,
            content_type: upload.content_type,
            size: i64::try_from(upload.data.len())
                .map_err(|e| AppError::BadRequest(e.to_string()))?,
            data: upload.data,
            upload_date: chrono::Utc::now(),
            uploaded_by: upload.uploaded_by,
        };

        tracing::info!(
            file_id = %file.id,
            course_id = %file.location.course_id,
            topic_id = %file.location.topic_id,
            subtopic_id = %file.location.subtopic_id,
            "Upload intent recorded"
        );

        tables.insert_file(&file).await.map_err(|e| {
            tracing::error!("Failed to write file {}: {}", file.id, e);
            e
        })?;

        if let Err(e) = tables.insert_index(&FileIndexEntry::from(&file)).await {
            tracing::error!(
                "Index write for file {} failed after primary write: {}",
                file.id,
                e
            );
            self.compensate(Compensation::DeletePrimary { file_id: file.id });
            return Err(e);
        }

        tracing::info!("Stored file {} ({} bytes)", file.id, file.size);
        Ok(FileMetadata::from(&file))
    }

    /// Full record, payload included.
    pub async fn get(&self, id: Uuid) -> Result<StoredFile, AppError> {
        let tables = self.vault.ready().await?;
        tables
            .get_file(id)
            .await?
            .ok_or(AppError::NotFound("File not found".to_string()))
    }

    pub async fn list(&self, location: &FileLocation) -> Result<Vec<FileSummary>, AppError> {
        let tables = self.vault.ready().await?;
        let entries = tables.list_index(location).await?;
        Ok(entries.into_iter().map(FileSummary::from).collect())
    }

    /// Deletes the primary row, then the index row at the location the
    /// primary row itself records.
    ///
    /// `authorize` sees the stored metadata (never the payload) and can veto
    /// the delete before anything is removed.
    pub async fn delete<F>(&self, id: Uuid, authorize: F) -> Result<FileIndexEntry, AppError>
    where
        F: FnOnce(&FileIndexEntry) -> Result<(), AppError>,
    {
        let tables = self.vault.ready().await?;

        let file = tables
            .get_file_info(id)
            .await?
            .ok_or(AppError::NotFound("File not found".to_string()))?;

        authorize(&file)?;

        tracing::info!(file_id = %id, "Delete intent recorded");

        tables.delete_file(id).await?;

        if let Err(e) = tables.delete_index(&file.location, id).await {
            tracing::error!("Index delete for file {} failed after primary delete: {}", id, e);
            self.compensate(Compensation::DeleteIndex {
                location: file.location.clone(),
                file_id: id,
            });
        }

        Ok(file)
    }

    fn compensate(&self, compensation: Compensation) {
        tracing::warn!("Queueing compensation {:?}", compensation);
        if let Err(e) = self.compensations.send(compensation) {
            tracing::error!("Compensation worker is gone, dropping {:?}", e.0);
        }
    }
}

/// Applies queued compensations. Each one is attempted once.
pub struct CompensationWorker {
    vault: Arc<VaultClient>,
    receiver: mpsc::UnboundedReceiver<Compensation>,
}

impl CompensationWorker {
    /// Runs until every orchestrator handle is dropped.
    pub async fn run(mut self) {
        while let Some(compensation) = self.receiver.recv().await {
            self.apply(compensation).await;
        }
        tracing::info!("Compensation worker stopped");
    }

    /// Applies whatever is queued right now and returns how many ran.
    pub async fn run_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(compensation) = self.receiver.try_recv() {
            self.apply(compensation).await;
            applied += 1;
        }
        applied
    }

    /// Compensations only exist after the vault served a write, so this never
    /// starts a bootstrap of its own.
    async fn apply(&self, compensation: Compensation) {
        let tables = match self.vault.handle() {
            Ok(tables) => tables,
            Err(e) => {
                tracing::error!("Cannot apply {:?}, vault unavailable: {}", compensation, e);
                return;
            }
        };

        let outcome = match &compensation {
            Compensation::DeletePrimary { file_id } => tables.delete_file(*file_id).await,
            Compensation::DeleteIndex { location, file_id } => {
                tables.delete_index(location, *file_id).await
            }
        };

        match outcome {
            Ok(()) => tracing::info!("Applied compensation {:?}", compensation),
            Err(e) => tracing::error!("Compensation {:?} failed: {}", compensation, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        memory::{MemoryFileTables, MemoryVaultDriver},
        vault::VaultStatus,
    };
    use std::time::Duration;

    fn setup() -> (FileOrchestrator, CompensationWorker, Arc<MemoryFileTables>) {
        let driver = Arc::new(MemoryVaultDriver::new());
        let tables = driver.tables();
        let vault = Arc::new(VaultClient::new(driver, "file_vault", Duration::ZERO).unwrap());
        let (orchestrator, worker) = FileOrchestrator::new(vault);
        (orchestrator, worker, tables)
    }

    fn notes(location: FileLocation) -> NewUpload {
        NewUpload {
            location,
            title: Some("notes.txt".to_string()),
            original_name: "raw-upload.txt".to_string(),
            content_type: "text/plain".to_string(),
            data: b"0123456789".to_vec(),
            uploaded_by: "teacher1".to_string(),
        }
    }

    #[tokio::test]
    async fn upload_then_list_and_download() {
        let (files, _worker, _) = setup();
        let location = FileLocation::topic(Uuid::new_v4(), Uuid::new_v4());

        let meta = files.upload(notes(location.clone())).await.unwrap();
        assert_eq!(meta.filename, "notes.txt");
        assert_eq!(meta.original_name, "raw-upload.txt");
        assert_eq!(meta.size, 10);

        let listed = files.list(&location).await.unwrap();
        assert_eq!(
            listed,
            vec![FileSummary {
                id: meta.id,
                filename: "notes.txt".to_string(),
                content_type: "text/plain".to_string(),
                size: 10,
            }]
        );

        let stored = files.get(meta.id).await.unwrap();
        assert_eq!(stored.data, b"0123456789".to_vec());
        assert_eq!(stored.content_type, "text/plain");
    }

    #[tokio::test]
    async fn blank_title_falls_back_to_original_name() {
        let (files, _worker, _) = setup();
        let mut upload = notes(FileLocation::topic(Uuid::new_v4(), Uuid::new_v4()));
        upload.title = Some("   ".to_string());

        let meta = files.upload(upload).await.unwrap();
        assert_eq!(meta.filename, "raw-upload.txt");
    }

    #[tokio::test]
    async fn empty_payload_is_rejected() {
        let (files, _worker, tables) = setup();
        let mut upload = notes(FileLocation::topic(Uuid::new_v4(), Uuid::new_v4()));
        upload.data.clear();

        assert!(matches!(
            files.upload(upload).await,
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(tables.primary_count().await, 0);
    }

    #[tokio::test]
    async fn topic_and_subtopic_listings_are_separate() {
        let (files, _worker, _) = setup();
        let course = Uuid::new_v4();
        let topic = Uuid::new_v4();
        let sub = FileLocation::subtopic(course, topic, Uuid::new_v4());

        files.upload(notes(sub.clone())).await.unwrap();

        assert!(files.list(&FileLocation::topic(course, topic)).await.unwrap().is_empty());
        assert_eq!(files.list(&sub).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_both_rows() {
        let (files, _worker, tables) = setup();
        let location = FileLocation::topic(Uuid::new_v4(), Uuid::new_v4());
        let meta = files.upload(notes(location.clone())).await.unwrap();

        files.delete(meta.id, |_| Ok(())).await.unwrap();

        assert!(matches!(files.get(meta.id).await, Err(AppError::NotFound(_))));
        assert!(files.list(&location).await.unwrap().is_empty());
        assert_eq!(tables.index_count().await, 0);
    }

    #[tokio::test]
    async fn delete_checks_ownership_without_reading_payload() {
        let (files, _worker, tables) = setup();
        let location = FileLocation::topic(Uuid::new_v4(), Uuid::new_v4());
        let meta = files.upload(notes(location.clone())).await.unwrap();

        let denied = files
            .delete(meta.id, |info| {
                if info.uploaded_by == "someone-else" {
                    Ok(())
                } else {
                    Err(AppError::Forbidden("not yours".to_string()))
                }
            })
            .await;
        assert!(matches!(denied, Err(AppError::Forbidden(_))));
        assert_eq!(tables.primary_count().await, 1);
        assert_eq!(tables.index_count().await, 1);

        let deleted = files
            .delete(meta.id, |info| {
                assert_eq!(info.uploaded_by, "teacher1");
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(deleted.file_id, meta.id);
        assert_eq!(tables.payload_reads(), 0);
        assert_eq!(tables.primary_count().await, 0);
    }

    #[tokio::test]
    async fn worker_does_not_bootstrap_the_vault() {
        let driver = Arc::new(MemoryVaultDriver::new());
        let vault = Arc::new(VaultClient::new(driver.clone(), "file_vault", Duration::ZERO).unwrap());
        let (files, mut worker) = FileOrchestrator::new(vault.clone());

        files.compensate(Compensation::DeletePrimary { file_id: Uuid::new_v4() });
        assert_eq!(worker.run_pending().await, 1);

        assert_eq!(driver.keyspaces_created(), 0);
        assert_eq!(vault.status(), VaultStatus::Uninitialized);
    }

    #[tokio::test]
    async fn delete_of_unknown_file_is_not_found() {
        let (files, _worker, _) = setup();
        assert!(matches!(
            files.delete(Uuid::new_v4(), |_| Ok(())).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn failed_index_write_compensates_primary() {
        let (files, mut worker, tables) = setup();
        tables.fail_index_writes(true);

        let result = files
            .upload(notes(FileLocation::topic(Uuid::new_v4(), Uuid::new_v4())))
            .await;
        assert!(result.is_err());
        assert_eq!(tables.primary_count().await, 1);

        assert_eq!(worker.run_pending().await, 1);
        assert_eq!(tables.primary_count().await, 0);
        assert_eq!(tables.index_count().await, 0);
    }

    #[tokio::test]
    async fn failed_index_delete_is_compensated_later() {
        let (files, mut worker, tables) = setup();
        let location = FileLocation::topic(Uuid::new_v4(), Uuid::new_v4());
        let meta = files.upload(notes(location.clone())).await.unwrap();

        tables.fail_index_deletes(true);
        files.delete(meta.id, |_| Ok(())).await.unwrap();
        assert_eq!(tables.index_count().await, 1);

        tables.fail_index_deletes(false);
        assert_eq!(worker.run_pending().await, 1);
        assert!(files.list(&location).await.unwrap().is_empty());
    }
}
