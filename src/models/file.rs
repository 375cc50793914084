// src/models/file.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a file hangs in a course: a topic, or a subtopic of that topic.
/// An empty `subtopic_id` means the file is attached at topic level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileLocation {
    pub course_id: Uuid,
    pub topic_id: Uuid,
    pub subtopic_id: String,
}

impl FileLocation {
    pub fn topic(course_id: Uuid, topic_id: Uuid) -> Self {
        Self {
            course_id,
            topic_id,
            subtopic_id: String::new(),
        }
    }

    pub fn subtopic(course_id: Uuid, topic_id: Uuid, subtopic_id: Uuid) -> Self {
        Self {
            course_id,
            topic_id,
            subtopic_id: subtopic_id.to_string(),
        }
    }
}

/// Row of the primary `files` table, keyed by id and carrying the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub id: Uuid,
    pub location: FileLocation,
    pub filename: String,
    pub original_name: String,
    pub content_type: String,
    pub size: i64,
    pub data: Vec<u8>,
    pub upload_date: chrono::DateTime<chrono::Utc>,
    pub uploaded_by: String,
}

/// Row of the `files_by_course` table: the same metadata without the payload,
/// keyed by location and clustered by file id.
#[derive(Debug, Clone, PartialEq)]
pub struct FileIndexEntry {
    pub location: FileLocation,
    pub file_id: Uuid,
    pub filename: String,
    pub original_name: String,
    pub content_type: String,
    pub size: i64,
    pub upload_date: chrono::DateTime<chrono::Utc>,
    pub uploaded_by: String,
}

impl From<&StoredFile> for FileIndexEntry {
    fn from(file: &StoredFile) -> Self {
        Self {
            location: file.location.clone(),
            file_id: file.id,
            filename: file.filename.clone(),
            original_name: file.original_name.clone(),
            content_type: file.content_type.clone(),
            size: file.size,
            upload_date: file.upload_date,
            uploaded_by: file.uploaded_by.clone(),
        }
    }
}

/// Metadata returned after an upload.
#[derive(Debug, Clone, Serialize)]
pub struct FileMetadata {
    pub id: Uuid,
    pub course_id: Uuid,
    pub topic_id: Uuid,
    pub subtopic_id: String,
    pub filename: String,
    pub original_name: String,
    pub content_type: String,
    pub size: i64,
    pub upload_date: chrono::DateTime<chrono::Utc>,
    pub uploaded_by: String,
}

impl From<&StoredFile> for FileMetadata {
    fn from(file: &StoredFile) -> Self {
        Self {
            id: file.id,
            course_id: file.location.course_id,
            topic_id: file.location.topic_id,
            subtopic_id: file.location.subtopic_id.clone(),
            filename: file.filename.clone(),
            original_name: file.original_name.clone(),
            content_type: file.content_type.clone(),
            size: file.size,
            upload_date: file.upload_date,
            uploaded_by: file.uploaded_by.clone(),
        }
    }
}

/// Lightweight listing projection. Never carries the payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSummary {
    pub id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
}

impl From<FileIndexEntry> for FileSummary {
    fn from(entry: FileIndexEntry) -> Self {
        Self {
            id: entry.file_id,
            filename: entry.filename,
            content_type: entry.content_type,
            size: entry.size,
        }
    }
}
