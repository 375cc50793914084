// src/handlers/files.rs

use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::file::FileLocation,
    services::files::NewUpload,
    state::AppState,
    utils::jwt::Claims,
};

/// Subtopic ids travel as plain path strings; reject anything that is not a tab id.
fn parse_subtopic_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw)
        .map_err(|_| AppError::BadRequest(format!("Invalid subtopic id '{}'", raw)))
}

/// Keeps a filename safe for a quoted Content-Disposition value.
fn disposition_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Reads the `file` part (and the optional `title` part) of an upload form.
async fn read_upload(
    mut multipart: Multipart,
    location: FileLocation,
    uploaded_by: String,
) -> Result<NewUpload, AppError> {
    let mut title = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("title") => title = Some(field.text().await?),
            Some("file") => {
                let original_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await?.to_vec();
                file = Some((original_name, content_type, data));
            }
            _ => {}
        }
    }

    let (original_name, content_type, data) =
        file.ok_or(AppError::BadRequest("No file uploaded".to_string()))?;

    Ok(NewUpload {
        location,
        title,
        original_name,
        content_type,
        data,
        uploaded_by,
    })
}

/// Uploads a file at topic level.
pub async fn upload_to_topic(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, topic_id)): Path<(Uuid, Uuid)>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let location = FileLocation::topic(course_id, topic_id);
    let upload = read_upload(multipart, location, claims.username).await?;
    let metadata = state.files.upload(upload).await?;

    Ok((StatusCode::CREATED, Json(metadata)))
}

/// Uploads a file into a subtopic.
pub async fn upload_to_subtopic(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, topic_id, subtopic_id)): Path<(Uuid, Uuid, String)>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let subtopic_id = parse_subtopic_id(&subtopic_id)?;
    let location = FileLocation::subtopic(course_id, topic_id, subtopic_id);
    let upload = read_upload(multipart, location, claims.username).await?;
    let metadata = state.files.upload(upload).await?;

    Ok((StatusCode::CREATED, Json(metadata)))
}

/// Lists topic-level files (id, filename, content type, size).
pub async fn list_topic_files(
    State(state): State<AppState>,
    Path((course_id, topic_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let files = state
        .files
        .list(&FileLocation::topic(course_id, topic_id))
        .await?;

    Ok(Json(files))
}

/// Lists the files of one subtopic.
pub async fn list_subtopic_files(
    State(state): State<AppState>,
    Path((course_id, topic_id, subtopic_id)): Path<(Uuid, Uuid, String)>,
) -> Result<impl IntoResponse, AppError> {
    let subtopic_id = parse_subtopic_id(&subtopic_id)?;
    let files = state
        .files
        .list(&FileLocation::subtopic(course_id, topic_id, subtopic_id))
        .await?;

    Ok(Json(files))
}

/// Streams the stored bytes back with their original content type.
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let file = state.files.get(id).await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        disposition_filename(&file.filename)
    );

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.data,
    ))
}

/// Deletes a file. Allowed for its uploader and for course staff.
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .files
        .delete(id, |file| {
            if file.uploaded_by != claims.username && !claims.is_staff() {
                return Err(AppError::Forbidden(
                    "Only the uploader or course staff can delete this file".to_string(),
                ));
            }
            Ok(())
        })
        .await?;

    tracing::info!("File {} deleted by {}", id, claims.username);

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtopic_ids_must_be_uuids() {
        assert!(parse_subtopic_id(&Uuid::new_v4().to_string()).is_ok());
        assert!(matches!(
            parse_subtopic_id("week-1"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn disposition_names_are_quoted_safely() {
        assert_eq!(disposition_filename("notes.txt"), "notes.txt");
        assert_eq!(disposition_filename("my \"file\".pdf"), "my _file_.pdf");
        assert_eq!(disposition_filename("résumé.pdf"), "r_sum_.pdf");
    }
}
