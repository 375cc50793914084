// src/handlers/contents.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use url::Url;
use uuid::Uuid;
use validator::Validate;

use super::courses::ensure_course_editor;
use crate::{
    error::AppError,
    models::course::{Content, ContentType, Course, CreateContentRequest, UpdateContentRequest},
    services::ordering,
    state::AppState,
    utils::{html::sanitize_rich_text, jwt::Claims},
};

fn tab_not_found() -> AppError {
    AppError::NotFound("Tab not found".to_string())
}

fn content_not_found() -> AppError {
    AppError::NotFound("Content not found".to_string())
}

/// Normalizes a content body for its type.
///
/// Rich text is sanitized, links must be absolute URLs and file items must
/// reference a vault file id.
fn prepare_body(kind: ContentType, body: String) -> Result<String, AppError> {
    match kind {
        ContentType::Text => Ok(sanitize_rich_text(&body)),
        ContentType::Link => {
            Url::parse(body.trim())
                .map_err(|_| AppError::BadRequest(format!("Invalid link URL '{}'", body)))?;
            Ok(body.trim().to_string())
        }
        ContentType::File => {
            Uuid::parse_str(body.trim())
                .map_err(|_| AppError::BadRequest("File content must be a file id".to_string()))?;
            Ok(body.trim().to_string())
        }
        ContentType::Image | ContentType::Document | ContentType::Video => Ok(body),
    }
}

/// Adds an item to a tab's content list.
pub async fn create_content(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, tab_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CreateContentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let body = prepare_body(payload.content_type, payload.content)?;
    let content_id = Uuid::new_v4();

    let course = state
        .courses
        .update_course(
            course_id,
            Box::new(move |course: &mut Course| -> Result<(), AppError> {
                ensure_course_editor(course, &claims)?;

                let tab = course.tab_mut(tab_id).ok_or_else(tab_not_found)?;
                let order = ordering::place(&mut tab.contents, payload.order);
                tab.contents.push(Content {
                    id: content_id,
                    content_type: payload.content_type,
                    title: payload.title,
                    description: payload.description,
                    content: body,
                    file_type: payload.file_type,
                    order,
                });
                tab.contents.sort_by_key(|c| c.order);
                Ok(())
            }),
        )
        .await?;

    let content = course
        .tab(tab_id)
        .and_then(|t| t.contents.iter().find(|c| c.id == content_id))
        .cloned()
        .ok_or_else(content_not_found)?;

    Ok((StatusCode::CREATED, Json(content)))
}

/// Edits a content item; a new `order` moves it among its siblings.
pub async fn update_content(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, tab_id, content_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(payload): Json<UpdateContentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let course = state
        .courses
        .update_course(
            course_id,
            Box::new(move |course: &mut Course| -> Result<(), AppError> {
                ensure_course_editor(course, &claims)?;

                let tab = course.tab_mut(tab_id).ok_or_else(tab_not_found)?;
                let item = tab
                    .contents
                    .iter_mut()
                    .find(|c| c.id == content_id)
                    .ok_or_else(content_not_found)?;

                if let Some(title) = payload.title {
                    item.title = title;
                }
                if let Some(description) = payload.description {
                    item.description = description;
                }
                if let Some(body) = payload.content {
                    item.content = prepare_body(item.content_type, body)?;
                }
                if payload.file_type.is_some() {
                    item.file_type = payload.file_type;
                }

                if let Some(order) = payload.order {
                    ordering::move_to(&mut tab.contents, content_id, order);
                    tab.contents.sort_by_key(|c| c.order);
                }
                Ok(())
            }),
        )
        .await?;

    let content = course
        .tab(tab_id)
        .and_then(|t| t.contents.iter().find(|c| c.id == content_id))
        .cloned()
        .ok_or_else(content_not_found)?;

    Ok(Json(content))
}

/// Removes a content item and re-packs the remaining siblings.
pub async fn delete_content(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, tab_id, content_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .courses
        .update_course(
            course_id,
            Box::new(move |course: &mut Course| -> Result<(), AppError> {
                ensure_course_editor(course, &claims)?;

                let tab = course.tab_mut(tab_id).ok_or_else(tab_not_found)?;
                let index = tab
                    .contents
                    .iter()
                    .position(|c| c.id == content_id)
                    .ok_or_else(content_not_found)?;
                let removed = tab.contents.remove(index);
                ordering::close_gap(&mut tab.contents, removed.order);
                tab.contents.sort_by_key(|c| c.order);
                Ok(())
            }),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_bodies_are_sanitized() {
        let body = prepare_body(ContentType::Text, "<b>hi</b><script>x()</script>".to_string());
        assert_eq!(body.unwrap(), "<b>hi</b>");
    }

    #[test]
    fn links_must_be_urls() {
        assert!(prepare_body(ContentType::Link, "https://example.com/a".to_string()).is_ok());
        assert!(matches!(
            prepare_body(ContentType::Link, "not a url".to_string()),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn file_items_reference_a_file_id() {
        let id = Uuid::new_v4().to_string();
        assert_eq!(prepare_body(ContentType::File, id.clone()).unwrap(), id);
        assert!(prepare_body(ContentType::File, "notes.txt".to_string()).is_err());
    }
}
