// src/handlers/tabs.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use super::courses::ensure_course_editor;
use crate::{
    error::AppError,
    models::course::{Course, CreateTabRequest, Tab, UpdateTabRequest},
    services::ordering,
    state::AppState,
    utils::jwt::Claims,
};

fn tab_not_found() -> AppError {
    AppError::NotFound("Tab not found".to_string())
}

/// Adds a tab to a course, or a sub-tab when `parent_tab` is given.
///
/// A requested `order` that is already taken pushes the occupant and every
/// later sibling back by one.
pub async fn create_tab(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<CreateTabRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let tab_id = Uuid::new_v4();

    let course = state
        .courses
        .update_course(
            course_id,
            Box::new(move |course: &mut Course| -> Result<(), AppError> {
                ensure_course_editor(course, &claims)?;

                if let Some(parent_id) = payload.parent_tab {
                    let parent = course
                        .tab(parent_id)
                        .ok_or(AppError::NotFound("Parent tab not found".to_string()))?;
                    if parent.parent_tab.is_some() {
                        return Err(AppError::BadRequest(
                            "Sub-tabs cannot contain further sub-tabs".to_string(),
                        ));
                    }
                }

                let mut siblings: Vec<&mut Tab> = course
                    .tabs
                    .iter_mut()
                    .filter(|t| t.parent_tab == payload.parent_tab)
                    .collect();
                let order = ordering::place(&mut siblings, payload.order);

                let owner = course.id;
                course.tabs.push(Tab {
                    id: tab_id,
                    course: owner,
                    title: payload.title,
                    description: payload.description,
                    order,
                    parent_tab: payload.parent_tab,
                    contents: Vec::new(),
                });
                Ok(())
            }),
        )
        .await?;

    let tab = course.tab(tab_id).cloned().ok_or_else(tab_not_found)?;

    Ok((StatusCode::CREATED, Json(tab)))
}

/// Renames, re-describes or moves a tab among its siblings.
pub async fn update_tab(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, tab_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateTabRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let course = state
        .courses
        .update_course(
            course_id,
            Box::new(move |course: &mut Course| -> Result<(), AppError> {
                ensure_course_editor(course, &claims)?;

                let tab = course.tab_mut(tab_id).ok_or_else(tab_not_found)?;
                if let Some(title) = payload.title {
                    tab.title = title;
                }
                if let Some(description) = payload.description {
                    tab.description = description;
                }
                let parent = tab.parent_tab;

                if let Some(order) = payload.order {
                    let mut siblings: Vec<&mut Tab> = course
                        .tabs
                        .iter_mut()
                        .filter(|t| t.parent_tab == parent)
                        .collect();
                    ordering::move_to(&mut siblings, tab_id, order);
                }
                Ok(())
            }),
        )
        .await?;

    let tab = course.tab(tab_id).cloned().ok_or_else(tab_not_found)?;

    Ok(Json(tab))
}

/// Removes a tab and its sub-tabs, then closes the gap among its siblings.
pub async fn delete_tab(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, tab_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .courses
        .update_course(
            course_id,
            Box::new(move |course: &mut Course| -> Result<(), AppError> {
                ensure_course_editor(course, &claims)?;

                let index = course
                    .tabs
                    .iter()
                    .position(|t| t.id == tab_id)
                    .ok_or_else(tab_not_found)?;
                let removed = course.tabs.remove(index);
                course.tabs.retain(|t| t.parent_tab != Some(tab_id));

                let mut siblings: Vec<&mut Tab> = course
                    .tabs
                    .iter_mut()
                    .filter(|t| t.parent_tab == removed.parent_tab)
                    .collect();
                ordering::close_gap(&mut siblings, removed.order);
                Ok(())
            }),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
