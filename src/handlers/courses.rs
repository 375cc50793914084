// src/handlers/courses.rs

use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::course::{
        Course, CourseImage, CourseState, CreateCourseRequest, UpdateCourseRequest,
    },
    state::AppState,
    utils::jwt::Claims,
};

/// Only the course's own teacher or an admin may change it.
pub(crate) fn ensure_course_editor(course: &Course, claims: &Claims) -> Result<(), AppError> {
    if claims.is_admin() || course.teacher == claims.username {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "Only the course teacher can modify this course".to_string(),
    ))
}

fn check_dates(
    start: Option<chrono::DateTime<chrono::Utc>>,
    end: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<(), AppError> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(AppError::BadRequest(
                "Course end date must not be before its start date".to_string(),
            ));
        }
    }
    Ok(())
}

/// Lists all courses.
pub async fn list_courses(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let courses = state.courses.list_courses().await?;
    Ok(Json(courses))
}

/// Retrieves a single course with its tabs and contents.
pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let course = state
        .courses
        .get_course(id)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;

    Ok(Json(course))
}

/// Creates a course taught by the caller.
/// Teachers and admins only.
pub async fn create_course(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    check_dates(payload.start_date, payload.end_date)?;

    let course = state
        .courses
        .insert_course(Course {
            id: Uuid::new_v4(),
            code: payload.code,
            name: payload.name,
            description: payload.description,
            start_date: payload.start_date,
            end_date: payload.end_date,
            image: None,
            student_list: Vec::new(),
            teacher: claims.username.clone(),
            state: payload.state.unwrap_or(CourseState::InEdition),
            tabs: Vec::new(),
            created_at: None,
        })
        .await?;

    // Second document; a failure here leaves the course without a back-reference
    if let Err(e) = state
        .users
        .add_created_course(claims.user_id()?, course.id)
        .await
    {
        tracing::warn!("Course {} created but not linked to its author: {}", course.id, e);
    }

    tracing::info!("Course {} ({}) created by {}", course.id, course.code, claims.username);

    Ok((StatusCode::CREATED, Json(course)))
}

/// Updates course fields, including its state.
pub async fn update_course(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let course = state
        .courses
        .update_course(
            id,
            Box::new(move |course: &mut Course| -> Result<(), AppError> {
                ensure_course_editor(course, &claims)?;

                if let Some(code) = payload.code {
                    course.code = code;
                }
                if let Some(name) = payload.name {
                    course.name = name;
                }
                if let Some(description) = payload.description {
                    course.description = description;
                }
                if payload.start_date.is_some() {
                    course.start_date = payload.start_date;
                }
                if payload.end_date.is_some() {
                    course.end_date = payload.end_date;
                }
                if let Some(new_state) = payload.state {
                    course.state = new_state;
                }

                check_dates(course.start_date, course.end_date)
            }),
        )
        .await?;

    Ok(Json(course))
}

/// Deletes a course together with its evaluations.
pub async fn delete_course(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let course = state
        .courses
        .get_course(id)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;

    ensure_course_editor(&course, &claims)?;

    if !state.courses.delete_course(id).await? {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    tracing::info!("Course {} deleted by {}", id, claims.username);

    Ok(StatusCode::NO_CONTENT)
}

/// Replaces the course cover image (multipart field `image`).
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut image = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(AppError::BadRequest(format!(
                "Unsupported image type '{}'",
                content_type
            )));
        }

        let data = field.bytes().await?.to_vec();
        image = Some(CourseImage { data, content_type });
    }

    let image = image
        .filter(|i| !i.data.is_empty())
        .ok_or(AppError::BadRequest("Missing 'image' file".to_string()))?;

    state
        .courses
        .update_course(
            id,
            Box::new(move |course: &mut Course| -> Result<(), AppError> {
                ensure_course_editor(course, &claims)?;
                course.image = Some(image);
                Ok(())
            }),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Serves the course cover image.
pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let image = state
        .courses
        .get_course(id)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))?
        .image
        .ok_or(AppError::NotFound("Course has no image".to_string()))?;

    Ok(([(header::CONTENT_TYPE, image.content_type)], image.data))
}

/// Enrolls the caller in a course.
///
/// Writes the course's student list first, then the user's course list.
pub async fn enroll(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let username = claims.username.clone();

    state
        .courses
        .update_course(
            id,
            Box::new(move |course: &mut Course| -> Result<(), AppError> {
                if !matches!(course.state, CourseState::Active | CourseState::Published) {
                    return Err(AppError::BadRequest(
                        "Course is not open for enrollment".to_string(),
                    ));
                }
                if course.student_list.contains(&username) {
                    return Err(AppError::Conflict("Already enrolled".to_string()));
                }
                course.student_list.push(username);
                Ok(())
            }),
        )
        .await?;

    state
        .users
        .add_enrolled_course(user_id, id)
        .await
        .map_err(|e| {
            tracing::error!(
                "User {} added to course {} but enrollment not recorded on the user: {}",
                user_id,
                id,
                e
            );
            e
        })?;

    Ok(Json(serde_json::json!({
        "course_id": id,
        "enrolled": true
    })))
}
