// src/db/postgres.rs

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, types::Json};
use uuid::Uuid;

use super::{CourseMutation, CourseStore, EvaluationStore, UserStore};
use crate::{
    error::{AppError, is_unique_violation},
    models::{
        course::{Course, CourseImage, CourseState, Tab},
        evaluation::{Evaluation, EvaluationResult},
        user::User,
    },
};

const COURSE_COLUMNS: &str = r#"
    id, code, name, description, start_date, end_date,
    image_data, image_content_type, student_list, teacher, state, tabs, created_at
"#;

const USER_COLUMNS: &str = r#"
    id, first_name, last_name, email, username, password, role,
    enrolled_courses, created_courses, created_at
"#;

const EVALUATION_COLUMNS: &str =
    "id, course_id, title, questions, start_date, end_date, created_at";

const RESULT_COLUMNS: &str =
    "id, evaluation_id, student_id, answers, correct_count, score, submitted_at";

/// Postgres-backed document store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Raw row of the 'courses' table.
#[derive(FromRow)]
struct CourseRow {
    id: Uuid,
    code: String,
    name: String,
    description: String,
    start_date: Option<chrono::DateTime<chrono::Utc>>,
    end_date: Option<chrono::DateTime<chrono::Utc>>,
    image_data: Option<Vec<u8>>,
    image_content_type: Option<String>,
    student_list: Vec<String>,
    teacher: String,
    state: String,
    tabs: Json<Vec<Tab>>,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<CourseRow> for Course {
    type Error = AppError;

    fn try_from(row: CourseRow) -> Result<Self, Self::Error> {
        let state = row
            .state
            .parse::<CourseState>()
            .map_err(AppError::InternalServerError)?;

        let image = match (row.image_data, row.image_content_type) {
            (Some(data), Some(content_type)) => Some(CourseImage { data, content_type }),
            _ => None,
        };

        Ok(Course {
            id: row.id,
            code: row.code,
            name: row.name,
            description: row.description,
            start_date: row.start_date,
            end_date: row.end_date,
            image,
            student_list: row.student_list,
            teacher: row.teacher,
            state,
            tabs: row.tabs.0,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl CourseStore for PgStore {
    async fn list_courses(&self) -> Result<Vec<Course>, AppError> {
        let rows = sqlx::query_as::<_, CourseRow>(&format!(
            "SELECT {} FROM courses ORDER BY created_at DESC",
            COURSE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list courses: {:?}", e);
            AppError::from(e)
        })?;

        rows.into_iter().map(Course::try_from).collect()
    }

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, AppError> {
        let row = sqlx::query_as::<_, CourseRow>(&format!(
            "SELECT {} FROM courses WHERE id = $1",
            COURSE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Course::try_from).transpose()
    }

    async fn insert_course(&self, course: Course) -> Result<Course, AppError> {
        let (image_data, image_content_type) = split_image(&course);

        let created_at: Option<chrono::DateTime<chrono::Utc>> = sqlx::query_scalar(
            r#"
            INSERT INTO courses
            (id, code, name, description, start_date, end_date,
             image_data, image_content_type, student_list, teacher, state, tabs)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING created_at
            "#,
        )
        .bind(course.id)
        .bind(&course.code)
        .bind(&course.name)
        .bind(&course.description)
        .bind(course.start_date)
        .bind(course.end_date)
        .bind(image_data)
        .bind(image_content_type)
        .bind(&course.student_list)
        .bind(&course.teacher)
        .bind(course.state.as_str())
        .bind(Json(&course.tabs))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert course: {:?}", e);
            AppError::from(e)
        })?;

        Ok(Course {
            created_at,
            ..course
        })
    }

    async fn update_course(&self, id: Uuid, mutation: CourseMutation) -> Result<Course, AppError> {
        let mut tx = self.pool.begin().await?;

        // Row lock: concurrent mutations of the same course queue up here
        let row = sqlx::query_as::<_, CourseRow>(&format!(
            "SELECT {} FROM courses WHERE id = $1 FOR UPDATE",
            COURSE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;

        let mut course = Course::try_from(row)?;
        mutation(&mut course)?;

        let (image_data, image_content_type) = split_image(&course);

        sqlx::query(
            r#"
            UPDATE courses SET
                code = $2, name = $3, description = $4, start_date = $5, end_date = $6,
                image_data = $7, image_content_type = $8, student_list = $9,
                teacher = $10, state = $11, tabs = $12
            WHERE id = $1
            "#,
        )
        .bind(course.id)
        .bind(&course.code)
        .bind(&course.name)
        .bind(&course.description)
        .bind(course.start_date)
        .bind(course.end_date)
        .bind(image_data)
        .bind(image_content_type)
        .bind(&course.student_list)
        .bind(&course.teacher)
        .bind(course.state.as_str())
        .bind(Json(&course.tabs))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to persist course {}: {:?}", id, e);
            AppError::from(e)
        })?;

        tx.commit().await?;

        Ok(course)
    }

    async fn delete_course(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE users SET
                enrolled_courses = array_remove(enrolled_courses, $1),
                created_courses = array_remove(created_courses, $1)
            WHERE $1 = ANY(enrolled_courses) OR $1 = ANY(created_courses)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}

fn split_image(course: &Course) -> (Option<&[u8]>, Option<&str>) {
    match &course.image {
        Some(image) => (Some(image.data.as_slice()), Some(image.content_type.as_str())),
        None => (None, None),
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: User) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, first_name, last_name, email, username, password, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!(
                    "Username '{}' or email '{}' already exists",
                    user.username, user.email
                ))
            } else {
                tracing::error!("Failed to insert user: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn add_enrolled_course(&self, user_id: Uuid, course_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET enrolled_courses = array_append(enrolled_courses, $2)
            WHERE id = $1 AND NOT ($2 = ANY(enrolled_courses))
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!("User {} already lists course {}", user_id, course_id);
        }

        Ok(())
    }

    async fn add_created_course(&self, user_id: Uuid, course_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users SET created_courses = array_append(created_courses, $2)
            WHERE id = $1 AND NOT ($2 = ANY(created_courses))
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl EvaluationStore for PgStore {
    async fn insert_evaluation(&self, evaluation: Evaluation) -> Result<Evaluation, AppError> {
        let evaluation = sqlx::query_as::<_, Evaluation>(&format!(
            r#"
            INSERT INTO evaluations (id, course_id, title, questions, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            EVALUATION_COLUMNS
        ))
        .bind(evaluation.id)
        .bind(evaluation.course_id)
        .bind(&evaluation.title)
        .bind(&evaluation.questions)
        .bind(evaluation.start_date)
        .bind(evaluation.end_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert evaluation: {:?}", e);
            AppError::from(e)
        })?;

        Ok(evaluation)
    }

    async fn get_evaluation(&self, id: Uuid) -> Result<Option<Evaluation>, AppError> {
        let evaluation = sqlx::query_as::<_, Evaluation>(&format!(
            "SELECT {} FROM evaluations WHERE id = $1",
            EVALUATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(evaluation)
    }

    async fn list_evaluations(&self, course_id: Uuid) -> Result<Vec<Evaluation>, AppError> {
        let evaluations = sqlx::query_as::<_, Evaluation>(&format!(
            "SELECT {} FROM evaluations WHERE course_id = $1 ORDER BY start_date",
            EVALUATION_COLUMNS
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(evaluations)
    }

    async fn insert_result(&self, result: EvaluationResult) -> Result<EvaluationResult, AppError> {
        sqlx::query_as::<_, EvaluationResult>(&format!(
            r#"
            INSERT INTO evaluation_results
            (id, evaluation_id, student_id, answers, correct_count, score, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            RESULT_COLUMNS
        ))
        .bind(result.id)
        .bind(result.evaluation_id)
        .bind(result.student_id)
        .bind(&result.answers)
        .bind(result.correct_count)
        .bind(result.score)
        .bind(result.submitted_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Evaluation already submitted".to_string())
            } else {
                tracing::error!("Failed to insert evaluation result: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn list_results(&self, evaluation_id: Uuid) -> Result<Vec<EvaluationResult>, AppError> {
        let results = sqlx::query_as::<_, EvaluationResult>(&format!(
            "SELECT {} FROM evaluation_results WHERE evaluation_id = $1 ORDER BY submitted_at",
            RESULT_COLUMNS
        ))
        .bind(evaluation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }
}
