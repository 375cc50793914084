// src/db/mod.rs

//! Document store access.
//!
//! Handlers talk to the stores through these traits so the same router runs
//! on Postgres in production and fully in memory for development and tests.

pub mod memory;
pub mod postgres;
pub mod vault;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        course::Course,
        evaluation::{Evaluation, EvaluationResult},
        user::User,
    },
};

/// A read-modify-write step applied to one course document.
/// Returning an error aborts the write.
pub type CourseMutation = Box<dyn FnOnce(&mut Course) -> Result<(), AppError> + Send>;

#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn list_courses(&self) -> Result<Vec<Course>, AppError>;

    async fn get_course(&self, id: Uuid) -> Result<Option<Course>, AppError>;

    async fn insert_course(&self, course: Course) -> Result<Course, AppError>;

    /// Loads the course, applies `mutation` and persists the whole document.
    /// Concurrent mutations of the same course are serialized.
    async fn update_course(&self, id: Uuid, mutation: CourseMutation) -> Result<Course, AppError>;

    /// Removes the course and its evaluations. Returns false if it did not exist.
    async fn delete_course(&self, id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` if the username or email is taken.
    async fn insert_user(&self, user: User) -> Result<User, AppError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn add_enrolled_course(&self, user_id: Uuid, course_id: Uuid) -> Result<(), AppError>;

    async fn add_created_course(&self, user_id: Uuid, course_id: Uuid) -> Result<(), AppError>;
}

#[async_trait]
pub trait EvaluationStore: Send + Sync {
    async fn insert_evaluation(&self, evaluation: Evaluation) -> Result<Evaluation, AppError>;

    async fn get_evaluation(&self, id: Uuid) -> Result<Option<Evaluation>, AppError>;

    async fn list_evaluations(&self, course_id: Uuid) -> Result<Vec<Evaluation>, AppError>;

    /// Fails with `Conflict` if the student already has a result for the evaluation.
    async fn insert_result(&self, result: EvaluationResult) -> Result<EvaluationResult, AppError>;

    async fn list_results(&self, evaluation_id: Uuid) -> Result<Vec<EvaluationResult>, AppError>;
}

/// Everything the document side of the application needs.
pub trait DocumentStore: CourseStore + UserStore + EvaluationStore {}

impl<T: CourseStore + UserStore + EvaluationStore> DocumentStore for T {}
