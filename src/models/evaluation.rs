// src/models/evaluation.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;
use validator::Validate;

/// A multiple-choice question inside an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct EvaluationQuestion {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    /// Index into `options` of the correct answer.
    pub correct_index: i32,
}

/// Represents the 'evaluations' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Evaluation {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub questions: Json<Vec<EvaluationQuestion>>,
    pub start_date: chrono::DateTime<chrono::Utc>,
    pub end_date: chrono::DateTime<chrono::Utc>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Evaluation {
    pub fn is_open_at(&self, at: chrono::DateTime<chrono::Utc>) -> bool {
        self.start_date <= at && at <= self.end_date
    }
}

/// DTO for sending a question to students (excludes the correct answer).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub text: String,
    pub options: Vec<String>,
}

/// DTO for sending an evaluation to students.
#[derive(Debug, Serialize)]
pub struct PublicEvaluation {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub questions: Vec<PublicQuestion>,
    pub start_date: chrono::DateTime<chrono::Utc>,
    pub end_date: chrono::DateTime<chrono::Utc>,
}

impl From<Evaluation> for PublicEvaluation {
    fn from(evaluation: Evaluation) -> Self {
        Self {
            id: evaluation.id,
            course_id: evaluation.course_id,
            title: evaluation.title,
            questions: evaluation
                .questions
                .0
                .into_iter()
                .map(|q| PublicQuestion {
                    text: q.text,
                    options: q.options,
                })
                .collect(),
            start_date: evaluation.start_date,
            end_date: evaluation.end_date,
        }
    }
}

/// Represents the 'evaluation_results' table.
/// At most one row exists per (evaluation_id, student_id).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EvaluationResult {
    pub id: Uuid,
    pub evaluation_id: Uuid,
    pub student_id: Uuid,
    pub answers: Vec<i32>,
    pub correct_count: i32,
    pub score: f64,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating an evaluation.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateEvaluationRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, message = "An evaluation needs at least one question."), nested)]
    pub questions: Vec<EvaluationQuestion>,
    pub start_date: chrono::DateTime<chrono::Utc>,
    pub end_date: chrono::DateTime<chrono::Utc>,
}

/// DTO for submitting answers. One option index per question, in order.
#[derive(Debug, Deserialize)]
pub struct SubmitEvaluationRequest {
    pub answers: Vec<i32>,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 {
        return Err(validator::ValidationError::new("at_least_two_options"));
    }
    for opt in options {
        if opt.is_empty() || opt.len() > 500 {
            return Err(validator::ValidationError::new("invalid_option_length"));
        }
    }
    Ok(())
}
