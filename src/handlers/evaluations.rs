// src/handlers/evaluations.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::types::Json as JsonColumn;
use uuid::Uuid;
use validator::Validate;

use super::courses::ensure_course_editor;
use crate::{
    error::AppError,
    models::evaluation::{
        CreateEvaluationRequest, Evaluation, EvaluationQuestion, EvaluationResult,
        PublicEvaluation, SubmitEvaluationRequest,
    },
    state::AppState,
    utils::jwt::Claims,
};

/// Grades a submission.
/// Returns (correct_count, score_percentage).
fn calculate_score(questions: &[EvaluationQuestion], answers: &[i32]) -> (i32, f64) {
    if questions.is_empty() {
        return (0, 0.0);
    }

    let correct_count = questions
        .iter()
        .zip(answers)
        .filter(|(question, answer)| question.correct_index == **answer)
        .count();

    let score = (correct_count as f64 / questions.len() as f64) * 100.0;
    (correct_count as i32, score)
}

fn check_answer_keys(questions: &[EvaluationQuestion]) -> Result<(), AppError> {
    for (index, question) in questions.iter().enumerate() {
        let in_range = usize::try_from(question.correct_index)
            .map(|i| i < question.options.len())
            .unwrap_or(false);
        if !in_range {
            return Err(AppError::BadRequest(format!(
                "Question {} has no option at index {}",
                index + 1,
                question.correct_index
            )));
        }
    }
    Ok(())
}

async fn load_evaluation(state: &AppState, id: Uuid) -> Result<Evaluation, AppError> {
    state
        .evaluations
        .get_evaluation(id)
        .await?
        .ok_or(AppError::NotFound("Evaluation not found".to_string()))
}

/// Creates an evaluation for a course.
/// Course staff only.
pub async fn create_evaluation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<Uuid>,
    Json(payload): Json<CreateEvaluationRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    check_answer_keys(&payload.questions)?;
    if payload.end_date <= payload.start_date {
        return Err(AppError::BadRequest(
            "Evaluation must end after it starts".to_string(),
        ));
    }

    let course = state
        .courses
        .get_course(course_id)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;
    ensure_course_editor(&course, &claims)?;

    let evaluation = state
        .evaluations
        .insert_evaluation(Evaluation {
            id: Uuid::new_v4(),
            course_id,
            title: payload.title,
            questions: JsonColumn(payload.questions),
            start_date: payload.start_date,
            end_date: payload.end_date,
            created_at: None,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(evaluation)))
}

/// Lists a course's evaluations without their answer keys.
pub async fn list_course_evaluations(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let evaluations: Vec<PublicEvaluation> = state
        .evaluations
        .list_evaluations(course_id)
        .await?
        .into_iter()
        .map(PublicEvaluation::from)
        .collect();

    Ok(Json(evaluations))
}

/// Retrieves one evaluation without its answer keys.
pub async fn get_evaluation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let evaluation = load_evaluation(&state, id).await?;
    Ok(Json(PublicEvaluation::from(evaluation)))
}

/// Submits the caller's answers.
///
/// * Must happen inside the evaluation window.
/// * One answer per question, in question order.
/// * Only one submission per student; a second one is a 409.
pub async fn submit_evaluation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitEvaluationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let evaluation = load_evaluation(&state, id).await?;

    let now = chrono::Utc::now();
    if !evaluation.is_open_at(now) {
        return Err(AppError::BadRequest("Evaluation is not open".to_string()));
    }

    if req.answers.len() != evaluation.questions.len() {
        return Err(AppError::BadRequest(format!(
            "Expected {} answers, got {}",
            evaluation.questions.len(),
            req.answers.len()
        )));
    }

    let (correct_count, score) = calculate_score(&evaluation.questions, &req.answers);

    let result = state
        .evaluations
        .insert_result(EvaluationResult {
            id: Uuid::new_v4(),
            evaluation_id: id,
            student_id,
            answers: req.answers,
            correct_count,
            score,
            submitted_at: now,
        })
        .await
        .map_err(|e| {
            if matches!(e, AppError::Conflict(_)) {
                tracing::info!("Duplicate submission of {} by {}", id, claims.username);
            }
            e
        })?;

    Ok((StatusCode::CREATED, Json(result)))
}

/// Lists all submissions of an evaluation.
/// Course staff only.
pub async fn list_results(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let evaluation = load_evaluation(&state, id).await?;

    let course = state
        .courses
        .get_course(evaluation.course_id)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;
    ensure_course_editor(&course, &claims)?;

    let results = state.evaluations.list_results(id).await?;
    Ok(Json(results))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct_index: i32) -> EvaluationQuestion {
        EvaluationQuestion {
            text: "Pick one".to_string(),
            options: vec!["A".to_string(), "B".to_string(), "C".to_string()],
            correct_index,
        }
    }

    #[test]
    fn test_calculate_score_perfect() {
        let questions = vec![question(0), question(2)];
        let (correct, score) = calculate_score(&questions, &[0, 2]);
        assert_eq!(correct, 2);
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_calculate_score_half() {
        let questions = vec![question(0), question(1)];
        let (correct, score) = calculate_score(&questions, &[0, 2]);
        assert_eq!(correct, 1);
        assert_eq!(score, 50.0);
    }

    #[test]
    fn test_calculate_score_zero() {
        let questions = vec![question(1)];
        let (correct, score) = calculate_score(&questions, &[0]);
        assert_eq!(correct, 0);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_calculate_score_no_questions() {
        assert_eq!(calculate_score(&[], &[]), (0, 0.0));
    }

    #[test]
    fn answer_keys_must_point_at_an_option() {
        assert!(check_answer_keys(&[question(2)]).is_ok());
        assert!(check_answer_keys(&[question(3)]).is_err());
        assert!(check_answer_keys(&[question(-1)]).is_err());
    }
}
