// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::MAX_UPLOAD_BYTES,
    handlers::{auth, contents, courses, evaluations, files, health, tabs},
    state::AppState,
    utils::jwt::{auth_middleware, staff_middleware},
};

/// Assembles the main application router.
///
/// * Public reads, authenticated routes and staff-only routes live in
///   separate routers so each gets its own middleware stack.
/// * Everything is served under `/api`.
/// * Applies global middleware (Trace, CORS, body limit).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let public_routes = Router::new()
        .route("/health", get(health::health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/courses", get(courses::list_courses))
        .route("/courses/{id}", get(courses::get_course))
        .route("/courses/{id}/image", get(courses::get_image))
        .route(
            "/courses/{id}/evaluations",
            get(evaluations::list_course_evaluations),
        )
        .route(
            "/courses/{id}/topics/{topic_id}/files",
            get(files::list_topic_files),
        )
        .route(
            "/courses/{id}/topics/{topic_id}/subtopics/{subtopic_id}/files",
            get(files::list_subtopic_files),
        )
        .route("/files/{id}", get(files::download_file))
        .route("/evaluations/{id}", get(evaluations::get_evaluation));

    let user_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/courses/{id}/enroll", post(courses::enroll))
        .route(
            "/courses/{id}/topics/{topic_id}/files",
            post(files::upload_to_topic),
        )
        .route(
            "/courses/{id}/topics/{topic_id}/subtopics/{subtopic_id}/files",
            post(files::upload_to_subtopic),
        )
        .route("/files/{id}", delete(files::delete_file))
        .route("/evaluations/{id}/submit", post(evaluations::submit_evaluation))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let staff_routes = Router::new()
        .route("/courses", post(courses::create_course))
        .route(
            "/courses/{id}",
            put(courses::update_course).delete(courses::delete_course),
        )
        .route("/courses/{id}/image", put(courses::upload_image))
        .route("/courses/{id}/tabs", post(tabs::create_tab))
        .route(
            "/courses/{id}/tabs/{tab_id}",
            put(tabs::update_tab).delete(tabs::delete_tab),
        )
        .route(
            "/courses/{id}/tabs/{tab_id}/contents",
            post(contents::create_content),
        )
        .route(
            "/courses/{id}/tabs/{tab_id}/contents/{content_id}",
            put(contents::update_content).delete(contents::delete_content),
        )
        .route(
            "/courses/{id}/evaluations",
            post(evaluations::create_evaluation),
        )
        .route("/evaluations/{id}/results", get(evaluations::list_results))
        // Double middleware protection: Auth first, then staff check
        .layer(middleware::from_fn(staff_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let api = Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(staff_routes);

    Router::new()
        .nest("/api", api)
        // Global Middleware (applied from outside in)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    fn app() -> Router {
        let (state, _worker) = AppState::in_memory(Config::in_memory("secret")).unwrap();
        create_router(state)
    }

    async fn status_of(method: Method, uri: &str) -> u16 {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        app().oneshot(request).await.unwrap().status().as_u16()
    }

    #[tokio::test]
    async fn writes_require_a_token() {
        assert_eq!(status_of(Method::POST, "/api/courses").await, 401);
        assert_eq!(status_of(Method::DELETE, "/api/files/00000000-0000-0000-0000-000000000000").await, 401);
        assert_eq!(status_of(Method::GET, "/api/auth/me").await, 401);
    }

    #[tokio::test]
    async fn reads_are_public() {
        assert_eq!(status_of(Method::GET, "/api/courses").await, 200);
        assert_eq!(status_of(Method::GET, "/api/health").await, 200);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(status_of(Method::GET, &format!("/api/courses/{}", id)).await, 404);
        assert_eq!(status_of(Method::GET, &format!("/api/evaluations/{}", id)).await, 404);
    }
}
