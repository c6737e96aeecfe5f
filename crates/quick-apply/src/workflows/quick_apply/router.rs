use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::answers::{AnswerReview, AnswerStatus, AnswerStore, ReviewError};
use super::domain::AnswerValue;

/// Router exposing the pending-answer review queue.
pub fn answer_review_router<S>(review: Arc<AnswerReview<S>>) -> Router
where
    S: AnswerStore + 'static,
{
    Router::new()
        .route("/api/v1/answers", get(list_handler::<S>))
        .route("/api/v1/answers/approve", post(approve_handler::<S>))
        .route("/api/v1/answers/revoke", post(revoke_handler::<S>))
        .with_state(review)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    status: Option<AnswerStatus>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApproveRequest {
    question: String,
    #[serde(default)]
    answer: Option<AnswerValue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RevokeRequest {
    question: String,
}

pub(crate) async fn list_handler<S>(
    State(review): State<Arc<AnswerReview<S>>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    S: AnswerStore + 'static,
{
    match review.list(query.status) {
        Ok(answers) => (StatusCode::OK, axum::Json(answers)).into_response(),
        Err(err) => review_error(err),
    }
}

pub(crate) async fn approve_handler<S>(
    State(review): State<Arc<AnswerReview<S>>>,
    axum::Json(request): axum::Json<ApproveRequest>,
) -> Response
where
    S: AnswerStore + 'static,
{
    match review.approve(&request.question, request.answer) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => review_error(err),
    }
}

pub(crate) async fn revoke_handler<S>(
    State(review): State<Arc<AnswerReview<S>>>,
    axum::Json(request): axum::Json<RevokeRequest>,
) -> Response
where
    S: AnswerStore + 'static,
{
    match review.revoke(&request.question) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => review_error(err),
    }
}

fn review_error(err: ReviewError) -> Response {
    let status = match &err {
        ReviewError::UnknownQuestion(_) => StatusCode::NOT_FOUND,
        ReviewError::MissingValue(_)
        | ReviewError::OptionNotOffered { .. }
        | ReviewError::SingleValueExpected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ReviewError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": err.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
