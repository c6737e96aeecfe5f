use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::quick_apply::answers::{AnswerReview, MemoryAnswerStore};
use crate::workflows::quick_apply::domain::{AnswerKind, AnswerValue};
use crate::workflows::quick_apply::router::answer_review_router;

fn router(store: &MemoryAnswerStore) -> axum::Router {
    answer_review_router(Arc::new(AnswerReview::new(Arc::new(store.clone()))))
}

fn store() -> MemoryAnswerStore {
    MemoryAnswerStore::with_book(book(vec![
        (
            "Will you relocate?",
            pending(&["Yes", "No"], AnswerValue::text("No"), AnswerKind::SingleSelect),
        ),
        (
            "Years of experience",
            approved(&[], AnswerValue::text("5"), AnswerKind::FreeText),
        ),
    ]))
}

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request builds")
}

async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[tokio::test]
async fn list_route_filters_pending_answers() {
    let response = router(&store())
        .oneshot(
            Request::get("/api/v1/answers?status=pending")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let entries = payload.as_array().expect("array payload");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["question"], "Will you relocate?");
    assert_eq!(entries[0]["status"], "pending");
    assert_eq!(entries[0]["kind"], "single_select");
}

#[tokio::test]
async fn approve_route_without_answer_keeps_recorded_value() {
    let store = store();
    let response = router(&store)
        .oneshot(post_json(
            "/api/v1/answers/approve",
            json!({ "question": "Will you relocate?" }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "approved");
    assert_eq!(payload["answer"], "No");
    let entry = store
        .snapshot()
        .get("Will you relocate?")
        .cloned()
        .expect("entry present");
    assert!(entry.verified());
    assert_eq!(entry.answer, Some(AnswerValue::text("No")));
}

#[tokio::test]
async fn approve_route_verifies_answer() {
    let store = store();
    let response = router(&store)
        .oneshot(post_json(
            "/api/v1/answers/approve",
            json!({ "question": "Will you relocate?", "answer": "Yes" }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "approved");
    assert_eq!(payload["answer"], "Yes");
    assert!(store
        .snapshot()
        .get("Will you relocate?")
        .expect("entry")
        .verified());
}

#[tokio::test]
async fn approve_route_rejects_unknown_option() {
    let response = router(&store())
        .oneshot(post_json(
            "/api/v1/answers/approve",
            json!({ "question": "Will you relocate?", "answer": "Maybe" }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .expect("error message")
        .contains("Maybe"));
}

#[tokio::test]
async fn revoke_route_returns_not_found_for_unknown_question() {
    let response = router(&store())
        .oneshot(post_json(
            "/api/v1/answers/revoke",
            json!({ "question": "Salary expectations" }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn revoke_route_moves_answer_back_to_pending() {
    let store = store();
    let response = router(&store)
        .oneshot(post_json(
            "/api/v1/answers/revoke",
            json!({ "question": "Years of experience" }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!store
        .snapshot()
        .get("Years of experience")
        .expect("entry")
        .verified());
}
