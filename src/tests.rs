use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt; // for `oneshot`

use crate::create_app;
use crate::db::Db;

// El cliente de MongoDB conecta de forma diferida, así que el router se puede
// construir sin servidor. Estas pruebas cubren solo los caminos que rechazan
// antes de tocar el store: validación de registro y autenticación por token.
async fn setup_app() -> axum::Router {
    let db = Db::connect("mongodb://localhost:27017", "taskflow_test")
        .await
        .expect("client options should parse");
    create_app(db)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn error_message(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    body["error"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_root_is_public() {
    let app = setup_app().await;

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_rejects_password_mismatch() {
    let app = setup_app().await;

    let response = app
        .oneshot(post_json(
            "/auth/register",
            json!({
                "email": "alice@x.com",
                "username": "alice",
                "password": "secret1",
                "confirm_password": "secret2"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(response).await, "Las contraseñas no coinciden");
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let app = setup_app().await;

    let response = app
        .oneshot(post_json(
            "/auth/register",
            json!({
                "email": "alice@x.com",
                "username": "alice",
                "password": "abc"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_rejects_implausible_email() {
    let app = setup_app().await;

    let response = app
        .oneshot(post_json(
            "/auth/register",
            json!({
                "email": "no-es-un-email",
                "username": "alice",
                "password": "secret1"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_rejects_future_birth_date() {
    let app = setup_app().await;

    let response = app
        .oneshot(post_json(
            "/auth/register",
            json!({
                "email": "alice@x.com",
                "username": "alice",
                "password": "secret1",
                "birth_date": "2999-01-01"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tasks_require_bearer_token() {
    let app = setup_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/tasks")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let app = setup_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/tasks/stats")
                .header("authorization", "Bearer not.a.token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_bearer_authorization_is_rejected() {
    let app = setup_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/categories")
                .header("authorization", "Basic YWxpY2U6c2VjcmV0")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "name": "Viajes" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
