//! Owner-scoped `/secrets` endpoints behind the global active-secret gate.

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use common::*;
use vigil::config::GateMode;
use vigil::AppContext;

async fn api_context(except_routes: &[&str]) -> AppContext {
    let mut config = test_config(vec![password_type(), email_type()]);
    config.server.trusted_owner_header = Some("x-user-id".to_string());
    config.global_middleware.except_routes = except_routes.iter().map(|r| r.to_string()).collect();
    context_with(config).await
}

/// Gate satisfied by an active password or an active email address.
async fn either_gate_context(except_routes: &[&str]) -> AppContext {
    let mut config = test_config(vec![password_type(), email_type()]);
    config.server.trusted_owner_header = Some("x-user-id".to_string());
    config.global_middleware.name = GateMode::Any;
    config.global_middleware.types = vec!["password".to_string(), "email".to_string()];
    config.global_middleware.except_routes = except_routes.iter().map(|r| r.to_string()).collect();
    context_with(config).await
}

fn app(context: &AppContext) -> Router {
    context.router().expect("router")
}

async fn call(app: &Router, method: Method, uri: &str, owner: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(owner) = owner {
        builder = builder.header("x-user-id", owner);
    }
    let response = app.clone().oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

#[tokio::test]
async fn health_is_public() {
    let context = api_context(&[]).await;
    let (status, body) = call(&app(&context), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["secret_types"], 2);
}

#[tokio::test]
async fn listing_shows_only_the_callers_secrets() {
    let context = api_context(&[]).await;
    store(&context, &user("1"), "password", STRONG_PASSWORD).await;
    store(&context, &user("1"), "email", "ada@example.com").await;
    store(&context, &user("2"), "password", "AnotherHorse77").await;
    let app = app(&context);

    let (status, body) = call(&app, Method::GET, "/secrets", Some("1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["meta"]["current_page"], 1);
    assert_eq!(body["meta"]["last_page"], 1);

    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    // Newest first.
    assert_eq!(data[0]["type"], "email");
    assert_eq!(data[0]["state"], "active");
    assert_eq!(data[0]["display"]["actual"], "ada@example.com");
    assert_eq!(data[1]["type"], "password");
    assert!(data[1]["display"].get("actual").is_none());
    assert!(data[1].get("value").is_none());
}

#[tokio::test]
async fn listing_filters_and_pages() {
    let context = api_context(&[]).await;
    let owner = user("1");
    store(&context, &owner, "password", STRONG_PASSWORD).await;
    store(&context, &owner, "email", "ada@example.com").await;
    let app = app(&context);

    let (_, by_type) = call(&app, Method::GET, "/secrets?type=password", Some("1")).await;
    assert_eq!(by_type["total"], 1);
    assert_eq!(by_type["data"][0]["type"], "password");

    let (_, visible) = call(&app, Method::GET, "/secrets?hidden=false", Some("1")).await;
    assert_eq!(visible["total"], 1);
    assert_eq!(visible["data"][0]["type"], "email");

    let (_, paged) = call(&app, Method::GET, "/secrets?per_page=1&page=2", Some("1")).await;
    assert_eq!(paged["total"], 2);
    assert_eq!(paged["meta"]["last_page"], 2);
    assert_eq!(paged["data"].as_array().unwrap().len(), 1);
    assert_eq!(paged["data"][0]["type"], "password");

    let (_, full) = call(&app, Method::GET, "/secrets?full_data=true", Some("1")).await;
    assert_eq!(full["total"], 2);
    assert!(full.get("meta").is_none());

    let (status, beyond) =
        call(&app, Method::GET, &format!("/secrets?page={}&per_page=2", i64::MAX), Some("1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(beyond["total"], 2);
    assert!(beyond["data"].as_array().unwrap().is_empty());

    let (status, invalid) = call(&app, Method::GET, "/secrets?type=otp", Some("1")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(invalid["fields"]["type"][0], "The selected type is invalid.");
}

#[tokio::test]
async fn show_delete_and_restore_one_secret() {
    let context = api_context(&[]).await;
    let owner = user("1");
    store(&context, &owner, "password", STRONG_PASSWORD).await;
    let email = store(&context, &owner, "email", "ada@example.com").await.remove(0);
    let app = app(&context);
    let uri = format!("/secrets/{}", email.uuid);

    let (status, shown) = call(&app, Method::GET, &uri, Some("1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shown["uuid"], email.uuid.to_string());
    assert_eq!(shown["type"], "email");

    let (status, deleted) = call(&app, Method::DELETE, &uri, Some("1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["state"], "trashed");
    assert!(deleted["deleted_at"].is_string());

    let (status, _) = call(&app, Method::GET, &uri, Some("1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, trashed) = call(&app, Method::GET, "/secrets?trashed=only", Some("1")).await;
    assert_eq!(trashed["total"], 1);

    let (status, restored) = call(&app, Method::POST, &format!("{}/restore", uri), Some("1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(restored["state"], "active");
    assert!(restored["deleted_at"].is_null());

    let visible = context.engine.active_values(&owner, "email").await.unwrap();
    assert_eq!(visible, vec!["ada@example.com".to_string()]);
}

#[tokio::test]
async fn other_owners_secrets_are_forbidden() {
    let context = api_context(&[]).await;
    let secret = store(&context, &user("1"), "password", STRONG_PASSWORD).await.remove(0);
    store(&context, &user("2"), "password", "AnotherHorse77").await;
    let app = app(&context);
    let uri = format!("/secrets/{}", secret.uuid);

    let (status, body) = call(&app, Method::GET, &uri, Some("2")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "This action is unauthorized.");

    let (status, _) = call(&app, Method::DELETE, &uri, Some("2")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(context.engine.latest_secret(&user("1"), "password").await.unwrap().is_some());
}

#[tokio::test]
async fn unknown_and_malformed_ids_are_not_found() {
    let context = api_context(&[]).await;
    store(&context, &user("1"), "password", STRONG_PASSWORD).await;
    let app = app(&context);

    let unknown = format!("/secrets/{}", vigil::domain::SecretUuid::new());
    assert_eq!(call(&app, Method::GET, &unknown, Some("1")).await.0, StatusCode::NOT_FOUND);
    assert_eq!(call(&app, Method::GET, "/secrets/not-a-uuid", Some("1")).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn gate_rejects_owners_without_an_active_password() {
    let context = api_context(&[]).await;
    store(&context, &user("3"), "email", "grace@example.com").await;
    let app = app(&context);

    let (status, body) = call(&app, Method::GET, "/secrets", Some("3")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "User has no active password.");

    let (status, _) = call(&app, Method::GET, "/secrets", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn excepted_routes_skip_the_gate() {
    let context = api_context(&["secrets"]).await;
    store(&context, &user("3"), "email", "grace@example.com").await;
    let app = app(&context);

    let (status, body) = call(&app, Method::GET, "/secrets", Some("3")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    // Only the listing is excepted.
    let uuid = body["data"][0]["uuid"].as_str().unwrap().to_string();
    let (status, _) = call(&app, Method::GET, &format!("/secrets/{}", uuid), Some("3")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn either_gate_passes_with_any_configured_type() {
    let context = either_gate_context(&[]).await;
    store(&context, &user("20"), "email", "lin@example.com").await;
    let app = app(&context);

    let (status, body) = call(&app, Method::GET, "/secrets", Some("20")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn either_gate_names_every_type_when_none_is_active() {
    let context = either_gate_context(&[]).await;
    let app = app(&context);

    let (status, body) = call(&app, Method::GET, "/secrets", Some("21")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("User has no active "));
    assert!(message.contains("password"));
    assert!(message.contains("email address"));
}

#[tokio::test]
async fn either_gate_skips_excepted_routes() {
    let context = either_gate_context(&["secrets"]).await;
    let app = app(&context);

    let (status, body) = call(&app, Method::GET, "/secrets", Some("22")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);

    let unknown = format!("/secrets/{}", vigil::domain::SecretUuid::new());
    assert_eq!(call(&app, Method::GET, &unknown, Some("22")).await.0, StatusCode::UNAUTHORIZED);
}
