use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use cloudalbum::config::Config;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

async fn spawn_app() -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", dir.path().join("test.db").display());
    config.storage.upload_folder = dir.path().join("uploads").display().to_string();
    config.observability.metrics_enabled = false;
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;

    let state = cloudalbum::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");
    (cloudalbum::api::router(state).await, dir)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn signup_and_signin(app: &Router, email: &str) -> Value {
    let (status, _) = send(
        app,
        post_json(
            "/api/users/signup",
            &json!({ "email": email, "username": "Tester", "password": "Password1!" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app,
        post_json(
            "/api/users/signin",
            &json!({ "email": email, "password": "Password1!" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"].clone()
}

#[tokio::test]
async fn test_ping_and_liveness() {
    let (app, _dir) = spawn_app().await;

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/api/users/ping")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["message"], "pong");

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/api/system/health/live")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "alive");

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/api/system/health/ready")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ready"], true);
    assert_eq!(body["data"]["checks"]["storage_backend"], "local");
}

#[tokio::test]
async fn test_signup_rules() {
    let (app, _dir) = spawn_app().await;
    let payload = json!({ "email": "dup@example.com", "username": "Dup", "password": "Password1!" });

    let (status, body) = send(&app, post_json("/api/users/signup", &payload)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["email"], "dup@example.com");
    assert_eq!(body["data"]["confirmed"], true);

    let (status, body) = send(&app, post_json("/api/users/signup", &payload)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, _) = send(
        &app,
        post_json(
            "/api/users/signup",
            &json!({ "email": "not-an-email", "username": "x", "password": "Password1!" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        post_json(
            "/api/users/signup",
            &json!({ "email": "short@example.com", "username": "x", "password": "abc" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signin_failures() {
    let (app, _dir) = spawn_app().await;
    signup_and_signin(&app, "alice@example.com").await;

    let (status, body) = send(
        &app,
        post_json(
            "/api/users/signin",
            &json!({ "email": "alice@example.com", "password": "wrong-password" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Password is mismatched or invalid user");

    let (status, body) = send(
        &app,
        post_json(
            "/api/users/signin",
            &json!({ "email": "nobody@example.com", "password": "Password1!" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "User does not exist");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let (app, _dir) = spawn_app().await;

    let (status, _) = send(
        &app,
        Request::builder()
            .uri("/api/users/me")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, authed("GET", "/api/photos", "not-a-real-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_lifecycle() {
    let (app, _dir) = spawn_app().await;
    let tokens = signup_and_signin(&app, "bob@example.com").await;
    let access = tokens["access_token"].as_str().unwrap().to_string();
    let refresh = tokens["refresh_token"].as_str().unwrap().to_string();
    assert_eq!(tokens["token_type"], "Bearer");

    let (status, body) = send(&app, authed("GET", "/api/users/me", &access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "bob@example.com");
    assert_eq!(body["data"]["username"], "Tester");
    let user_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = send(&app, authed("GET", "/api/users", &access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, authed("GET", &format!("/api/users/{user_id}"), &access)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, authed("GET", "/api/users/999", &access)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        post_json(
            "/api/users/refresh",
            &json!({ "email": "bob@example.com", "refresh_token": refresh }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rotated = body["data"]["access_token"].as_str().unwrap().to_string();
    assert_ne!(rotated, access);

    let (status, _) = send(&app, authed("GET", "/api/users/me", &access)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, authed("POST", "/api/users/signout", &rotated)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, authed("GET", "/api/users/me", &rotated)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        post_json(
            "/api/users/refresh",
            &json!({ "email": "bob@example.com", "refresh_token": refresh }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_cookie_authenticates() {
    let (app, _dir) = spawn_app().await;
    send(
        &app,
        post_json(
            "/api/users/signup",
            &json!({ "email": "carol@example.com", "username": "Carol", "password": "Password1!" }),
        ),
    )
    .await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/users/signin",
            &json!({ "email": "carol@example.com", "password": "Password1!" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .unwrap()
        .to_string();

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/api/users/me")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "carol@example.com");
}
