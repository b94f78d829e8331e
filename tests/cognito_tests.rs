use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use cloudalbum::clients::cognito::secret_hash;
use cloudalbum::config::{Config, IdentityProviderKind};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

const CLIENT_ID: &str = "album-client";
const CLIENT_SECRET: &str = "album-secret";

struct PoolUser {
    sub: String,
    password: String,
    name: String,
}

/// In-process stand-in for the Cognito user pool JSON API.
#[derive(Default)]
struct UserPool {
    users: HashMap<String, PoolUser>,
    access: HashMap<String, String>,
    refresh: HashMap<String, String>,
    issued: usize,
    calls: Vec<String>,
}

type Pool = Arc<Mutex<UserPool>>;

fn fault(kind: &str, message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "__type": kind, "message": message })),
    )
        .into_response()
}

fn secret_ok(given: Option<&str>, username: &str) -> bool {
    given == Some(secret_hash(CLIENT_SECRET, username, CLIENT_ID).as_str())
}

async fn cognito(State(pool): State<Pool>, headers: HeaderMap, body: Bytes) -> Response {
    let target = headers
        .get("X-Amz-Target")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("AWSCognitoIdentityProviderService."))
        .unwrap_or_default()
        .to_string();
    let body: Value = serde_json::from_slice(&body).unwrap();
    let mut pool = pool.lock().unwrap();
    pool.calls.push(target.clone());

    match target.as_str() {
        "SignUp" => {
            let email = body["Username"].as_str().unwrap().to_string();
            if !secret_ok(body["SecretHash"].as_str(), &email) {
                return fault("NotAuthorizedException", "Unable to verify secret hash");
            }
            if pool.users.contains_key(&email) {
                return fault("UsernameExistsException", "User already exists");
            }
            let name = body["UserAttributes"]
                .as_array()
                .unwrap()
                .iter()
                .find(|a| a["Name"] == "name")
                .and_then(|a| a["Value"].as_str())
                .unwrap_or_default()
                .to_string();
            let sub = format!("sub-{}", pool.users.len() + 1);
            pool.users.insert(
                email,
                PoolUser {
                    sub: sub.clone(),
                    password: body["Password"].as_str().unwrap().to_string(),
                    name,
                },
            );
            Json(json!({ "UserSub": sub, "UserConfirmed": false })).into_response()
        }
        "InitiateAuth" => {
            let params = &body["AuthParameters"];
            let email = match body["AuthFlow"].as_str() {
                Some("USER_PASSWORD_AUTH") => {
                    let email = params["USERNAME"].as_str().unwrap().to_string();
                    let Some(user) = pool.users.get(&email) else {
                        return fault("UserNotFoundException", "User does not exist.");
                    };
                    if user.password != params["PASSWORD"].as_str().unwrap_or_default() {
                        return fault("NotAuthorizedException", "Incorrect username or password.");
                    }
                    email
                }
                Some("REFRESH_TOKEN_AUTH") => {
                    let token = params["REFRESH_TOKEN"].as_str().unwrap_or_default();
                    let Some(email) = pool.refresh.get(token).cloned() else {
                        return fault("NotAuthorizedException", "Invalid Refresh Token");
                    };
                    email
                }
                _ => return fault("InvalidParameterException", "Unsupported flow"),
            };
            if !secret_ok(params["SECRET_HASH"].as_str(), &email) {
                return fault("NotAuthorizedException", "Unable to verify secret hash");
            }

            pool.issued += 1;
            let access = format!("access-{}", pool.issued);
            pool.access.insert(access.clone(), email.clone());

            let mut result = json!({ "AccessToken": access, "ExpiresIn": 3600, "TokenType": "Bearer" });
            if body["AuthFlow"] == "USER_PASSWORD_AUTH" {
                let refresh = format!("refresh-{}", pool.issued);
                pool.refresh.insert(refresh.clone(), email);
                result["RefreshToken"] = Value::String(refresh);
            }
            Json(json!({ "AuthenticationResult": result })).into_response()
        }
        "GetUser" => {
            let token = body["AccessToken"].as_str().unwrap_or_default();
            let Some(email) = pool.access.get(token) else {
                return fault("NotAuthorizedException", "Access Token has been revoked");
            };
            let user = &pool.users[email];
            Json(json!({
                "Username": user.sub,
                "UserAttributes": [
                    { "Name": "sub", "Value": user.sub },
                    { "Name": "email", "Value": email },
                    { "Name": "name", "Value": user.name },
                ],
            }))
            .into_response()
        }
        "GlobalSignOut" => {
            let token = body["AccessToken"].as_str().unwrap_or_default();
            let Some(email) = pool.access.get(token).cloned() else {
                return fault("NotAuthorizedException", "Access Token has been revoked");
            };
            pool.access.retain(|_, owner| *owner != email);
            pool.refresh.retain(|_, owner| *owner != email);
            Json(json!({})).into_response()
        }
        other => fault("InvalidAction", &format!("Unknown operation {other}")),
    }
}

async fn spawn_pool() -> (String, Pool) {
    let pool = Pool::default();
    let app = Router::new()
        .route("/", post(cognito))
        .with_state(pool.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/"), pool)
}

async fn spawn_app() -> (Router, Pool, TempDir) {
    let (endpoint, pool) = spawn_pool().await;
    let dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", dir.path().join("test.db").display());
    config.storage.upload_folder = dir.path().join("uploads").display().to_string();
    config.observability.metrics_enabled = false;
    config.identity.provider = IdentityProviderKind::Cognito;
    config.identity.cognito.client_id = CLIENT_ID.to_string();
    config.identity.cognito.client_secret = CLIENT_SECRET.to_string();
    config.identity.cognito.endpoint = Some(endpoint);

    let state = cloudalbum::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");
    (cloudalbum::api::router(state).await, pool, dir)
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

#[tokio::test]
async fn test_cognito_signup_and_signin_errors() {
    let (app, _pool, _dir) = spawn_app().await;
    let payload = json!({ "email": "dana@example.com", "username": "Dana", "password": "Password1!" });

    let (status, body) = send(&app, post_json("/api/users/signup", &payload)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["email"], "dana@example.com");
    assert_eq!(body["data"]["confirmed"], false);

    let (status, _) = send(&app, post_json("/api/users/signup", &payload)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        post_json(
            "/api/users/signin",
            &json!({ "email": "dana@example.com", "password": "WrongPass1!" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Password is mismatched or invalid user");

    let (status, body) = send(
        &app,
        post_json(
            "/api/users/signin",
            &json!({ "email": "ghost@example.com", "password": "Password1!" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "User does not exist");
}

#[tokio::test]
async fn test_cognito_session_lifecycle() {
    let (app, pool, _dir) = spawn_app().await;
    send(
        &app,
        post_json(
            "/api/users/signup",
            &json!({ "email": "erin@example.com", "username": "Erin", "password": "Password1!" }),
        ),
    )
    .await;

    let (status, body) = send(
        &app,
        post_json(
            "/api/users/signin",
            &json!({ "email": "erin@example.com", "password": "Password1!" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["data"]["access_token"].as_str().unwrap().to_string();
    let refresh = body["data"]["refresh_token"].as_str().unwrap().to_string();

    // First authenticated call mirrors the pool account into the users table
    let (status, body) = send(&app, authed("GET", "/api/users/me", &access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "erin@example.com");
    assert_eq!(body["data"]["username"], "Erin");
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = send(&app, authed("GET", "/api/users/me", &access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"].as_i64().unwrap(), id);

    let (status, body) = send(&app, authed("GET", "/api/users", &access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        post_json(
            "/api/users/refresh",
            &json!({ "email": "erin@example.com", "refresh_token": refresh }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rotated = body["data"]["access_token"].as_str().unwrap().to_string();
    assert_ne!(rotated, access);
    assert_eq!(body["data"]["refresh_token"], refresh.as_str());

    let (status, _) = send(&app, authed("POST", "/api/users/signout", &rotated)).await;
    assert_eq!(status, StatusCode::OK);

    for token in [&access, &rotated] {
        let (status, _) = send(&app, authed("GET", "/api/users/me", token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, _) = send(
        &app,
        post_json(
            "/api/users/refresh",
            &json!({ "email": "erin@example.com", "refresh_token": refresh }),
        ),
    )
    .await;
    assert_ne!(status, StatusCode::OK);

    let calls = pool.lock().unwrap().calls.clone();
    assert!(calls.contains(&"GlobalSignOut".to_string()));
    assert_eq!(calls.iter().filter(|c| *c == "SignUp").count(), 1);
}
