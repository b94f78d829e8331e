use axum::{
    Extension, Json,
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tower_sessions::Session;

use super::validation::validate_user_id;
use super::{
    ApiError, ApiResponse, AppState, MessageResponse, SignupDto, TokensDto, UserDto,
};
use crate::models::user::User;
use crate::services::{IdentityError, RefreshRequest, SigninRequest, SignupRequest};

/// Session key holding the access token issued at sign-in.
const SESSION_TOKEN_KEY: &str = "access_token";

/// Access token the current request was authenticated with.
#[derive(Debug, Clone)]
pub struct AccessToken(pub String);

// ============================================================================
// Middleware
// ============================================================================

/// Resolves the caller from `Authorization: Bearer <token>` or, failing that,
/// the token stored in the session cookie at sign-in.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = match extract_bearer_token(&headers) {
        Some(token) => Some(token),
        None => session.get::<String>(SESSION_TOKEN_KEY).await.ok().flatten(),
    };

    let Some(token) = token else {
        return Err(ApiError::Unauthorized("Missing access token".to_string()));
    };

    let user = match state.identity().authenticate(&token).await {
        Ok(user) => user,
        Err(IdentityError::Unauthorized) => {
            return Err(ApiError::Unauthorized(
                "Invalid or expired access token".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::Span::current().record("user_id", user.id);

    request.extensions_mut().insert(user);
    request.extensions_mut().insert(AccessToken(token));

    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
        && !token.trim().is_empty()
    {
        return Some(token.trim().to_string());
    }

    None
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /users/ping
pub async fn ping() -> Json<ApiResponse<MessageResponse>> {
    tracing::debug!("ping");
    Json(ApiResponse::success(MessageResponse {
        message: "pong".to_string(),
    }))
}

/// POST /users/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.identity().signup(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(SignupDto::from(result))),
    ))
}

/// POST /users/signin
/// Returns bearer tokens and remembers the access token in the session
pub async fn signin(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<SigninRequest>,
) -> Result<Json<ApiResponse<TokensDto>>, ApiError> {
    let tokens = state.identity().signin(payload).await?;

    if let Err(e) = session.insert(SESSION_TOKEN_KEY, &tokens.access_token).await {
        return Err(ApiError::internal(format!("Failed to create session: {e}")));
    }

    Ok(Json(ApiResponse::success(TokensDto::from(tokens))))
}

/// POST /users/refresh
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<TokensDto>>, ApiError> {
    let tokens = state.identity().refresh(payload).await?;

    if let Err(e) = session.insert(SESSION_TOKEN_KEY, &tokens.access_token).await {
        return Err(ApiError::internal(format!("Failed to update session: {e}")));
    }

    Ok(Json(ApiResponse::success(TokensDto::from(tokens))))
}

/// POST /users/signout
pub async fn signout(
    State(state): State<Arc<AppState>>,
    session: Session,
    Extension(AccessToken(token)): Extension<AccessToken>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.identity().signout(&token).await?;
    let _ = session.flush().await;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Signed out".to_string(),
    })))
}

/// GET /users/me
pub async fn me(Extension(user): Extension<User>) -> Json<ApiResponse<UserDto>> {
    Json(ApiResponse::success(UserDto::from(user)))
}

/// GET /users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<UserDto>>>, ApiError> {
    let users = state.identity().list_users().await?;
    Ok(Json(ApiResponse::success(
        users.into_iter().map(UserDto::from).collect(),
    )))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let id = validate_user_id(id)?;
    let user = state
        .identity()
        .get_user(id)
        .await
        .map_err(|e| match e {
            IdentityError::UserNotFound => ApiError::not_found("User", id),
            other => other.into(),
        })?;
    Ok(Json(ApiResponse::success(UserDto::from(user))))
}
