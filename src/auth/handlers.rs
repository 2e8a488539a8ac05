use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, MeResponse, RefreshRequest, RegisterRequest},
        extractors::AuthUser,
    },
    error::AuthError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    payload.map(|Json(p)| p).map_err(|rejection| {
        warn!(error = %rejection, "rejected request body");
        AuthError::malformed(rejection.body_text())
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AuthError> {
    let req = body(payload)?;
    let account = state
        .credentials
        .register(&req.name, &req.email, &req.password)
        .await?;
    let tokens = state.keys.issue(&account)?;
    Ok(Json(AuthResponse::new(account, tokens)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AuthError> {
    let req = body(payload)?;
    let account = state.credentials.login(&req.email, &req.password).await?;
    let tokens = state.keys.issue(&account)?;
    Ok(Json(AuthResponse::new(account, tokens)))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AuthError> {
    let req = body(payload)?;
    let claims = state.keys.verify_refresh(&req.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh token rejected");
        AuthError::InvalidCredentials
    })?;

    // Reload so the new pair carries the account's current role.
    let account = state.credentials.account(claims.sub).await?;
    let tokens = state.keys.issue(&account)?;
    info!(account_id = %account.id, "tokens refreshed");
    Ok(Json(AuthResponse::new(account, tokens)))
}

#[instrument(skip(state, user), fields(account_id = %user.account_id, role = %user.role))]
pub async fn get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<MeResponse>, AuthError> {
    let account = state.credentials.account(user.account_id).await?;
    Ok(Json(MeResponse {
        success: true,
        user: account.into(),
    }))
}
