use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::auth::access::require_role;
use crate::auth::dto::{
    LoginRequest, LoginResponse, LoginUser, MeResponse, MessageResponse, PasswordResetConfirm,
    PasswordResetRequest, SignupRequest, TokenResponse,
};
use crate::auth::guard::{AccessToken, RefreshToken};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo::{is_unique_violation, User};
use crate::auth::tokens::TokenCodec;
use crate::books::repo::Book;
use crate::error::ApiError;
use crate::state::AppState;

const ALLOWED_ROLES: &[&str] = &["admin", "user"];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh_access_token", post(refresh_access_token))
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
        .route("/auth/verify/:token", get(verify_email))
        .route("/auth/password_reset", post(request_password_reset))
        .route(
            "/auth/confirm_password_reset/:token",
            post(confirm_password_reset),
        )
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.password.len() < 5 {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }

    // Advisory pre-check; the unique index is authoritative.
    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::UserAlreadyExists);
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(
        &state.db,
        &payload.username,
        &payload.email,
        &payload.first_name,
        &payload.last_name,
        &hash,
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::UserAlreadyExists
        } else {
            ApiError::Database(e)
        }
    })?;

    let codec = TokenCodec::from_ref(&state);
    let token = codec.issue_action(&user.email)?;
    let link = format!("http://{}/api/v1/auth/verify/{}", state.config.domain, token);
    state
        .notifier
        .enqueue(
            vec![user.email.clone()],
            "Verify your email".into(),
            format!("Please click this link to verify your email: {link}"),
        )
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    // One failure kind for unknown email and wrong password.
    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            ApiError::InvalidCredentials
        })?;

    if !verify_password(&payload.password, &user.password_hash) {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let codec = TokenCodec::from_ref(&state);
    let access_token = codec.sign_access(&user)?;
    let refresh_token = codec.sign_refresh(&user)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(LoginResponse {
        message: "Login successful".into(),
        access_token,
        refresh_token,
        user: LoginUser {
            email: user.email,
            uid: user.id,
        },
    }))
}

#[instrument(skip(state, token))]
pub async fn refresh_access_token(
    State(state): State<AppState>,
    token: RefreshToken,
) -> Result<Json<TokenResponse>, ApiError> {
    let claims = token.0;

    // The guard already validated exp; keep a wall-clock check as well.
    if claims.is_expired() {
        return Err(ApiError::InvalidToken);
    }

    // Re-sign from the live row so the new snapshot carries the current role.
    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    let codec = TokenCodec::from_ref(&state);
    let access_token = codec.sign_access(&user)?;

    info!(user_id = %user.id, "access token refreshed");
    Ok(Json(TokenResponse { access_token }))
}

#[instrument(skip(state, token))]
pub async fn me(
    State(state): State<AppState>,
    token: AccessToken,
) -> Result<Json<MeResponse>, ApiError> {
    let user = require_role(&state, &token.0, ALLOWED_ROLES).await?;
    let books = Book::list_by_user(&state.db, user.id).await?;
    Ok(Json(MeResponse { user, books }))
}

#[instrument(skip(state, token))]
pub async fn logout(
    State(state): State<AppState>,
    token: AccessToken,
) -> Result<Json<MessageResponse>, ApiError> {
    let claims = token.0;
    state
        .revocations
        .revoke(claims.jti, claims.remaining_ttl())
        .await?;
    info!(user_id = %claims.sub, jti = %claims.jti, "logged out");
    Ok(Json(MessageResponse {
        message: "Logged out successfully".into(),
    }))
}

#[instrument(skip(state, token))]
pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let codec = TokenCodec::from_ref(&state);
    let claims = codec.verify_action(&token)?;

    let user = User::find_by_email(&state.db, &claims.email)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    User::mark_verified(&state.db, user.id).await?;
    info!(user_id = %user.id, "email verified");
    Ok(Json(MessageResponse {
        message: "Account verified successfully".into(),
    }))
}

/// Responds 200 whether or not the address is registered, so callers cannot
/// probe which emails exist. The reset mail only goes out for real accounts.
#[instrument(skip(state, payload))]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(mut payload): Json<PasswordResetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if let Some(user) = User::find_by_email(&state.db, &payload.email).await? {
        let codec = TokenCodec::from_ref(&state);
        let token = codec.issue_action(&user.email)?;
        let link = format!(
            "http://{}/api/v1/auth/confirm_password_reset/{}",
            state.config.domain, token
        );
        state
            .notifier
            .enqueue(
                vec![user.email.clone()],
                "Reset your password".into(),
                format!("Please click this link to reset your password: {link}"),
            )
            .await?;
        info!(user_id = %user.id, "password reset requested");
    } else {
        info!(email = %payload.email, "password reset requested for unknown email");
    }

    Ok(Json(MessageResponse {
        message: "Please check your email for instructions to reset your password".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<PasswordResetConfirm>,
) -> Result<Json<MessageResponse>, ApiError> {
    // Checked before the token is touched.
    if payload.new_password != payload.confirm_new_password {
        return Err(ApiError::PasswordsDoNotMatch);
    }

    let codec = TokenCodec::from_ref(&state);
    let claims = codec.verify_action(&token)?;

    let user = User::find_by_email(&state.db, &claims.email)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    let hash = hash_password(&payload.new_password)?;
    User::set_password(&state.db, user.id, &hash).await?;

    info!(user_id = %user.id, "password reset");
    Ok(Json(MessageResponse {
        message: "Password reset successfully".into(),
    }))
}
