use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo::User;
use crate::books::repo::Book;

/// Request body for account creation.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Slice of the user echoed back on login.
#[derive(Debug, Serialize)]
pub struct LoginUser {
    pub email: String,
    pub uid: Uuid,
}

/// Response returned after a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub access_token: String,
    pub refresh_token: String,
    pub user: LoginUser,
}

/// Response returned by the refresh endpoint.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Current user plus the books they created.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub books: Vec<Book>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirm {
    pub new_password: String,
    pub confirm_new_password: String,
}
