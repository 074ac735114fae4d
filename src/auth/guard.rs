use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::auth::tokens::{SessionClaims, TokenCodec, TokenKind};
use crate::error::ApiError;
use crate::state::AppState;

/// Verified access-token claims, extracted from `Authorization: Bearer`.
pub struct AccessToken(pub SessionClaims);

/// Verified refresh-token claims.
pub struct RefreshToken(pub SessionClaims);

/// The shared gate both guards run: extract bearer credential, verify the
/// signature, consult the revocation store, then check the token kind. The
/// two guards differ only in the expected kind.
async fn authenticate(
    parts: &Parts,
    state: &AppState,
    expected: TokenKind,
) -> Result<SessionClaims, ApiError> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthenticated)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthenticated)?;

    let codec = TokenCodec::from_ref(state);
    let claims = codec.verify_session(token).map_err(|e| {
        warn!("invalid or expired token");
        e
    })?;

    if state.revocations.is_revoked(claims.jti).await? {
        warn!(jti = %claims.jti, "revoked token presented");
        return Err(ApiError::RevokedToken);
    }

    if claims.kind != expected {
        return Err(match expected {
            TokenKind::Access => ApiError::AccessTokenRequired,
            TokenKind::Refresh => ApiError::RefreshTokenRequired,
        });
    }

    Ok(claims)
}

#[async_trait]
impl FromRequestParts<AppState> for AccessToken {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state, TokenKind::Access)
            .await
            .map(AccessToken)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for RefreshToken {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state, TokenKind::Refresh)
            .await
            .map(RefreshToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::User;
    use std::time::Duration;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn test_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "jane".into(),
            email: "jane@example.com".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            role: "user".into(),
            is_verified: true,
            password_hash: "unused".into(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    fn parts_with_bearer(token: Option<&str>) -> Parts {
        let mut builder = axum::http::Request::builder().uri("/");
        if let Some(t) = token {
            builder = builder.header(axum::http::header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let (parts, _) = builder.body(()).expect("request").into_parts();
        parts
    }

    #[tokio::test]
    async fn missing_header_is_unauthenticated() {
        let state = AppState::fake();
        let mut parts = parts_with_bearer(None);
        let err = AccessToken::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiError::Unauthenticated));
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_unauthenticated() {
        let state = AppState::fake();
        let (mut parts, _) = axum::http::Request::builder()
            .uri("/")
            .header(axum::http::header::AUTHORIZATION, "Basic abc")
            .body(())
            .expect("request")
            .into_parts();
        let err = AccessToken::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiError::Unauthenticated));
    }

    #[tokio::test]
    async fn garbage_token_is_invalid() {
        let state = AppState::fake();
        let mut parts = parts_with_bearer(Some("not-a-jwt"));
        let err = AccessToken::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiError::InvalidToken));
    }

    #[tokio::test]
    async fn valid_access_token_is_accepted() {
        let state = AppState::fake();
        let codec = TokenCodec::from_ref(&state);
        let user = test_user();
        let token = codec.sign_access(&user).expect("sign");
        let mut parts = parts_with_bearer(Some(&token));
        let AccessToken(claims) = AccessToken::from_request_parts(&mut parts, &state)
            .await
            .expect("should accept");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, "user");
    }

    #[tokio::test]
    async fn access_guard_rejects_refresh_token() {
        let state = AppState::fake();
        let codec = TokenCodec::from_ref(&state);
        let token = codec.sign_refresh(&test_user()).expect("sign");
        let mut parts = parts_with_bearer(Some(&token));
        let err = AccessToken::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiError::AccessTokenRequired));
    }

    #[tokio::test]
    async fn refresh_guard_rejects_access_token() {
        let state = AppState::fake();
        let codec = TokenCodec::from_ref(&state);
        let token = codec.sign_access(&test_user()).expect("sign");
        let mut parts = parts_with_bearer(Some(&token));
        let err = RefreshToken::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiError::RefreshTokenRequired));
    }

    #[tokio::test]
    async fn revoked_token_is_rejected_before_its_expiry() {
        let state = AppState::fake();
        let codec = TokenCodec::from_ref(&state);
        let token = codec.sign_access(&test_user()).expect("sign");
        let claims = codec.verify_session(&token).expect("verify");

        state
            .revocations
            .revoke(claims.jti, Duration::from_secs(300))
            .await
            .expect("revoke");

        let mut parts = parts_with_bearer(Some(&token));
        let err = AccessToken::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiError::RevokedToken));

        // The same jti stays rejected on the refresh path too.
        let mut parts = parts_with_bearer(Some(&token));
        let err = RefreshToken::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiError::RevokedToken));
    }

    #[tokio::test]
    async fn logout_near_expiry_still_blocks_the_token() {
        use std::sync::Arc;

        // Token already past exp but inside the decode leeway: it still
        // verifies, so revoking with its remaining TTL must keep blocking it.
        let mut state = AppState::fake();
        let mut config = (*state.config).clone();
        config.jwt.access_ttl_secs = -30;
        state.config = Arc::new(config);

        let codec = TokenCodec::from_ref(&state);
        let token = codec.sign_access(&test_user()).expect("sign");
        let claims = codec.verify_session(&token).expect("still within leeway");

        // The logout flow.
        state
            .revocations
            .revoke(claims.jti, claims.remaining_ttl())
            .await
            .expect("revoke");

        let mut parts = parts_with_bearer(Some(&token));
        let err = AccessToken::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("should reject");
        assert!(matches!(err, ApiError::RevokedToken));
    }
}
