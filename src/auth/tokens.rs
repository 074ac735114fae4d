use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::repo::User;
use crate::config::JwtConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// Key context appended to the server secret for action tokens, so a session
/// token can never be replayed as an action token or vice versa.
const ACTION_KEY_CONTEXT: &str = "/action-token";

/// Clock-skew leeway applied when decoding. A token verifies until
/// `exp + DECODE_LEEWAY_SECS`, so revocation TTLs must cover this window too.
pub const DECODE_LEEWAY_SECS: u64 = 60;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Session JWT payload. `email` and `role` are a snapshot taken at issuance;
/// authorization re-checks the live user row.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    pub jti: Uuid,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

impl SessionClaims {
    /// Time left until the token stops being accepted: `exp` plus the decode
    /// leeway, zero if already past. Revoking for this long guarantees the
    /// blocklist entry outlives the token.
    pub fn remaining_ttl(&self) -> Duration {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let remaining = self.exp as i64 + DECODE_LEEWAY_SECS as i64 - now;
        Duration::from_secs(remaining.max(0) as u64)
    }

    pub fn is_expired(&self) -> bool {
        (self.exp as i64) < OffsetDateTime::now_utc().unix_timestamp()
    }
}

/// Single-purpose token payload for email verification and password reset.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ActionClaims {
    pub email: String,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
}

/// Signs and verifies session and action tokens. Session and action keys are
/// derived from the same server secret but distinct contexts.
#[derive(Clone)]
pub struct TokenCodec {
    session_encoding: EncodingKey,
    session_decoding: DecodingKey,
    action_encoding: EncodingKey,
    action_decoding: DecodingKey,
    issuer: String,
    audience: String,
    pub access_ttl: TimeDuration,
    pub refresh_ttl: TimeDuration,
    pub action_ttl: TimeDuration,
}

impl FromRef<AppState> for TokenCodec {
    fn from_ref(state: &AppState) -> Self {
        Self::new(&state.config.jwt)
    }
}

impl TokenCodec {
    pub fn new(cfg: &JwtConfig) -> Self {
        let action_secret = format!("{}{}", cfg.secret, ACTION_KEY_CONTEXT);
        Self {
            session_encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            session_decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            action_encoding: EncodingKey::from_secret(action_secret.as_bytes()),
            action_decoding: DecodingKey::from_secret(action_secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: TimeDuration::seconds(cfg.access_ttl_secs),
            refresh_ttl: TimeDuration::seconds(cfg.refresh_ttl_secs),
            action_ttl: TimeDuration::seconds(cfg.action_ttl_secs),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.leeway = DECODE_LEEWAY_SECS;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation
    }

    pub fn sign_session(&self, user: &User, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now + ttl;
        let claims = SessionClaims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role.clone(),
            jti: Uuid::new_v4(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.session_encoding)?;
        debug!(user_id = %user.id, kind = ?kind, jti = %claims.jti, "session token signed");
        Ok(token)
    }

    pub fn sign_access(&self, user: &User) -> anyhow::Result<String> {
        self.sign_session(user, TokenKind::Access)
    }

    pub fn sign_refresh(&self, user: &User) -> anyhow::Result<String> {
        self.sign_session(user, TokenKind::Refresh)
    }

    /// Signature, expiry, issuer and audience checks; any failure collapses
    /// to `InvalidToken` with no partial claims.
    pub fn verify_session(&self, token: &str) -> Result<SessionClaims, ApiError> {
        let data = decode::<SessionClaims>(token, &self.session_decoding, &self.validation())
            .map_err(|_| ApiError::InvalidToken)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "session token verified");
        Ok(data.claims)
    }

    pub fn issue_action(&self, email: &str) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + self.action_ttl;
        let claims = ActionClaims {
            email: email.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.action_encoding)?;
        debug!(%email, "action token issued");
        Ok(token)
    }

    pub fn verify_action(&self, token: &str) -> Result<ActionClaims, ApiError> {
        let data = decode::<ActionClaims>(token, &self.action_decoding, &self.validation())
            .map_err(|_| ApiError::InvalidToken)?;
        if data.claims.email.is_empty() {
            return Err(ApiError::InvalidToken);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "dev-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            access_ttl_secs: 360,
            refresh_ttl_secs: 60 * 60 * 24 * 2,
            action_ttl_secs: 3600,
        }
    }

    fn test_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "jane".into(),
            email: "jane@example.com".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            role: "user".into(),
            is_verified: false,
            password_hash: "unused".into(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn session_roundtrip_preserves_subject_claims() {
        let codec = TokenCodec::new(&test_config());
        let user = test_user();
        let token = codec.sign_access(&user).expect("sign access");
        let claims = codec.verify_session(&token).expect("verify");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.role, user.role);
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
    }

    #[test]
    fn each_token_gets_a_fresh_jti() {
        let codec = TokenCodec::new(&test_config());
        let user = test_user();
        let a = codec.verify_session(&codec.sign_access(&user).unwrap()).unwrap();
        let b = codec.verify_session(&codec.sign_access(&user).unwrap()).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn refresh_token_carries_refresh_kind() {
        let codec = TokenCodec::new(&test_config());
        let token = codec.sign_refresh(&test_user()).expect("sign refresh");
        let claims = codec.verify_session(&token).expect("verify");
        assert_eq!(claims.kind, TokenKind::Refresh);
    }

    #[test]
    fn expired_session_token_is_rejected() {
        // Past the default 60s decode leeway.
        let cfg = JwtConfig {
            access_ttl_secs: -120,
            ..test_config()
        };
        let codec = TokenCodec::new(&cfg);
        let token = codec.sign_access(&test_user()).expect("sign access");
        assert!(matches!(
            codec.verify_session(&token),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let codec = TokenCodec::new(&test_config());
        let mut token = codec.sign_access(&test_user()).expect("sign access");
        token.push('x');
        assert!(codec.verify_session(&token).is_err());
        assert!(codec.verify_session("garbage").is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let codec = TokenCodec::new(&test_config());
        let other = TokenCodec::new(&JwtConfig {
            secret: "other-secret".into(),
            ..test_config()
        });
        let token = codec.sign_access(&test_user()).expect("sign access");
        assert!(other.verify_session(&token).is_err());
    }

    #[test]
    fn action_roundtrip_preserves_email() {
        let codec = TokenCodec::new(&test_config());
        let token = codec.issue_action("jane@example.com").expect("issue");
        let claims = codec.verify_action(&token).expect("verify");
        assert_eq!(claims.email, "jane@example.com");
    }

    #[test]
    fn session_and_action_contexts_are_not_interchangeable() {
        let codec = TokenCodec::new(&test_config());
        let session = codec.sign_access(&test_user()).expect("sign access");
        let action = codec.issue_action("jane@example.com").expect("issue action");
        assert!(codec.verify_action(&session).is_err());
        assert!(codec.verify_session(&action).is_err());
    }

    #[test]
    fn expired_action_token_is_rejected() {
        let cfg = JwtConfig {
            action_ttl_secs: -120,
            ..test_config()
        };
        let codec = TokenCodec::new(&cfg);
        let token = codec.issue_action("jane@example.com").expect("issue");
        assert!(codec.verify_action(&token).is_err());
    }

    #[test]
    fn remaining_ttl_counts_down_from_issuance() {
        let codec = TokenCodec::new(&test_config());
        let token = codec.sign_access(&test_user()).expect("sign access");
        let claims = codec.verify_session(&token).expect("verify");
        let ttl = claims.remaining_ttl();
        assert!(ttl <= Duration::from_secs(360 + DECODE_LEEWAY_SECS));
        assert!(ttl > Duration::from_secs(300));
        assert!(!claims.is_expired());
    }

    #[test]
    fn remaining_ttl_covers_the_decode_leeway_window() {
        // Past exp but still inside the leeway: the token verifies, so the
        // revocation TTL derived from it must stay positive.
        let cfg = JwtConfig {
            access_ttl_secs: -30,
            ..test_config()
        };
        let codec = TokenCodec::new(&cfg);
        let token = codec.sign_access(&test_user()).expect("sign access");
        let claims = codec.verify_session(&token).expect("still within leeway");
        assert!(claims.is_expired());
        assert!(claims.remaining_ttl() > Duration::from_secs(0));
    }
}
