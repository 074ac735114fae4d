use crate::auth::repo::User;
use crate::auth::tokens::SessionClaims;
use crate::error::ApiError;
use crate::state::AppState;
use tracing::warn;

/// Allow-set applied when a route does not name one.
pub const DEFAULT_ALLOWED_ROLES: &[&str] = &["admin"];

/// Flat membership test, no role hierarchy.
pub fn role_allowed(role: &str, allowed: &[&str]) -> bool {
    allowed.contains(&role)
}

/// Authorize the verified session against an allow-set of roles.
///
/// The role claim inside the token is a snapshot from issuance; the current
/// user row governs, so a demotion takes effect before the token expires.
/// Returns the live user on success.
pub async fn require_role(
    state: &AppState,
    claims: &SessionClaims,
    allowed: &[&str],
) -> Result<User, ApiError> {
    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    if !role_allowed(&user.role, allowed) {
        warn!(user_id = %user.id, role = %user.role, ?allowed, "role not allowed");
        return Err(ApiError::InsufficientPermission);
    }

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_is_flat() {
        assert!(role_allowed("admin", &["admin", "user"]));
        assert!(role_allowed("user", &["admin", "user"]));
        assert!(!role_allowed("user", &["admin"]));
        assert!(!role_allowed("moderator", &["admin", "user"]));
    }

    #[test]
    fn default_allow_set_is_admin_only() {
        assert!(role_allowed("admin", DEFAULT_ALLOWED_ROLES));
        assert!(!role_allowed("user", DEFAULT_ALLOWED_ROLES));
    }
}
