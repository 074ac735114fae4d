use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
    pub action_ttl_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    /// Host used when building verification / reset links in outbound mail.
    pub domain: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "bookly".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "bookly-users".into()),
            access_ttl_secs: std::env::var("JWT_ACCESS_TTL_SECS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(360),
            refresh_ttl_secs: std::env::var("JWT_REFRESH_TTL_SECS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 60 * 24 * 2),
            action_ttl_secs: std::env::var("JWT_ACTION_TTL_SECS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 60),
        };
        let domain = std::env::var("APP_DOMAIN").unwrap_or_else(|_| "localhost:8080".into());
        Ok(Self {
            database_url,
            jwt,
            domain,
        })
    }
}
