use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Blocklist of revoked token ids. Backed by an external key/expiry cache in
/// production; the in-memory implementation below covers single-instance
/// deployments and tests.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    async fn is_revoked(&self, jti: Uuid) -> anyhow::Result<bool>;

    /// Mark `jti` revoked for `ttl` (the remaining lifetime of its token).
    /// Idempotent.
    async fn revoke(&self, jti: Uuid, ttl: Duration) -> anyhow::Result<()>;
}

/// jti -> expiry instant. Entries past expiry read as not revoked and are
/// purged on the next write.
pub struct MemoryRevocationStore {
    entries: RwLock<HashMap<Uuid, OffsetDateTime>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryRevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn is_revoked(&self, jti: Uuid) -> anyhow::Result<bool> {
        let entries = self.entries.read().await;
        Ok(matches!(entries.get(&jti), Some(exp) if *exp > OffsetDateTime::now_utc()))
    }

    async fn revoke(&self, jti: Uuid, ttl: Duration) -> anyhow::Result<()> {
        let now = OffsetDateTime::now_utc();
        let mut entries = self.entries.write().await;
        entries.retain(|_, exp| *exp > now);
        entries.insert(jti, now + ttl);
        debug!(%jti, ttl_secs = ttl.as_secs(), "jti revoked");
        Ok(())
    }
}
