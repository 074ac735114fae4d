use async_trait::async_trait;
use tracing::info;

/// Outbound mail collaborator. `enqueue` returns as soon as the message is
/// handed off; delivery happens out of band and is best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn enqueue(&self, recipients: Vec<String>, subject: String, body: String)
        -> anyhow::Result<()>;
}

/// Default notifier: writes the message to the log instead of dispatching it.
/// Stands in for the real mail queue in development and tests.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn enqueue(
        &self,
        recipients: Vec<String>,
        subject: String,
        body: String,
    ) -> anyhow::Result<()> {
        info!(recipients = ?recipients, %subject, body_len = body.len(), "email enqueued");
        Ok(())
    }
}
