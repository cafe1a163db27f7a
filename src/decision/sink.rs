//! Notification delivery seams.

use async_trait::async_trait;

use crate::pipeline::context::EvaluationContext;

use super::payload::{Attachment, NotificationPayload};

/// Delivers a payload to a chat channel. Called at most once per evaluation;
/// failures are logged by the caller and never retried.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, channel: &str, payload: &NotificationPayload) -> anyhow::Result<()>;
}

/// Renders an optional attachment (e.g. a dashboard screenshot) for a
/// payload that is about to be sent. A failure drops the attachment only.
#[async_trait]
pub trait AttachmentRenderer: Send + Sync {
    async fn render(&self, ctx: &EvaluationContext, payload: &NotificationPayload) -> anyhow::Result<Option<Attachment>>;
}
