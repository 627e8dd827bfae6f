//! Webhook status lookup protocol.

use async_trait::async_trait;

use crate::classifier::ElementDescriptor;
use crate::element::WebhookStatus;

/// Resolves the webhook status of a classified element.
///
/// Implementations may fail or be slow; the scanner bounds every call with a
/// timeout and treats failures as [`WebhookStatus::None`].
#[async_trait]
pub trait WebhookStatusLookup: Send + Sync {
    async fn status(&self, element: &ElementDescriptor) -> Result<WebhookStatus, String>;
}

/// Lookup that reports no bindings.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLookup;

#[async_trait]
impl WebhookStatusLookup for NoopLookup {
    async fn status(&self, _element: &ElementDescriptor) -> Result<WebhookStatus, String> {
        Ok(WebhookStatus::None)
    }
}
