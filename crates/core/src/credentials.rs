//! Per-request credential injection.
//!
//! Some model endpoints authorize each call with headers issued by a
//! separate service for the exact prompt being sent. Providers configured
//! with a [`CredentialProvider`] resolve headers once per model call and
//! fail the call if resolution fails.

use async_trait::async_trait;

use crate::error::CredentialError;

/// Header name/value pairs.
pub type Headers = Vec<(String, String)>;

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Resolve the authorization headers for an outgoing prompt.
    async fn resolve(&self, prompt: &str) -> Result<Headers, CredentialError>;
}
