//! Error types for the UnityPilot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum. [`ToolError`] never reaches
//! [`Error`]: it is absorbed into conversation data, while the rest
//! terminate a run.

use thiserror::Error;

/// The top-level error type for all UnityPilot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Tool session startup ---
    #[error("Could not initialize tool session: {0}")]
    Initialization(#[from] SessionError),

    // --- Model endpoint errors ---
    #[error("Model endpoint error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Tool session is not initialized")]
    NotInitialized,

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Could not obtain request credentials: {0}")]
    Credentials(#[from] CredentialError),
}

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Failed to start tool server `{command}`: {reason}")]
    Spawn { command: String, reason: String },

    #[error("Tool server handshake failed: {0}")]
    Handshake(String),

    #[error("Tool listing failed: {0}")]
    ListTools(String),

    #[error("Tool session timed out after {0}s")]
    Timeout(u64),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    #[error("Headers service request failed: {0}")]
    Request(String),

    #[error("Headers service rejected the request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Headers service returned a malformed response: {0}")]
    InvalidResponse(String),

    #[error("Headers service returned no headers")]
    Empty,

    #[error("Invalid header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 529,
            message: "Overloaded".into(),
        });
        assert!(err.to_string().contains("529"));
        assert!(err.to_string().contains("Overloaded"));
    }

    #[test]
    fn credential_error_wraps_into_provider_error() {
        let err: ProviderError = CredentialError::Rejected {
            status: 403,
            message: "unknown provider".into(),
        }
        .into();
        assert!(matches!(err, ProviderError::Credentials(_)));
        assert!(err.to_string().contains("403"));
    }

    #[test]
    fn session_error_becomes_initialization_error() {
        let err: Error = SessionError::Spawn {
            command: "uv".into(),
            reason: "No such file or directory".into(),
        }
        .into();
        assert!(matches!(err, Error::Initialization(_)));
        assert!(err.to_string().contains("uv"));
    }
}
