//! # UnityPilot Core
//!
//! Domain types, traits, and error definitions for the UnityPilot agent.
//! This crate has **no framework dependencies**: it defines the conversation
//! model and the seams (model endpoint, tool session, credentials) that the
//! other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here. Implementations live in their
//! respective crates, which keeps the orchestration loop testable with
//! scripted providers and in-memory tool sessions.

pub mod credentials;
pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use credentials::{CredentialProvider, Headers};
pub use error::{CredentialError, Error, ProviderError, Result, SessionError, ToolError};
pub use message::{ContentBlock, Conversation, Message, SessionId, ToolResult, ToolUse};
pub use provider::{CompletionRequest, CompletionResponse, Provider, ToolDefinition, Usage};
pub use tool::{SessionConnector, ToolCatalog, ToolContent, ToolDescriptor, ToolOutput, ToolSession};
