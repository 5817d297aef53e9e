//! Model endpoint implementations for UnityPilot.
//!
//! All providers implement the `unitypilot_core::Provider` trait.
//! The factory builds the one selected by configuration.

pub mod anthropic;
pub mod credentials;
pub mod factory;
mod http;
pub mod openai_compat;

pub use anthropic::AnthropicProvider;
pub use credentials::HeadersServiceProvider;
pub use factory::build_provider;
pub use openai_compat::OpenAiCompatProvider;
