//! Provider factory: builds the model endpoint selected by configuration.
//!
//! Providers are built on demand, one per query service, so no HTTP client
//! is shared across the process.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use unitypilot_config::{AppConfig, ModelVendor};
use unitypilot_core::error::ProviderError;
use unitypilot_core::provider::Provider;

use crate::anthropic::AnthropicProvider;
use crate::credentials::HeadersServiceProvider;
use crate::openai_compat::{self, OpenAiCompatProvider};

/// Build the provider for `config.model.vendor`.
pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let model = &config.model;
    let timeout = Duration::from_secs(model.request_timeout_secs);

    let provider: Arc<dyn Provider> = match model.vendor {
        ModelVendor::Anthropic => {
            let api_key = model
                .api_key
                .clone()
                .ok_or_else(|| ProviderError::NotConfigured("ANTHROPIC_API_KEY is not set".into()))?;

            let mut provider = AnthropicProvider::new(api_key, timeout)?.with_temperature(model.temperature);
            if let Some(name) = &model.model {
                provider = provider.with_model(name);
            }
            if let Some(url) = &model.api_url {
                provider = provider.with_base_url(url);
            }
            if model.extended_thinking {
                provider = provider.with_extended_thinking(model.thinking_budget_tokens);
            }
            Arc::new(provider)
        }
        ModelVendor::OpenAi => {
            let base_url = model.api_url.as_deref().unwrap_or(openai_compat::OPENAI_BASE_URL);
            if model.api_key.is_none() && model.api_url.is_none() {
                return Err(ProviderError::NotConfigured("OPENAI_API_KEY is not set".into()));
            }

            let name = model.model.as_deref().unwrap_or(openai_compat::DEFAULT_MODEL);
            let provider = OpenAiCompatProvider::new("openai", base_url, name, timeout)?
                .with_api_key(model.api_key.clone().unwrap_or_default())
                .with_temperature(model.temperature);
            Arc::new(provider)
        }
        ModelVendor::ZeroG => {
            let zerog = &config.zerog;
            let required = |value: &Option<String>, var: &str| {
                value
                    .clone()
                    .ok_or_else(|| ProviderError::NotConfigured(format!("{var} is not set")))
            };
            let endpoint = required(&zerog.model_endpoint, "ZG_MODEL_ENDPOINT")?;
            let name = required(&zerog.model_name, "ZG_MODEL_NAME")?;
            let service_url = required(&zerog.service_api_url, "ZG_SERVICE_API_URL")?;
            let provider_address = required(&zerog.provider_address, "ZG_PROVIDER_ADDRESS")?;

            let credentials = HeadersServiceProvider::new(&service_url, provider_address, timeout)?;
            let provider = OpenAiCompatProvider::new("zerog", endpoint, name, timeout)?
                .with_temperature(model.temperature)
                .with_credentials(Arc::new(credentials));
            Arc::new(provider)
        }
    };

    info!(provider = provider.name(), "Model endpoint configured");
    Ok(provider)
}
