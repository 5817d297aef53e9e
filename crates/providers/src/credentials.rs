//! Headers-service credential provider.
//!
//! The 0G compute network authorizes each inference request with headers
//! signed for the exact prompt content. A local service issues them:
//!
//! ```text
//! POST <service_api_url>/request-headers
//! {"providerAddress": "0x…", "content": "<prompt>"}
//! → {"headers": {"Authorization": "…", "X-Phala-Signature-Type": "…"}}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use unitypilot_core::credentials::{CredentialProvider, Headers};
use unitypilot_core::error::CredentialError;

/// Resolves request headers from a headers-issuing HTTP service.
pub struct HeadersServiceProvider {
    endpoint: String,
    provider_address: String,
    client: reqwest::Client,
}

impl HeadersServiceProvider {
    pub fn new(
        service_api_url: &str,
        provider_address: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CredentialError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CredentialError::Request(e.to_string()))?;

        Ok(Self {
            endpoint: format!("{}/request-headers", service_api_url.trim_end_matches('/')),
            provider_address: provider_address.into(),
            client,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HeadersRequest<'a> {
    provider_address: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct HeadersResponse {
    headers: serde_json::Map<String, serde_json::Value>,
}

#[async_trait]
impl CredentialProvider for HeadersServiceProvider {
    async fn resolve(&self, prompt: &str) -> Result<Headers, CredentialError> {
        debug!(endpoint = %self.endpoint, "Requesting per-request headers");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&HeadersRequest {
                provider_address: &self.provider_address,
                content: prompt,
            })
            .send()
            .await
            .map_err(|e| CredentialError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %message, "Headers service rejected request");
            return Err(CredentialError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: HeadersResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::InvalidResponse(e.to_string()))?;

        let headers = body
            .headers
            .into_iter()
            .map(|(name, value)| match value {
                serde_json::Value::String(v) => Ok((name, v)),
                other => Err(CredentialError::InvalidHeader {
                    name,
                    reason: format!("expected a string value, got {other}"),
                }),
            })
            .collect::<Result<Headers, _>>()?;

        if headers.is_empty() {
            return Err(CredentialError::Empty);
        }
        to_header_map(&headers)?;
        Ok(headers)
    }
}

/// Validate header pairs and build a reqwest header map.
pub fn to_header_map(headers: &Headers) -> Result<HeaderMap, CredentialError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| CredentialError::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| CredentialError::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};

    /// Serve `router` on an ephemeral port and return its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn provider(base: &str) -> HeadersServiceProvider {
        HeadersServiceProvider::new(base, "0xprovider", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn resolves_headers_for_prompt() {
        let router = Router::new().route(
            "/request-headers",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["providerAddress"], "0xprovider");
                let signature = format!("sig:{}", body["content"].as_str().unwrap_or_default());
                Json(serde_json::json!({
                    "headers": { "Authorization": "Bearer abc", "X-Signature": signature }
                }))
            }),
        );
        let base = serve(router).await;

        let headers = provider(&format!("{base}/")).resolve("Turn the player object red").await.unwrap();
        assert!(headers.contains(&("Authorization".to_string(), "Bearer abc".to_string())));
        assert!(headers.contains(&("X-Signature".to_string(), "sig:Turn the player object red".to_string())));
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        let router = Router::new().route(
            "/request-headers",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "ledger unavailable") }),
        );
        let base = serve(router).await;

        let err = provider(&base).resolve("hi").await.unwrap_err();
        match err {
            CredentialError::Rejected { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "ledger unavailable");
            }
            other => panic!("Expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_and_empty_bodies_are_errors() {
        let router = Router::new()
            .route("/bad/request-headers", post(|| async { Json(serde_json::json!({"nope": 1})) }))
            .route("/empty/request-headers", post(|| async { Json(serde_json::json!({"headers": {}})) }))
            .route(
                "/numeric/request-headers",
                post(|| async { Json(serde_json::json!({"headers": {"X-Count": 3}})) }),
            )
            .route(
                "/invalid/request-headers",
                post(|| async { Json(serde_json::json!({"headers": {"Bad Header": "x"}})) }),
            );
        let base = serve(router).await;

        assert!(matches!(
            provider(&format!("{base}/bad")).resolve("hi").await,
            Err(CredentialError::InvalidResponse(_))
        ));
        assert!(matches!(
            provider(&format!("{base}/empty")).resolve("hi").await,
            Err(CredentialError::Empty)
        ));
        assert!(matches!(
            provider(&format!("{base}/numeric")).resolve("hi").await,
            Err(CredentialError::InvalidHeader { .. })
        ));
        assert!(matches!(
            provider(&format!("{base}/invalid")).resolve("hi").await,
            Err(CredentialError::InvalidHeader { .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_service_is_request_error() {
        let err = provider("http://127.0.0.1:9").resolve("hi").await.unwrap_err();
        assert!(matches!(err, CredentialError::Request(_)));
    }

    #[test]
    fn header_map_rejects_invalid_values() {
        let ok = to_header_map(&vec![("X-Token".into(), "abc".into())]).unwrap();
        assert_eq!(ok["x-token"], "abc");
        assert!(to_header_map(&vec![("X-Token".into(), "line\nbreak".into())]).is_err());
    }
}
