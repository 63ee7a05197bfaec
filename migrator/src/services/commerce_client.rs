//! Authenticated HTTP client for one store's Admin API
//!
//! Every exchange goes through the same path: wait if the last response
//! left the store throttled, send, turn the call-limit header into a fresh
//! [`RateState`], then either decode the body or map the status onto
//! [`MigrationError::Api`]. Successful responses are followed by a short
//! fixed pause.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, warn};

use shared::StoreCredential;

use crate::core::rate_governor::{CALL_LIMIT_HEADER, RateGovernor, RateState};
use crate::error::{MigrationError, MigrationResult};
use crate::traits::{Sleeper, StoreApi};
use crate::types::ApiResponse;

/// Header carrying the store access token
pub const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Real store client backed by `reqwest`
pub struct CommerceClient {
    credential: StoreCredential,
    http: Client,
    governor: RateGovernor,
    rate_state: RateState,
    sleeper: Arc<dyn Sleeper>,
    label: String,
}

impl CommerceClient {
    pub fn new(credential: StoreCredential, governor: RateGovernor, sleeper: Arc<dyn Sleeper>) -> MigrationResult<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MigrationError::transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            label: credential.endpoint().to_string(),
            credential,
            http,
            governor,
            rate_state: RateState::default(),
            sleeper,
        })
    }

    /// Name used in log lines instead of the endpoint
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn credential(&self) -> &StoreCredential {
        &self.credential
    }

    async fn send(&mut self, method: Method, path: &str, body: Option<&Value>) -> MigrationResult<ApiResponse> {
        if let Some(delay) = self.governor.pre_request_delay(&self.rate_state) {
            debug!("🐢 {} is throttled, waiting {}ms", self.label, delay.as_millis());
            self.sleeper.sleep(delay).await;
        }

        let url = self.credential.url_for(path);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(ACCESS_TOKEN_HEADER, self.credential.access_token())
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MigrationError::transport(format!("{method} {path}: {e}")))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        self.rate_state = self
            .governor
            .observe(headers.get(CALL_LIMIT_HEADER).and_then(|value| value.to_str().ok()));

        let success = (200..300).contains(&status);
        let text = match response.text().await {
            Ok(text) => text,
            // The store already acted on a 2xx; the status decides the outcome
            Err(e) if success => {
                warn!("⚠️ {} {} {} -> {} but the body was unreadable: {}", self.label, method, path, status, e);
                String::new()
            }
            Err(e) => return Err(MigrationError::transport(format!("{method} {path}: reading body: {e}"))),
        };

        debug!(
            "🌐 {} {} {} -> {} (usage {:?})",
            self.label,
            method,
            path,
            status,
            self.rate_state.usage.map(|u| format!("{}/{}", u.current, u.total))
        );

        if !success {
            let retry_after = retry_after_from(&headers);
            if status == 429 {
                warn!("🚦 {} rate limited {} {}", self.label, method, path);
            }
            return Err(MigrationError::Api {
                status,
                body: error_body(&text),
                retry_after,
            });
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str::<Value>(&text).unwrap_or_else(|e| {
                warn!("⚠️ {} {} {} -> {} returned a non-JSON body: {}", self.label, method, path, status, e);
                Value::String(text)
            })
        };

        self.sleeper.sleep(self.governor.post_response_delay()).await;
        Ok(ApiResponse::new(status, headers, body))
    }
}

/// `Retry-After` in seconds; fractional values are accepted
pub fn retry_after_from(headers: &HeaderMap) -> Option<Duration> {
    let seconds: f64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then(|| Duration::from_secs_f64(seconds))
}

/// The `errors` member of a rejection body, or the raw body
fn error_body(text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(mut body) => match body.get_mut("errors").map(Value::take) {
            Some(errors) => errors,
            None => body,
        },
        Err(_) if text.trim().is_empty() => Value::Null,
        Err(_) => Value::String(text.to_string()),
    }
}

#[async_trait]
impl StoreApi for CommerceClient {
    async fn get(&mut self, path: &str) -> MigrationResult<ApiResponse> {
        self.send(Method::GET, path, None).await
    }

    async fn post(&mut self, path: &str, body: &Value) -> MigrationResult<ApiResponse> {
        self.send(Method::POST, path, Some(body)).await
    }

    async fn put(&mut self, path: &str, body: &Value) -> MigrationResult<ApiResponse> {
        self.send(Method::PUT, path, Some(body)).await
    }

    async fn delete(&mut self, path: &str) -> MigrationResult<ApiResponse> {
        self.send(Method::DELETE, path, None).await
    }

    fn rate_state(&self) -> RateState {
        self.rate_state
    }

    fn store_label(&self) -> String {
        self.label.clone()
    }
}
