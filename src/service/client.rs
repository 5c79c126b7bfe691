use async_trait::async_trait;
use serde_json::json;

use crate::config::{ServiceEndpoint, Settings, VirtualResolution};
use crate::errors::{ScreenPilotError, ScreenPilotResult};
use crate::service::types::{Item, Response, Usage};

/// API version pinned for Azure deployments of the planning service.
const AZURE_API_VERSION: &str = "2025-03-01-preview";
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Request/response boundary to the planning service: one call per reasoning
/// step. Implementations must not retry on their own; the agent surfaces
/// service failures to the caller instead.
#[async_trait]
pub trait PlannerClient: Send + Sync {
    async fn create_response(&self, input: &[Item]) -> ScreenPilotResult<Response>;
}

#[async_trait]
impl<T: PlannerClient + ?Sized> PlannerClient for std::sync::Arc<T> {
    async fn create_response(&self, input: &[Item]) -> ScreenPilotResult<Response> {
        (**self).create_response(input).await
    }
}

enum Auth {
    /// Azure-style `api-key` header.
    ApiKey(String),
    Bearer(String),
}

pub struct HttpPlannerClient {
    client: reqwest::Client,
    url: String,
    auth: Auth,
    model: String,
    environment: String,
    display: VirtualResolution,
}

impl HttpPlannerClient {
    pub fn new(settings: &Settings) -> Self {
        let (url, auth) = match &settings.endpoint {
            ServiceEndpoint::Azure { endpoint, api_key } => (
                format!(
                    "{}/openai/responses?api-version={AZURE_API_VERSION}",
                    endpoint.trim_end_matches('/')
                ),
                Auth::ApiKey(api_key.clone()),
            ),
            ServiceEndpoint::OpenAi { api_key } => (
                format!("{OPENAI_API_BASE}/responses"),
                Auth::Bearer(api_key.clone()),
            ),
        };
        Self {
            client: reqwest::Client::new(),
            url,
            auth,
            model: settings.model.clone(),
            environment: settings.environment.clone(),
            display: settings.resolution,
        }
    }
}

#[async_trait]
impl PlannerClient for HttpPlannerClient {
    async fn create_response(&self, input: &[Item]) -> ScreenPilotResult<Response> {
        let body = json!({
            "model": self.model,
            "input": input,
            "tools": [{
                "type": "computer_use_preview",
                "display_width": self.display.width,
                "display_height": self.display.height,
                "environment": self.environment,
            }],
            "reasoning": {"generate_summary": "concise"},
            "truncation": "auto",
        });

        tracing::debug!(model = %self.model, items = input.len(), "sending planner request");
        tracing::trace!(
            body = %redacted_body(&body),
            "planner request body (screenshots redacted)"
        );

        let request = self.client.post(&self.url).json(&body);
        let request = match &self.auth {
            Auth::ApiKey(key) => request.header("api-key", key.as_str()),
            Auth::Bearer(key) => request.bearer_auth(key),
        };

        let response = request
            .send()
            .await
            .map_err(|e| ScreenPilotError::Service(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let err_body = response.text().await.unwrap_or_default();
            return Err(ScreenPilotError::Service(format!("{status}: {err_body}")));
        }

        // Transport and JSON-syntax problems are service errors; a body that
        // parses but does not fit the vocabulary is a protocol error.
        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ScreenPilotError::Service(e.to_string()))?;
        let decoded: Response = serde_json::from_value(raw)
            .map_err(|e| ScreenPilotError::Protocol(format!("unrecognized response shape: {e}")))?;

        tracing::debug!(
            output_items = decoded.output.len(),
            tokens = decoded.usage.as_ref().and_then(Usage::total),
            "planner response received"
        );
        Ok(decoded)
    }
}

/// Clone of the request body with data-URI screenshots replaced, so trace
/// logs stay readable while the real request keeps its payloads.
fn redacted_body(body: &serde_json::Value) -> String {
    let mut log_body = body.clone();
    if let Some(items) = log_body.get_mut("input").and_then(|v| v.as_array_mut()) {
        for item in items {
            if item.get("type").and_then(|t| t.as_str()) == Some("computer_call_output") {
                if let Some(url) = item
                    .get_mut("output")
                    .and_then(|o| o.get_mut("image_url"))
                {
                    *url = serde_json::Value::String("<omitted_base64_image>".into());
                }
            }
        }
    }
    serde_json::to_string(&log_body).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::types::{CallOutput, Item};

    #[test]
    fn redaction_strips_screenshots_but_keeps_structure() {
        let input = vec![
            Item::user_message("hello"),
            Item::ComputerCallOutput {
                call_id: "call_1".into(),
                acknowledged_safety_checks: Vec::new(),
                output: CallOutput::ComputerScreenshot {
                    image_url: format!("data:image/png;base64,{}", "A".repeat(4096)),
                },
            },
        ];
        let body = json!({"model": "m", "input": input});
        let redacted = redacted_body(&body);
        assert!(redacted.contains("<omitted_base64_image>"));
        assert!(redacted.contains("hello"));
        assert!(!redacted.contains("AAAA"));
    }
}
