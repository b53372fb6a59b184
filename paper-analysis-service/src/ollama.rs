use async_trait::async_trait;
use paper_flow::{GatewayError, ModelGateway};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::info;

/// [`ModelGateway`] backed by an Ollama server's `/api/generate` endpoint.
#[derive(Clone)]
pub struct OllamaGateway {
    client: Client,
    host: String,
    model: String,
}

impl OllamaGateway {
    pub fn new(host: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            host: host.into(),
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.host.trim_end_matches('/'))
    }
}

#[async_trait]
impl ModelGateway for OllamaGateway {
    async fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, GatewayError> {
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false
        });

        let response = self
            .client
            .post(self.endpoint())
            .timeout(timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        if !response.status().is_success() {
            return Err(GatewayError::Protocol(format!(
                "LLM API request failed: {}",
                response.status()
            )));
        }

        let response_json: Value = response.json().await.map_err(|e| classify(e, timeout))?;
        let text = response_text(&response_json)?;

        info!(
            "Model {} produced {} characters",
            self.model,
            text.len()
        );
        Ok(text)
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Timeout(timeout)
    } else if error.is_decode() {
        GatewayError::Protocol(error.to_string())
    } else {
        GatewayError::Transport(error.to_string())
    }
}

fn response_text(body: &Value) -> Result<String, GatewayError> {
    if let Some(message) = body["error"].as_str() {
        return Err(GatewayError::Protocol(message.to_string()));
    }
    body["response"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| GatewayError::Protocol("Invalid response format from LLM".to_string()))
}
