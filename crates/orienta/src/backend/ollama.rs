//! Local generation backend via an Ollama server
//!
//! Calls the `/api/chat` endpoint with temperature 0 so replies stay
//! deterministic given the same context and history.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{GenerationBackend, WireMessage, build_messages};
use crate::config::OllamaConfig;
use crate::error::{OrientaError, Result};
use crate::session::Turn;

/// Generation backend backed by a local Ollama server
#[derive(Debug)]
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OllamaBackend {
    pub fn new(config: &OllamaConfig, timeout: Duration) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| OrientaError::Config(format!("Invalid ollama base_url: {e}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OrientaError::Config(format!("Failed to create HTTP client: {e}")))?;

        tracing::info!(
            "OllamaBackend initialized with model: {}, base_url: {}",
            config.model,
            config.base_url
        );

        Ok(Self {
            client,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn generate(
        &self,
        system_instructions: &str,
        history: &[Turn],
        context: &str,
        user_text: &str,
    ) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: build_messages(system_instructions, history, context, user_text),
            stream: false,
            options: ChatOptions { temperature: 0.0 },
        };

        let url = format!("{}/api/chat", self.base_url);
        tracing::debug!("Calling Ollama at: {url}");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| OrientaError::Generation(format!("Ollama request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(OrientaError::Generation(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| OrientaError::Generation(format!("Bad Ollama payload: {e}")))?;

        Ok(parsed.message.content)
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}
