//! Remote generation backend via OpenAI-compatible APIs
//!
//! Works against any endpoint speaking the `/chat/completions` protocol.
//! The API key is read from an environment variable named in config; a
//! missing key is a startup failure, never a per-turn one. Rate-limit
//! responses get a short exponential backoff inside the client; that is the
//! only retry anywhere in the pipeline.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{GenerationBackend, WireMessage, build_messages};
use crate::config::OpenAiConfig;
use crate::error::{OrientaError, Result};
use crate::session::Turn;

/// Generation backend for remote OpenAI-compatible HTTP APIs
#[derive(Debug)]
pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OpenAiBackend {
    /// Create the backend, reading the API key from the environment.
    ///
    /// Fails when the endpoint is unset or the key variable is missing.
    pub fn new(config: &OpenAiConfig, timeout: Duration) -> Result<Self> {
        if config.api_url.is_empty() {
            return Err(OrientaError::Config(
                "backend.openai.api_url is not set".to_string(),
            ));
        }

        let api_key = env::var(&config.api_key_env).map_err(|_| {
            OrientaError::Config(format!("API key env var '{}' not set", config.api_key_env))
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OrientaError::Config(format!("Failed to create HTTP client: {e}")))?;

        tracing::info!(
            "OpenAiBackend initialized with model: {}, api_url: {}",
            config.model,
            config.api_url
        );

        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }

    async fn call_api(&self, request: &ChatCompletionRequest) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_url.trim_end_matches('/')
        );
        tracing::debug!("Calling remote API at: {url}");

        let mut last_error = None;
        let mut delay = Duration::from_secs(1);
        const MAX_RETRIES: u32 = 3;

        for attempt in 0..MAX_RETRIES {
            match self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(request)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();

                    if status == 429 {
                        tracing::warn!(
                            "Rate limited on attempt {}/{}, waiting {:?}",
                            attempt + 1,
                            MAX_RETRIES,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                        continue;
                    }

                    if !status.is_success() {
                        let body = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Unknown error".to_string());
                        return Err(OrientaError::Generation(format!(
                            "API returned {status}: {body}"
                        )));
                    }

                    let completion: ChatCompletionResponse = response
                        .json()
                        .await
                        .map_err(|e| OrientaError::Generation(format!("Bad API payload: {e}")))?;

                    return completion
                        .choices
                        .into_iter()
                        .next()
                        .map(|c| c.message.content)
                        .ok_or_else(|| OrientaError::Generation("Empty response".to_string()));
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                }
            }
        }

        Err(OrientaError::Generation(format!(
            "Failed after {} attempts: {}",
            MAX_RETRIES,
            last_error.unwrap_or_else(|| "rate limited".to_string())
        )))
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    async fn generate(
        &self,
        system_instructions: &str,
        history: &[Turn],
        context: &str,
        user_text: &str,
    ) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: build_messages(system_instructions, history, context, user_text),
            temperature: 0.0,
        };
        self.call_api(&request).await
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty() && !self.config.api_url.is_empty()
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // Each test owns a distinct env var so parallel tests cannot race
    fn create_test_config(api_url: String, key_env: &str) -> OpenAiConfig {
        OpenAiConfig {
            api_url,
            api_key_env: key_env.to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_fast() {
        unsafe { env::remove_var("ORIENTA_TEST_KEY_MISSING") };

        let config = create_test_config(
            "https://api.example.com/v1".to_string(),
            "ORIENTA_TEST_KEY_MISSING",
        );
        let result = OpenAiBackend::new(&config, Duration::from_secs(5));

        assert!(result.is_err());
        let err = result.err().unwrap().to_string();
        assert!(err.contains("ORIENTA_TEST_KEY_MISSING"));
    }

    #[tokio::test]
    async fn test_missing_api_url_fails_fast() {
        unsafe { env::set_var("ORIENTA_TEST_KEY_NO_URL", "test-key") };
        let config = create_test_config(String::new(), "ORIENTA_TEST_KEY_NO_URL");
        assert!(OpenAiBackend::new(&config, Duration::from_secs(5)).is_err());
    }

    #[tokio::test]
    async fn test_generate_returns_reply() {
        let mock_server = MockServer::start().await;

        let response_body = serde_json::json!({
            "choices": [{
                "message": {
                    "content": "La matrícula semestral es de 167.000 pesos."
                }
            }]
        });

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        unsafe { env::set_var("ORIENTA_TEST_KEY_GEN", "test-key") };
        let config = create_test_config(mock_server.uri(), "ORIENTA_TEST_KEY_GEN");
        let backend = OpenAiBackend::new(&config, Duration::from_secs(5)).unwrap();

        let reply = backend
            .generate("sys", &[], "ctx", "¿cuánto es la matrícula?")
            .await
            .unwrap();
        assert_eq!(reply, "La matrícula semestral es de 167.000 pesos.");
    }

    #[tokio::test]
    async fn test_rate_limit_retry() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        let success = serde_json::json!({
            "choices": [{"message": {"content": "ok"}}]
        });

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success))
            .mount(&mock_server)
            .await;

        unsafe { env::set_var("ORIENTA_TEST_KEY_RETRY", "test-key") };
        let config = create_test_config(mock_server.uri(), "ORIENTA_TEST_KEY_RETRY");
        let backend = OpenAiBackend::new(&config, Duration::from_secs(5)).unwrap();

        let start = std::time::Instant::now();
        let reply = backend.generate("sys", &[], "ctx", "hola?").await.unwrap();
        assert_eq!(reply, "ok");
        assert!(start.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test]
    async fn test_api_error_surfaces_as_generation_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&mock_server)
            .await;

        unsafe { env::set_var("ORIENTA_TEST_KEY_ERR", "test-key") };
        let config = create_test_config(mock_server.uri(), "ORIENTA_TEST_KEY_ERR");
        let backend = OpenAiBackend::new(&config, Duration::from_secs(5)).unwrap();

        let err = backend.generate("sys", &[], "ctx", "x").await.unwrap_err();
        assert!(matches!(err, OrientaError::Generation(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&mock_server)
            .await;

        unsafe { env::set_var("ORIENTA_TEST_KEY_EMPTY", "test-key") };
        let config = create_test_config(mock_server.uri(), "ORIENTA_TEST_KEY_EMPTY");
        let backend = OpenAiBackend::new(&config, Duration::from_secs(5)).unwrap();

        let err = backend.generate("sys", &[], "ctx", "x").await.unwrap_err();
        assert!(err.to_string().contains("Empty response"));
    }

    #[tokio::test]
    async fn test_is_available_and_name() {
        unsafe { env::set_var("ORIENTA_TEST_KEY_AVAIL", "test-key") };
        let config = create_test_config("https://api.example.com/v1".to_string(), "ORIENTA_TEST_KEY_AVAIL");
        let backend = OpenAiBackend::new(&config, Duration::from_secs(5)).unwrap();

        assert!(backend.is_available().await);
        assert_eq!(backend.name(), "openai");
    }
}
