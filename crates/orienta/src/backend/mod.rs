//! Generation backend abstraction
//!
//! Defines the GenerationBackend trait the dialogue engine calls, plus the
//! two concrete implementations: a local Ollama server and a remote
//! OpenAI-compatible API. The implementation is selected by configuration,
//! never by which module happens to be linked.

pub mod ollama;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::BackendConfig;
use crate::error::{OrientaError, Result};
use crate::session::{Role, Turn};

pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

/// Trait for generation backends (local model server, remote API)
///
/// The backend call is the only pipeline step allowed to fail because of an
/// external outage; the engine converts such failures into a fixed apology.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Produce a reply from fixed system instructions, the session history,
    /// the assembled context, and the raw user text.
    async fn generate(
        &self,
        system_instructions: &str,
        history: &[Turn],
        context: &str,
        user_text: &str,
    ) -> Result<String>;

    /// Check if the backend is reachable (model loaded, API key present)
    async fn is_available(&self) -> bool;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Build the configured backend, failing fast on missing configuration.
pub fn from_config(
    config: &BackendConfig,
    timeout: Duration,
) -> Result<Arc<dyn GenerationBackend>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaBackend::new(&config.ollama, timeout)?)),
        "openai" => Ok(Arc::new(OpenAiBackend::new(&config.openai, timeout)?)),
        other => Err(OrientaError::Config(format!(
            "unknown backend provider '{other}': expected 'ollama' or 'openai'"
        ))),
    }
}

/// Chat message in the wire format both backends share
#[derive(Debug, Serialize)]
pub(crate) struct WireMessage {
    pub role: String,
    pub content: String,
}

/// Compose the message list: system instructions, prior turns, then the new
/// user turn carrying the assembled context.
pub(crate) fn build_messages(
    system_instructions: &str,
    history: &[Turn],
    context: &str,
    user_text: &str,
) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(WireMessage {
        role: "system".to_string(),
        content: system_instructions.to_string(),
    });
    for turn in history {
        messages.push(WireMessage {
            role: match turn.role {
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: turn.text.clone(),
        });
    }
    messages.push(WireMessage {
        role: "user".to_string(),
        content: format!("CONTEXTO:\n{context}\n\nPREGUNTA:\n{user_text}"),
    });
    messages
}
