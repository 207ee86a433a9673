//! Dialogue engine
//!
//! Per-turn state machine: classify, gate, retrieve, assemble, generate,
//! persist. Blocked and greeting turns terminate before any external call;
//! a gateway or backend failure surfaces as a fixed apology and the turn is
//! never half-persisted. The evaluation harness drives the same
//! retrieve-and-generate path with session memory bypassed, so the tuned
//! pipeline is exactly the runtime pipeline.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::backend::{self, GenerationBackend};
use crate::classify::{Classifier, QueryCategory};
use crate::config::{Config, TemplatesConfig};
use crate::error::{OrientaError, Result};
use crate::index::{HttpIndexGateway, IndexGateway};
use crate::retrieval::context::assemble;
use crate::retrieval::policy::RetrievalPolicy;
use crate::retrieval::types::RetrievalParameters;
use crate::session::{SessionId, SessionStore, Turn};

/// Orchestrates one conversation turn end to end
///
/// All collaborators are injected at construction; there is no lazy
/// initialization and no global state. Building an engine fails fast when
/// the backend or index configuration is unusable.
pub struct DialogueEngine {
    classifier: Classifier,
    policy: RetrievalPolicy,
    parameters: RetrievalParameters,
    templates: TemplatesConfig,
    system_prompt: String,
    call_timeout: Duration,
    index: Arc<dyn IndexGateway>,
    backend: Arc<dyn GenerationBackend>,
    sessions: Arc<SessionStore>,
}

impl DialogueEngine {
    /// Assemble an engine from validated configuration and injected seams.
    pub fn new(
        config: &Config,
        index: Arc<dyn IndexGateway>,
        backend: Arc<dyn GenerationBackend>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            classifier: Classifier::new(&config.classifier),
            policy: RetrievalPolicy::new(config.retrieval.financial_expansion.clone()),
            parameters: RetrievalParameters::from(&config.retrieval),
            templates: config.templates.clone(),
            system_prompt: config.engine.system_prompt.clone(),
            call_timeout: Duration::from_secs(config.engine.timeout_secs),
            index,
            backend,
            sessions,
        }
    }

    /// Build an engine with the production HTTP gateway and the configured
    /// generation backend. Fails fast on configuration problems.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let call_timeout = Duration::from_secs(config.engine.timeout_secs);
        let index = Arc::new(HttpIndexGateway::new(&config.index, call_timeout)?);
        let backend = backend::from_config(&config.backend, call_timeout)?;
        Ok(Self::new(config, index, backend, Arc::new(SessionStore::new())))
    }

    /// Process one user turn and return the reply.
    ///
    /// Never fails: gated turns return their fixed template and external
    /// failures are converted into the apology template. Only a successful
    /// generated exchange is appended to the session.
    pub async fn respond(&self, session_id: &SessionId, user_text: &str) -> String {
        let text = user_text.trim();
        if text.is_empty() {
            return self.templates.empty_input.clone();
        }

        let category = self.classifier.classify(text);
        tracing::debug!(session = %session_id, ?category, "Turn classified");

        match category {
            QueryCategory::Injection => self.templates.refusal.clone(),
            QueryCategory::OutOfScope => self.templates.out_of_scope.clone(),
            QueryCategory::Greeting => self.templates.greeting.clone(),
            QueryCategory::Financial | QueryCategory::General => {
                let history = self.sessions.history(session_id);
                match self
                    .retrieve_and_generate(category, text, &self.parameters, &history)
                    .await
                {
                    Ok(reply) => {
                        self.sessions.append_exchange(
                            session_id,
                            Turn::user(text),
                            Turn::assistant(reply.clone()),
                        );
                        reply
                    }
                    Err(e) => {
                        tracing::warn!(session = %session_id, "Turn failed: {e}");
                        self.templates.apology.clone()
                    }
                }
            }
        }
    }

    /// The retrieval-and-generation path shared with the evaluation harness.
    ///
    /// Plans breadth and query expansion for the category, searches the
    /// index, bounds the context and invokes the backend. Each external call
    /// runs under its own timeout; a timed-out call is that call's failure.
    pub async fn retrieve_and_generate(
        &self,
        category: QueryCategory,
        text: &str,
        params: &RetrievalParameters,
        history: &[Turn],
    ) -> Result<String> {
        let plan = self.policy.plan(category, text, params);
        tracing::debug!(k = plan.k, "Searching: {}", plan.query);

        let chunks = timeout(self.call_timeout, self.index.search(&plan.query, plan.k))
            .await
            .map_err(|_| OrientaError::Retrieval("Index search timed out".to_string()))??;

        let context = assemble(&chunks, params.max_context_chars, &self.templates.no_context);

        let reply = timeout(
            self.call_timeout,
            self.backend
                .generate(&self.system_prompt, history, &context, text),
        )
        .await
        .map_err(|_| OrientaError::Generation("Generation timed out".to_string()))??;

        Ok(reply)
    }

    /// Classify a turn without processing it. Used by the evaluation harness
    /// so tuning runs the exact classifier the runtime uses.
    pub fn classify(&self, text: &str) -> QueryCategory {
        self.classifier.classify(text)
    }

    /// Runtime retrieval parameters this engine was built with
    pub fn parameters(&self) -> &RetrievalParameters {
        &self.parameters
    }

    /// The session store backing this engine
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockGenerationBackend, MockIndexGateway};

    fn engine_with(index: Arc<MockIndexGateway>, backend: Arc<MockGenerationBackend>) -> DialogueEngine {
        let config = Config::default();
        DialogueEngine::new(&config, index, backend, Arc::new(SessionStore::new()))
    }

    fn session() -> SessionId {
        SessionId::try_from("prueba").unwrap()
    }

    #[tokio::test]
    async fn test_empty_input_short_circuits() {
        let index = Arc::new(MockIndexGateway::new());
        let backend = Arc::new(MockGenerationBackend::new());
        let engine = engine_with(index.clone(), backend.clone());

        assert_eq!(engine.respond(&session(), "   ").await, "...");
        assert_eq!(index.call_count(), 0);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_greeting_answered_from_template() {
        let index = Arc::new(MockIndexGateway::new());
        let backend = Arc::new(MockGenerationBackend::new());
        let engine = engine_with(index.clone(), backend.clone());

        let reply = engine.respond(&session(), "hola").await;
        assert_eq!(reply, Config::default().templates.greeting);
        assert_eq!(index.call_count(), 0);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_generated_turn_is_persisted_as_a_pair() {
        let index = Arc::new(MockIndexGateway::with_chunks(vec![
            crate::retrieval::types::Chunk::new("El doctorado dura 8 semestres."),
        ]));
        let backend = Arc::new(MockGenerationBackend::with_reply("Dura 8 semestres."));
        let engine = engine_with(index, backend);
        let id = session();

        let reply = engine.respond(&id, "¿cuánto dura el doctorado en informática?").await;
        assert_eq!(reply, "Dura 8 semestres.");

        let turns = engine.sessions().history(&id);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].text, "¿cuánto dura el doctorado en informática?");
        assert_eq!(turns[1].text, "Dura 8 semestres.");
    }

    #[tokio::test]
    async fn test_history_is_threaded_into_generation() {
        let index = Arc::new(MockIndexGateway::with_chunks(vec![
            crate::retrieval::types::Chunk::new("Becas de arancel y mantención."),
        ]));
        let backend = Arc::new(MockGenerationBackend::with_reply("Claro."));
        let engine = engine_with(index, backend.clone());
        let id = session();

        engine.respond(&id, "qué becas internas ofrece la universidad hoy").await;
        engine.respond(&id, "dame más detalles de la primera por favor").await;

        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].history_len, 0);
        assert_eq!(calls[1].history_len, 2);
    }

    #[tokio::test]
    async fn test_gateway_failure_returns_apology_and_persists_nothing() {
        let index = Arc::new(MockIndexGateway::failing());
        let backend = Arc::new(MockGenerationBackend::new());
        let engine = engine_with(index, backend.clone());
        let id = session();

        let reply = engine.respond(&id, "requisitos del doctorado en informática").await;
        assert_eq!(reply, Config::default().templates.apology);
        assert_eq!(backend.call_count(), 0);
        assert!(engine.sessions().history(&id).is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_returns_apology_and_persists_nothing() {
        let index = Arc::new(MockIndexGateway::with_chunks(vec![
            crate::retrieval::types::Chunk::new("contexto"),
        ]));
        let backend = Arc::new(MockGenerationBackend::failing());
        let engine = engine_with(index, backend);
        let id = session();

        let reply = engine.respond(&id, "requisitos del doctorado en informática").await;
        assert_eq!(reply, Config::default().templates.apology);
        assert!(engine.sessions().history(&id).is_empty());
    }

    #[tokio::test]
    async fn test_empty_retrieval_hands_sentinel_to_backend() {
        let index = Arc::new(MockIndexGateway::new());
        let backend = Arc::new(MockGenerationBackend::with_reply("No tengo ese dato."));
        let engine = engine_with(index, backend.clone());

        engine.respond(&session(), "líneas de investigación del doctorado").await;

        let calls = backend.calls();
        assert_eq!(calls[0].context, Config::default().templates.no_context);
    }
}
