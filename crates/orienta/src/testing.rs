//! Test utilities for orienta - mock implementations of the external seams
//!
//! The index gateway and generation backend are the only collaborators the
//! engine reaches over the network; these mocks stand in for them in unit
//! and integration tests, recording every call so tests can assert on call
//! counts, query expansion and history threading.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::backend::GenerationBackend;
use crate::error::{OrientaError, Result};
use crate::index::IndexGateway;
use crate::retrieval::types::Chunk;
use crate::session::Turn;

/// Mock index gateway returning a fixed chunk list.
///
/// Records every `(query, k)` request in order.
#[derive(Debug, Default)]
pub struct MockIndexGateway {
    chunks: Vec<Chunk>,
    fail: bool,
    call_count: AtomicUsize,
    requests: Mutex<Vec<(String, usize)>>,
}

impl MockIndexGateway {
    /// Gateway that finds nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway that returns these chunks for every search
    pub fn with_chunks(chunks: Vec<Chunk>) -> Self {
        Self {
            chunks,
            ..Self::default()
        }
    }

    /// Gateway whose every search fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// All `(query, k)` pairs searched so far, in call order
    pub fn requests(&self) -> Vec<(String, usize)> {
        self.requests.lock().expect("requests lock poisoned").clone()
    }
}

#[async_trait]
impl IndexGateway for MockIndexGateway {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("requests lock poisoned")
            .push((query.to_string(), k));
        if self.fail {
            return Err(OrientaError::Retrieval(
                "mock index unavailable".to_string(),
            ));
        }
        Ok(self.chunks.clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// One recorded generation request
#[derive(Debug, Clone)]
pub struct GenerationCall {
    pub history_len: usize,
    pub context: String,
    pub user_text: String,
}

/// Mock generation backend returning a fixed reply.
///
/// Records the history length, context and user text of every call.
#[derive(Debug)]
pub struct MockGenerationBackend {
    reply: String,
    fail: bool,
    calls: Mutex<Vec<GenerationCall>>,
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self {
            reply: "respuesta simulada".to_string(),
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend answering every request with this reply
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            ..Self::default()
        }
    }

    /// Backend whose every generation fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock poisoned").len()
    }

    /// All generation requests so far, in call order
    pub fn calls(&self) -> Vec<GenerationCall> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(
        &self,
        _system_instructions: &str,
        history: &[Turn],
        context: &str,
        user_text: &str,
    ) -> Result<String> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(GenerationCall {
                history_len: history.len(),
                context: context.to_string(),
                user_text: user_text.to_string(),
            });
        if self.fail {
            return Err(OrientaError::Generation(
                "mock backend unavailable".to_string(),
            ));
        }
        Ok(self.reply.clone())
    }

    async fn is_available(&self) -> bool {
        !self.fail
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
