//! Evaluation harness scoring and aggregation against mock seams

use std::sync::Arc;

use orienta_server::config::Config;
use orienta_server::engine::DialogueEngine;
use orienta_server::eval::{EvalCase, EvalHarness};
use orienta_server::retrieval::types::{Chunk, RetrievalParameters};
use orienta_server::session::SessionStore;
use orienta_server::testing::{MockGenerationBackend, MockIndexGateway};

fn case(question: &str, expected: &[&str], weight: f64) -> EvalCase {
    EvalCase {
        question: question.to_string(),
        expected_terms: expected.iter().map(|s| s.to_string()).collect(),
        weight,
    }
}

fn harness_with(
    index: Arc<MockIndexGateway>,
    backend: Arc<MockGenerationBackend>,
    cases: Vec<EvalCase>,
) -> EvalHarness {
    let engine = DialogueEngine::new(
        &Config::default(),
        index,
        backend,
        Arc::new(SessionStore::new()),
    );
    EvalHarness::new(Arc::new(engine), cases).unwrap()
}

#[tokio::test]
async fn reply_containing_all_terms_scores_full_quality() {
    let index = Arc::new(MockIndexGateway::with_chunks(vec![Chunk::new("dato")]));
    let backend = Arc::new(MockGenerationBackend::with_reply(
        "El arancel anual es de 4 millones.",
    ));
    let harness = harness_with(
        index,
        backend,
        vec![case(
            "arancel anual del doctorado en informática",
            &["arancel", "millones", "anual"],
            1.0,
        )],
    );

    let trial = harness.evaluate(&RetrievalParameters::new(4, 3, 8000)).await;
    assert_eq!(trial.quality_score, 1.0);
    assert!(trial.mean_latency_seconds >= 0.0);
}

#[tokio::test]
async fn reply_containing_no_terms_scores_zero() {
    let index = Arc::new(MockIndexGateway::with_chunks(vec![Chunk::new("dato")]));
    let backend = Arc::new(MockGenerationBackend::with_reply("No tengo ese dato."));
    let harness = harness_with(
        index,
        backend,
        vec![case(
            "arancel anual del doctorado en informática",
            &["millones", "pesos"],
            1.0,
        )],
    );

    let trial = harness.evaluate(&RetrievalParameters::new(4, 3, 8000)).await;
    assert_eq!(trial.quality_score, 0.0);
}

#[tokio::test]
async fn aggregate_quality_is_a_weighted_mean() {
    // One reply for both cases: matches the first case's terms, not the
    // second's. quality = (2.0 * 1.0 + 1.0 * 0.0) / 3.0
    let index = Arc::new(MockIndexGateway::with_chunks(vec![Chunk::new("dato")]));
    let backend = Arc::new(MockGenerationBackend::with_reply(
        "El programa dura 8 semestres.",
    ));
    let harness = harness_with(
        index,
        backend,
        vec![
            case("duración del magíster en informática", &["semestres", "8"], 2.0),
            case("becas del doctorado en informática", &["beca"], 1.0),
        ],
    );

    let trial = harness.evaluate(&RetrievalParameters::new(4, 3, 8000)).await;
    assert!((trial.quality_score - 2.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn failed_generation_scores_zero_without_aborting_the_trial() {
    let index = Arc::new(MockIndexGateway::with_chunks(vec![Chunk::new("dato")]));
    let backend = Arc::new(MockGenerationBackend::failing());
    let harness = harness_with(
        index,
        backend,
        vec![
            case("arancel del magíster en informática", &["arancel"], 1.0),
            case("becas del doctorado en informática", &["beca"], 1.0),
        ],
    );

    let trial = harness.evaluate(&RetrievalParameters::new(4, 3, 8000)).await;
    assert_eq!(trial.quality_score, 0.0);
    assert!(trial.mean_latency_seconds >= 0.0);
}

#[tokio::test]
async fn candidate_parameters_drive_the_search_not_engine_defaults() {
    // The engine's own runtime parameters say k_financial = 10; the harness
    // must search with the candidate's value instead.
    let index = Arc::new(MockIndexGateway::with_chunks(vec![Chunk::new("dato")]));
    let backend = Arc::new(MockGenerationBackend::new());
    let harness = harness_with(
        index.clone(),
        backend,
        vec![case("¿cuánto cuesta el programa?", &["arancel"], 1.0)],
    );

    let candidate = RetrievalParameters::new(7, 3, 6000);
    harness.evaluate(&candidate).await;

    let requests = index.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].1, 3);
}

#[tokio::test]
async fn evaluation_bypasses_session_memory() {
    let index = Arc::new(MockIndexGateway::with_chunks(vec![Chunk::new("dato")]));
    let backend = Arc::new(MockGenerationBackend::new());
    let harness = harness_with(
        index,
        backend.clone(),
        vec![
            case("arancel del magíster en informática", &["arancel"], 1.0),
            case("becas del doctorado en informática", &["beca"], 1.0),
        ],
    );

    harness.evaluate(&RetrievalParameters::new(4, 3, 8000)).await;
    harness.evaluate(&RetrievalParameters::new(5, 2, 9000)).await;

    // Every case runs stateless: no history ever reaches the backend
    assert!(backend.calls().iter().all(|c| c.history_len == 0));
}

#[test]
fn empty_test_set_is_rejected() {
    let engine = DialogueEngine::new(
        &Config::default(),
        Arc::new(MockIndexGateway::new()),
        Arc::new(MockGenerationBackend::new()),
        Arc::new(SessionStore::new()),
    );
    assert!(EvalHarness::new(Arc::new(engine), Vec::new()).is_err());
}

#[test]
fn non_positive_weights_are_rejected() {
    let engine = DialogueEngine::new(
        &Config::default(),
        Arc::new(MockIndexGateway::new()),
        Arc::new(MockGenerationBackend::new()),
        Arc::new(SessionStore::new()),
    );
    let cases = vec![case("pregunta", &["respuesta"], 0.0)];
    assert!(EvalHarness::new(Arc::new(engine), cases).is_err());
}
