//! Evaluation harness
//!
//! Runs a fixed labeled question set through the engine's
//! retrieve-and-generate path under a candidate parameter vector and scores
//! quality and latency. Session memory is bypassed: every case runs with an
//! empty history so trials are stateless and comparable.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::engine::DialogueEngine;
use crate::error::{OrientaError, Result};
use crate::retrieval::types::RetrievalParameters;

/// One labeled evaluation case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalCase {
    /// Question sent through the pipeline
    pub question: String,
    /// Terms the reply must contain, matched case-insensitively
    pub expected_terms: Vec<String>,
    /// Relative importance in the aggregate quality score
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// One evaluated candidate parameter vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trial {
    pub parameters: RetrievalParameters,
    /// Weighted mean quality in [0, 1]
    pub quality_score: f64,
    /// Arithmetic mean wall-clock latency per case
    pub mean_latency_seconds: f64,
}

/// Score a reply against the expected terms.
///
/// `m` = terms found as case-insensitive substrings. Full credit when all
/// terms appear, partial credit `0.5 + 0.5 * m/n` when some do, zero when
/// none do. A case with no expected terms scores zero.
pub fn score_reply(reply: &str, expected_terms: &[String]) -> f64 {
    if expected_terms.is_empty() {
        return 0.0;
    }
    let lowered = reply.to_lowercase();
    let matches = expected_terms
        .iter()
        .filter(|term| lowered.contains(&term.to_lowercase()))
        .count();

    if matches == expected_terms.len() {
        1.0
    } else if matches > 0 {
        0.5 + 0.5 * matches as f64 / expected_terms.len() as f64
    } else {
        0.0
    }
}

/// Drives the engine's pipeline over the test set, one Trial per candidate
pub struct EvalHarness {
    engine: Arc<DialogueEngine>,
    cases: Vec<EvalCase>,
}

impl EvalHarness {
    /// Create a harness over a non-empty test set.
    pub fn new(engine: Arc<DialogueEngine>, cases: Vec<EvalCase>) -> Result<Self> {
        if cases.is_empty() {
            return Err(OrientaError::Evaluation(
                "evaluation test set is empty".to_string(),
            ));
        }
        if cases.iter().any(|c| c.weight <= 0.0) {
            return Err(OrientaError::Evaluation(
                "evaluation case weights must be positive".to_string(),
            ));
        }
        Ok(Self { engine, cases })
    }

    pub fn case_count(&self) -> usize {
        self.cases.len()
    }

    /// Evaluate one candidate parameter vector over the whole test set.
    ///
    /// Cases run sequentially to keep backend load predictable. A failed
    /// generation scores 0.0 and its measured elapsed time still counts
    /// toward latency; a single bad case never aborts the trial.
    pub async fn evaluate(&self, params: &RetrievalParameters) -> Trial {
        let mut weighted_quality = 0.0;
        let mut total_weight = 0.0;
        let mut total_latency = 0.0;

        for case in &self.cases {
            let category = self.engine.classify(&case.question);
            let started = Instant::now();
            let reply = match self
                .engine
                .retrieve_and_generate(category, &case.question, params, &[])
                .await
            {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!("Evaluation case failed: {e}");
                    String::new()
                }
            };
            let latency = started.elapsed().as_secs_f64();

            let score = score_reply(&reply, &case.expected_terms);
            tracing::debug!(score, latency, "Case scored: {}", case.question);

            weighted_quality += case.weight * score;
            total_weight += case.weight;
            total_latency += latency;
        }

        Trial {
            parameters: *params,
            quality_score: weighted_quality / total_weight,
            mean_latency_seconds: total_latency / self.cases.len() as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_all_terms_present_scores_full() {
        let reply = "El arancel anual es de 4 millones de pesos.";
        assert_eq!(score_reply(reply, &terms(&["arancel", "millones", "anual"])), 1.0);
    }

    #[test]
    fn test_no_terms_present_scores_zero() {
        let reply = "No tengo información sobre eso.";
        assert_eq!(score_reply(reply, &terms(&["arancel", "millones"])), 0.0);
    }

    #[test]
    fn test_partial_match_scores_between() {
        let reply = "El arancel se publica cada año.";
        let score = score_reply(reply, &terms(&["arancel", "millones"]));
        assert_eq!(score, 0.5 + 0.5 * 0.5);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let reply = "ARANCEL: 4 MILLONES ANUALES";
        assert_eq!(score_reply(reply, &terms(&["arancel", "Millones"])), 1.0);
    }

    #[test]
    fn test_empty_expected_terms_scores_zero() {
        assert_eq!(score_reply("cualquier texto", &[]), 0.0);
    }

    #[test]
    fn test_default_weight_applied_on_deserialize() {
        let case: EvalCase = toml::from_str(
            r#"
question = "¿Cuánto dura el programa?"
expected_terms = ["semestres"]
"#,
        )
        .unwrap();
        assert_eq!(case.weight, 1.0);
    }
}
