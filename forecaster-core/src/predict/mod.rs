//! Prediction generator.
//!
//! `Forecaster` sends one prompt per request to the configured
//! `CompletionBackend`, validates the reply against a strict schema and
//! derives confidence, threat level and contributing features from it. Any
//! failure (transport, API status, malformed or out-of-range JSON) is logged
//! and replaced by the deterministic heuristic for that request kind, so the
//! predict methods always return a result.

pub mod bayesian;
pub mod evolutionary;

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::config::LlmConfig;
use crate::llm::{CompletionBackend, CompletionError, CompletionRequest};
use crate::models::{
    BayesianRequest, Chart, EvolutionaryRequest, PredictionRequest, PredictionResult,
};

/// Maximum number of mutations per list that feed the confidence burden term
/// and the contributing-feature list.
pub const MAX_FEATURES: usize = 6;

#[derive(Clone)]
pub struct Forecaster {
    backend: Arc<dyn CompletionBackend>,
    bayesian_temperature: f32,
    evolutionary_temperature: f32,
}

impl Forecaster {
    pub fn new(backend: Arc<dyn CompletionBackend>, llm: &LlmConfig) -> Self {
        Self {
            backend,
            bayesian_temperature: llm.bayesian_temperature,
            evolutionary_temperature: llm.evolutionary_temperature,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub async fn predict(&self, request: &PredictionRequest) -> PredictionResult {
        match request {
            PredictionRequest::Bayesian(r) => self.predict_bayesian(r).await,
            PredictionRequest::Evolutionary(r) => self.predict_evolutionary(r).await,
        }
    }

    pub async fn predict_bayesian(&self, request: &BayesianRequest) -> PredictionResult {
        let prompt = CompletionRequest {
            system: bayesian::system_prompt(),
            user: bayesian::user_prompt(request),
            temperature: self.bayesian_temperature,
        };

        let outcome = match self.complete(&prompt).await.and_then(bayesian::parse_completion) {
            Ok(completion) => bayesian::from_completion(request, completion),
            Err(e) => {
                log_fallback("bayesian", self.backend.name(), &e);
                bayesian::fallback(request)
            }
        };

        PredictionResult::Bayesian(outcome)
    }

    pub async fn predict_evolutionary(&self, request: &EvolutionaryRequest) -> PredictionResult {
        let prompt = CompletionRequest {
            system: evolutionary::system_prompt(),
            user: evolutionary::user_prompt(request),
            temperature: self.evolutionary_temperature,
        };

        let outcome = match self
            .complete(&prompt)
            .await
            .and_then(evolutionary::parse_completion)
        {
            Ok(completion) => evolutionary::from_completion(request, completion),
            Err(e) => {
                log_fallback("evolutionary", self.backend.name(), &e);
                evolutionary::fallback(request)
            }
        };

        PredictionResult::Evolutionary(outcome)
    }

    async fn complete(
        &self,
        prompt: &CompletionRequest,
    ) -> Result<serde_json::Value, CompletionError> {
        self.backend.complete_json(prompt).await
    }
}

fn log_fallback(kind: &str, backend: &str, error: &CompletionError) {
    tracing::warn!(
        kind,
        backend,
        upstream = error.is_upstream(),
        error = %error,
        "Completion unavailable, using heuristic fallback"
    );
}

// ============================================================================
// Shared derivations
// ============================================================================

pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

pub(crate) fn is_unit_interval(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

/// Reject any chart value outside [0, 1].
pub(crate) fn check_chart_values(charts: &[Chart]) -> Result<(), CompletionError> {
    for chart in charts {
        if let Some(point) = chart.data.iter().find(|p| !is_unit_interval(p.value)) {
            return Err(CompletionError::Malformed(format!(
                "chart '{}' value {} for '{}' is outside [0, 1]",
                chart.title, point.value, point.name
            )));
        }
    }
    Ok(())
}

/// Model charts minus empty ones, with any model-supplied ids dropped.
pub(crate) fn usable_charts(charts: Option<Vec<Chart>>) -> Vec<Chart> {
    charts
        .unwrap_or_default()
        .into_iter()
        .filter(|c| !c.data.is_empty())
        .map(|mut c| {
            c.id = None;
            c
        })
        .collect()
}

fn resistance_keyword_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)van|thicken|cell\s*wall").expect("static regex"))
}

/// True when profile text mentions a vancomycin resistance mechanism.
pub fn has_resistance_keywords(text: Option<&str>) -> bool {
    text.map(|t| resistance_keyword_regex().is_match(t))
        .unwrap_or(false)
}

pub(crate) fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}
