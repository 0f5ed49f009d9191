//! Input validation for prediction requests.
//!
//! Payloads arrive as loosely-typed JSON. Each validator extracts the fields it
//! needs, trims blanks and returns a typed request, or a `ValidationError`
//! naming the offending field. Nothing here touches the store or the network.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{BayesianRequest, EvolutionaryRequest};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

fn mutation_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9_\-]+\(.+\)").expect("static regex"))
}

/// Split free text on newlines, commas and semicolons into trimmed, non-empty tokens.
pub fn mutation_tokens(text: &str) -> Vec<String> {
    text.split(['\n', '\r', ',', ';'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// True when the token looks like `name(change)`, e.g. `mecA(G246E)`.
pub fn is_mutation_token(token: &str) -> bool {
    mutation_token_regex().is_match(token)
}

pub fn validate_bayesian(payload: &Value) -> Result<BayesianRequest, ValidationError> {
    let obj = as_object(payload)?;

    let mec_a_mutations = string_list(obj, "mecAMutations")?;
    let pbp2a_mutations = string_list(obj, "pbp2aMutations")?;

    if mec_a_mutations.is_empty() && pbp2a_mutations.is_empty() {
        tracing::debug!("Rejected bayesian request with no mutations");
        return Err(ValidationError::new(
            "mutations",
            "Please provide at least one mecA or PBP2a mutation (e.g., [\"G246E\"]).",
        ));
    }

    Ok(BayesianRequest {
        mec_a_mutations,
        pbp2a_mutations,
        vancomycin_resistance_profile: optional_string(obj, "vancomycinResistanceProfile")?,
        ceftaroline_resistance_profile: optional_string(obj, "ceftarolineResistanceProfile")?,
    })
}

pub fn validate_evolutionary(payload: &Value) -> Result<EvolutionaryRequest, ValidationError> {
    let obj = as_object(payload)?;

    let mutation_patterns = required_string(obj, "mutationPatterns")?;
    let evolutionary_trajectories = required_string(obj, "evolutionaryTrajectories")?;
    let existing_knowledge = optional_string(obj, "existingKnowledge")?;

    let tokens = mutation_tokens(&mutation_patterns);
    if !tokens.iter().any(|t| is_mutation_token(t)) {
        tracing::debug!(tokens = tokens.len(), "Rejected evolutionary request with no plausible mutation token");
        return Err(ValidationError::new(
            "mutationPatterns",
            "Invalid mutation patterns: please provide mutation tokens in a recognizable format, \
             e.g. `mecA(G246E), PBP2a(V311A)`.",
        ));
    }

    Ok(EvolutionaryRequest {
        mutation_patterns,
        evolutionary_trajectories,
        existing_knowledge,
    })
}

// ============================================================================
// Field extraction helpers
// ============================================================================

fn as_object(payload: &Value) -> Result<&Map<String, Value>, ValidationError> {
    payload
        .as_object()
        .ok_or_else(|| ValidationError::new("body", "Request body must be a JSON object"))
}

/// Missing or null → empty. A single string is split like free-text patterns.
fn string_list(obj: &Map<String, Value>, field: &str) -> Result<Vec<String>, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(mutation_tokens(s)),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if s.trim().is_empty() => None,
                Value::String(s) => Some(Ok(s.trim().to_string())),
                Value::Null => None,
                _ => Some(Err(ValidationError::new(
                    field,
                    format!("{} must contain only strings", field),
                ))),
            })
            .collect(),
        Some(_) => Err(ValidationError::new(
            field,
            format!("{} must be a list of strings", field),
        )),
    }
}

fn optional_string(
    obj: &Map<String, Value>,
    field: &str,
) -> Result<Option<String>, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(ValidationError::new(field, format!("{} must be a string", field))),
    }
}

fn required_string(obj: &Map<String, Value>, field: &str) -> Result<String, ValidationError> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        None | Some(Value::Null) => {
            Err(ValidationError::new(field, format!("{} is required", field)))
        }
        Some(_) => Err(ValidationError::new(field, format!("{} must be a string", field))),
    }
}
