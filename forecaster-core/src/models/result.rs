use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::chart::Chart;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionKind {
    Bayesian,
    Evolutionary,
}

impl PredictionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionKind::Bayesian => "bayesian",
            PredictionKind::Evolutionary => "evolutionary",
        }
    }
}

impl fmt::Display for PredictionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PredictionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bayesian" => Ok(PredictionKind::Bayesian),
            "evolutionary" => Ok(PredictionKind::Evolutionary),
            other => Err(format!("unknown prediction type '{}'", other)),
        }
    }
}

/// Whether a result came from the completion model or from the fallback heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionSource {
    Model,
    Heuristic,
}

impl PredictionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionSource::Model => "model",
            PredictionSource::Heuristic => "heuristic",
        }
    }
}

impl FromStr for PredictionSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "model" => Ok(PredictionSource::Model),
            "heuristic" => Ok(PredictionSource::Heuristic),
            other => Err(format!("unknown prediction source '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreatLevel {
    #[serde(rename = "Very Low")]
    VeryLow,
    Low,
    Moderate,
    High,
}

impl ThreatLevel {
    /// Bucket a score using the 0.25 / 0.5 / 0.75 thresholds (inclusive lower bounds).
    pub fn from_score(score: f64) -> Self {
        if score >= 0.75 {
            ThreatLevel::High
        } else if score >= 0.5 {
            ThreatLevel::Moderate
        } else if score >= 0.25 {
            ThreatLevel::Low
        } else {
            ThreatLevel::VeryLow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::VeryLow => "Very Low",
            ThreatLevel::Low => "Low",
            ThreatLevel::Moderate => "Moderate",
            ThreatLevel::High => "High",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreatLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Very Low" => Ok(ThreatLevel::VeryLow),
            "Low" => Ok(ThreatLevel::Low),
            "Moderate" => Ok(ThreatLevel::Moderate),
            "High" => Ok(ThreatLevel::High),
            other => Err(format!("unknown threat level '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingFeature {
    pub name: String,
    pub weight: f64,
}

impl ContributingFeature {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BayesianOutcome {
    pub vancomycin_resistance_probability: f64,
    pub ceftaroline_resistance_probability: f64,
    pub rationale: String,
    pub solution: String,
    pub confidence_level: f64,
    pub threat_level: ThreatLevel,
    pub contributing_features: Vec<ContributingFeature>,
    pub charts: Vec<Chart>,
    pub breakdown_analysis: String,
    pub source: PredictionSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionaryOutcome {
    pub resistance_prediction: String,
    pub confidence_level: f64,
    pub in_depth_explanation: String,
    pub suggested_interventions: String,
    pub threat_level: ThreatLevel,
    pub contributing_features: Vec<ContributingFeature>,
    pub charts: Vec<Chart>,
    pub breakdown_analysis: String,
    pub source: PredictionSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PredictionResult {
    Bayesian(BayesianOutcome),
    Evolutionary(EvolutionaryOutcome),
}

impl PredictionResult {
    pub fn kind(&self) -> PredictionKind {
        match self {
            PredictionResult::Bayesian(_) => PredictionKind::Bayesian,
            PredictionResult::Evolutionary(_) => PredictionKind::Evolutionary,
        }
    }

    pub fn charts(&self) -> &[Chart] {
        match self {
            PredictionResult::Bayesian(o) => &o.charts,
            PredictionResult::Evolutionary(o) => &o.charts,
        }
    }

    pub fn charts_mut(&mut self) -> &mut Vec<Chart> {
        match self {
            PredictionResult::Bayesian(o) => &mut o.charts,
            PredictionResult::Evolutionary(o) => &mut o.charts,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            PredictionResult::Bayesian(o) => o.confidence_level,
            PredictionResult::Evolutionary(o) => o.confidence_level,
        }
    }

    pub fn threat_level(&self) -> ThreatLevel {
        match self {
            PredictionResult::Bayesian(o) => o.threat_level,
            PredictionResult::Evolutionary(o) => o.threat_level,
        }
    }

    pub fn source(&self) -> PredictionSource {
        match self {
            PredictionResult::Bayesian(o) => o.source,
            PredictionResult::Evolutionary(o) => o.source,
        }
    }

    pub fn contributing_features(&self) -> &[ContributingFeature] {
        match self {
            PredictionResult::Bayesian(o) => &o.contributing_features,
            PredictionResult::Evolutionary(o) => &o.contributing_features,
        }
    }
}
