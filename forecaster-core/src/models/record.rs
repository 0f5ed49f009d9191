use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::request::PredictionRequest;
use super::result::{PredictionKind, PredictionResult};

/// A pipeline run ready to be written. The store assigns `id` and `createdAt`.
#[derive(Debug, Clone, Copy)]
pub struct NewPrediction<'a> {
    pub input: &'a PredictionRequest,
    pub output: &'a PredictionResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: PredictionKind,
    pub created_at: DateTime<Utc>,
    pub input: BTreeMap<String, String>,
    pub output: PredictionResult,
}
