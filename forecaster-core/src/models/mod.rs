pub mod chart;
pub mod record;
pub mod request;
pub mod result;

pub use chart::{Chart, ChartView, DataPoint};
pub use record::{NewPrediction, PredictionRecord};
pub use request::{BayesianRequest, EvolutionaryRequest, PredictionRequest};
pub use result::{
    BayesianOutcome, ContributingFeature, EvolutionaryOutcome, PredictionKind, PredictionResult,
    PredictionSource, ThreatLevel,
};
