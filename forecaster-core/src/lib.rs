pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod models;
pub mod predict;
pub mod render;
pub mod store;
pub mod validate;

pub use config::ForecasterConfig;
pub use error::ForecasterError;
pub use llm::{
    CompletionBackend, CompletionConfig, CompletionError, CompletionRequest,
    OpenAiCompletionClient, Provider,
};
pub use predict::Forecaster;
pub use validate::{validate_bayesian, validate_evolutionary, ValidationError};
