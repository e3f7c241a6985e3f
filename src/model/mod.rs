//! Bayesian claim-frequency modelling
//!
//! Formula and design matrix construction, Poisson and negative binomial
//! observation families, posterior sampling, and predictive checking.

pub mod design;
pub mod draws;
pub mod engine;
pub mod family;
pub mod formula;
pub mod priors;
pub mod sampler;
pub mod summary;

use thiserror::Error;

use crate::dataset::DataError;

/// Errors raised while specifying, fitting, or summarizing a model
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid prior: {message}")]
    InvalidPrior { message: String },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("no usable policies after applying the model formula")]
    EmptyDesign,

    #[error("no observations to summarize")]
    EmptySample,

    #[error("no draws to summarize")]
    EmptyDrawSet,
}
