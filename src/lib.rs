//! MTPL Frequency - claim-frequency analysis for motor third-party liability portfolios
//!
//! This library provides:
//! - Policy and claim table loading with claim-to-policy joining
//! - Exploratory schema, distribution, and regional reports
//! - Claim-rate aggregation with bootstrap intervals
//! - Bayesian Poisson and negative binomial frequency models with prior
//!   and posterior predictive checks

pub mod dataset;
pub mod model;
pub mod rates;
pub mod report;
pub mod runner;

// Re-export commonly used types
pub use dataset::data::{Claim, Dimension, Policy};
pub use dataset::DataError;
pub use model::draws::PolicyDraw;
pub use model::engine::{FitConfig, FrequencyEngine, FrequencyFit};
pub use model::family::Family;
pub use model::formula::Formula;
pub use model::ModelError;
pub use runner::ModelRunner;
