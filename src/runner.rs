//! Model runner for batch fits over a preloaded portfolio
//!
//! Loads the hand-off tables once, then allows fitting many model
//! configurations without re-reading CSV files.

use std::path::Path;

use serde::Serialize;

use crate::dataset::data::Policy;
use crate::dataset::loader;
use crate::model::engine::{FitConfig, FrequencyEngine, FrequencyFit};
use crate::model::ModelError;

/// Pre-loaded portfolio with batch fitting helpers
#[derive(Debug, Clone)]
pub struct ModelRunner {
    portfolio: Vec<Policy>,
}

impl ModelRunner {
    /// Create a runner over an in-memory portfolio
    pub fn new(portfolio: Vec<Policy>) -> Self {
        Self { portfolio }
    }

    /// Create a runner by loading the hand-off tables
    pub fn from_tables<P: AsRef<Path>>(
        policy_path: P,
        claim_path: P,
    ) -> Result<Self, ModelError> {
        Ok(Self {
            portfolio: loader::load_portfolio(policy_path, claim_path)?,
        })
    }

    pub fn portfolio(&self) -> &[Policy] {
        &self.portfolio
    }

    /// Fit a single model configuration
    pub fn run(&self, config: FitConfig) -> Result<FrequencyFit, ModelError> {
        FrequencyEngine::new(config).fit(&self.portfolio)
    }

    /// Fit several configurations against the same portfolio
    pub fn run_fits(&self, configs: &[FitConfig]) -> Result<Vec<FrequencyFit>, ModelError> {
        configs.iter().map(|config| self.run(config.clone())).collect()
    }

    /// Deviance comparison across fits, best first. Prior-only fits carry
    /// no deviance and sort to the end.
    pub fn compare(fits: &[FrequencyFit]) -> Vec<FitComparison> {
        let mut comparisons: Vec<FitComparison> = fits
            .iter()
            .map(|fit| FitComparison {
                formula: fit.formula_label.clone(),
                family: fit.family.name(),
                prior_only: fit.prior_only,
                rows: fit.rows,
                mean_deviance: fit.mean_deviance,
            })
            .collect();
        comparisons.sort_by(|a, b| match (a.mean_deviance, b.mean_deviance) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        comparisons
    }
}

/// One row of a model comparison table
#[derive(Debug, Clone, Serialize)]
pub struct FitComparison {
    pub formula: String,
    pub family: &'static str,
    pub prior_only: bool,
    pub rows: usize,
    pub mean_deviance: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::data::{Area, Region, VehBrand, VehGas};
    use crate::model::sampler::SamplerConfig;

    fn unit_policy(policy_id: u64, claim_count: u32) -> Policy {
        Policy {
            policy_id,
            exposure: 1.0,
            area: Area::C,
            veh_power: 6,
            veh_age: 3,
            driv_age: 40,
            bonus_malus: 50,
            veh_brand: VehBrand::B2,
            veh_gas: VehGas::Regular,
            density: Some(500.0),
            region: Region::R24,
            reported_claim_count: claim_count,
            claim_count,
            claim_total: 0.0,
            patched: false,
            claims: Vec::new(),
        }
    }

    fn quick_sampler(seed: u64) -> SamplerConfig {
        SamplerConfig {
            chains: 1,
            warmup: 100,
            draws: 100,
            seed,
        }
    }

    #[test]
    fn test_runner_fits_multiple_configs() {
        let portfolio: Vec<Policy> = (0..60)
            .map(|i| unit_policy(i, u32::from(i % 12 == 0)))
            .collect();
        let runner = ModelRunner::new(portfolio);

        let configs = vec![
            FitConfig {
                prior_only: true,
                sampler: quick_sampler(1),
                predictive_draws: 20,
                ..FitConfig::default()
            },
            FitConfig {
                sampler: quick_sampler(2),
                predictive_draws: 20,
                ..FitConfig::default()
            },
        ];

        let fits = runner.run_fits(&configs).unwrap();
        assert_eq!(fits.len(), 2);
        assert!(fits[0].mean_deviance.is_none());
        assert!(fits[1].mean_deviance.is_some());
    }

    #[test]
    fn test_compare_orders_by_deviance() {
        let portfolio: Vec<Policy> = (0..60)
            .map(|i| unit_policy(i, u32::from(i % 12 == 0)))
            .collect();
        let runner = ModelRunner::new(portfolio);

        let fits = runner
            .run_fits(&[
                FitConfig {
                    prior_only: true,
                    sampler: quick_sampler(3),
                    predictive_draws: 10,
                    ..FitConfig::default()
                },
                FitConfig {
                    sampler: quick_sampler(4),
                    predictive_draws: 10,
                    ..FitConfig::default()
                },
            ])
            .unwrap();

        let table = ModelRunner::compare(&fits);
        assert_eq!(table.len(), 2);
        assert!(table[0].mean_deviance.is_some());
        assert!(table[1].prior_only);
    }
}
