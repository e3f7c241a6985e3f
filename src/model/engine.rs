//! Frequency model fitting engine

use chrono::Utc;
use log::{info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use serde::Serialize;

use crate::dataset::data::Policy;
use crate::model::design::{Design, DesignInfo};
use crate::model::draws::{DrawSet, ParameterEstimate, PolicyDraw};
use crate::model::family::Family;
use crate::model::formula::Formula;
use crate::model::priors::PriorConfig;
use crate::model::sampler::{sample_posterior, ChainRun, Draw, SamplerConfig};
use crate::model::summary::{predictive_check, CountSummary, PredictiveDistribution};
use crate::model::ModelError;

/// Seed offset separating predictive simulation streams from chain streams
const PREDICTIVE_SEED_OFFSET: u64 = 1_000_000;

/// Seed offset for the per-policy draw simulations
const POLICY_DRAW_SEED_OFFSET: u64 = 2_000_000;

const RHAT_WARN_THRESHOLD: f64 = 1.05;

/// Everything needed to specify one frequency model fit
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub formula: Formula,
    pub family: Family,
    pub priors: PriorConfig,
    pub sampler: SamplerConfig,

    /// Draw from the priors alone instead of conditioning on the data.
    /// The resulting predictive distribution shows what the priors claim
    /// about claim counts before any evidence is weighed.
    pub prior_only: bool,

    /// Retained draws pushed through the count simulator for predictive
    /// checking, spaced evenly across the draw set
    pub predictive_draws: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            formula: Formula::default(),
            family: Family::Poisson,
            priors: PriorConfig::default(),
            sampler: SamplerConfig::default(),
            prior_only: false,
            predictive_draws: 200,
        }
    }
}

/// A fitted frequency model with its draws and predictive checks
#[derive(Debug, Clone)]
pub struct FrequencyFit {
    pub formula_label: String,
    pub family: Family,
    pub prior_only: bool,

    /// Rows entering the design after exclusions
    pub rows: usize,

    /// Policies excluded from the design
    pub dropped: usize,

    pub estimates: Vec<ParameterEstimate>,

    /// Statistics of the observed claim counts
    pub observed: CountSummary,

    /// Observed statistics against their simulated distributions
    pub predictive: Vec<PredictiveDistribution>,

    /// Mean deviance over the retained draws; absent for prior-only fits
    pub mean_deviance: Option<f64>,

    /// The retained draws themselves
    pub draws: DrawSet,

    /// The coding the training design applied, used to score new policies
    pub design: DesignInfo,
}

/// Serializable fit report for hand-off
#[derive(Debug, Clone, Serialize)]
pub struct FitReport {
    pub created: String,
    pub formula: String,
    pub family: &'static str,
    pub prior_only: bool,
    pub chains: usize,
    pub total_draws: usize,
    pub rows: usize,
    pub dropped: usize,
    pub mean_deviance: Option<f64>,
    pub estimates: Vec<ParameterEstimate>,
    pub observed: CountSummary,
    pub predictive: Vec<PredictiveDistribution>,
}

impl FrequencyFit {
    pub fn report(&self) -> FitReport {
        FitReport {
            created: Utc::now().to_rfc3339(),
            formula: self.formula_label.clone(),
            family: self.family.name(),
            prior_only: self.prior_only,
            chains: self.draws.chains(),
            total_draws: self.draws.total_draws(),
            rows: self.rows,
            dropped: self.dropped,
            mean_deviance: self.mean_deviance,
            estimates: self.estimates.clone(),
            observed: self.observed.clone(),
            predictive: self.predictive.clone(),
        }
    }
}

/// Fits frequency models to a policy portfolio
pub struct FrequencyEngine {
    config: FitConfig,
}

impl FrequencyEngine {
    pub fn new(config: FitConfig) -> Self {
        Self { config }
    }

    pub fn fit(&self, policies: &[Policy]) -> Result<FrequencyFit, ModelError> {
        let config = &self.config;
        config.sampler.validate()?;
        config.priors.validate()?;

        let design = Design::build(policies, &config.formula)?;
        info!(
            "fitting {} model ({}) on {} rows, {} dropped, prior_only={}",
            config.family.name(),
            config.formula.label(),
            design.rows(),
            design.dropped,
            config.prior_only
        );

        let runs = if config.prior_only {
            prior_runs(&design, config)
        } else {
            sample_posterior(&design, config.family, &config.priors, &config.sampler)?
        };
        let draws = DrawSet::new(design.names.clone(), runs)?;

        let estimates = draws.estimates();
        if !config.prior_only {
            for estimate in &estimates {
                if estimate.rhat > RHAT_WARN_THRESHOLD {
                    warn!(
                        "split R-hat {:.3} for {}: chains disagree, treat this fit with suspicion",
                        estimate.rhat, estimate.name
                    );
                }
            }
        }

        let observed = CountSummary::from_counts(&design.counts)?;
        let simulated = self.simulate_predictive(&design, &draws)?;
        let predictive = predictive_check(&observed, &simulated)?;

        let mean_deviance = (!config.prior_only).then(|| draws.mean_deviance());
        if let Some(deviance) = mean_deviance {
            info!("mean deviance {deviance:.1}");
        }

        Ok(FrequencyFit {
            formula_label: config.formula.label(),
            family: config.family,
            prior_only: config.prior_only,
            rows: design.rows(),
            dropped: design.dropped,
            estimates,
            observed,
            predictive,
            mean_deviance,
            draws,
            design: design.info(),
        })
    }

    /// Score an evaluation set under every retained draw: one row per
    /// (policy, draw) with the fitted mean claim count and a count
    /// simulated from the family at that mean. Rows come back grouped by
    /// draw; factor levels unseen in training score as the reference.
    pub fn policy_draws(
        &self,
        fit: &FrequencyFit,
        policies: &[Policy],
    ) -> Result<Vec<PolicyDraw>, ModelError> {
        let eval = fit.design.encode(policies)?;
        let config = &self.config;

        let selected: Vec<&Draw> = fit.draws.iter_draws().collect();
        let per_draw: Vec<Vec<PolicyDraw>> = selected
            .into_par_iter()
            .enumerate()
            .map(|(index, draw)| {
                let mut rng = ChaCha20Rng::seed_from_u64(
                    config
                        .sampler
                        .seed
                        .wrapping_add(POLICY_DRAW_SEED_OFFSET + index as u64),
                );
                let eta = eval.linear_predictor(&draw.beta);
                let simulated = config
                    .family
                    .simulate(&eta, draw.shape.unwrap_or(0.0), &mut rng);
                eval.policy_ids
                    .iter()
                    .zip(eta.iter().zip(simulated))
                    .map(|(&policy_id, (eta_i, sim))| PolicyDraw {
                        policy_id,
                        draw: index,
                        fitted_mean: eta_i.exp(),
                        simulated: sim,
                    })
                    .collect()
            })
            .collect();
        Ok(per_draw.into_iter().flatten().collect())
    }

    /// Push a spread of retained draws through the count simulator and
    /// summarize each simulated portfolio
    fn simulate_predictive(
        &self,
        design: &Design,
        draws: &DrawSet,
    ) -> Result<Vec<CountSummary>, ModelError> {
        let config = &self.config;
        let total = draws.total_draws();
        let wanted = config.predictive_draws.clamp(1, total);

        let selected: Vec<&Draw> = (0..wanted)
            .filter_map(|i| draws.draw(i * total / wanted))
            .collect();

        selected
            .into_par_iter()
            .enumerate()
            .map(|(index, draw)| {
                let mut rng = ChaCha20Rng::seed_from_u64(
                    config
                        .sampler
                        .seed
                        .wrapping_add(PREDICTIVE_SEED_OFFSET + index as u64),
                );
                let eta = design.linear_predictor(&draw.beta);
                let counts = config
                    .family
                    .simulate(&eta, draw.shape.unwrap_or(0.0), &mut rng);
                CountSummary::from_counts(&counts)
            })
            .collect()
    }
}

/// Draws taken straight from the priors, arranged like chain output.
/// Likelihoods are never evaluated, so the log-likelihood slot is NaN and
/// deviance is unavailable for these runs.
fn prior_runs(design: &Design, config: &FitConfig) -> Vec<ChainRun> {
    (0..config.sampler.chains)
        .into_par_iter()
        .map(|chain| {
            let mut rng =
                ChaCha20Rng::seed_from_u64(config.sampler.seed.wrapping_add(chain as u64));
            let draws = (0..config.sampler.draws)
                .map(|_| Draw {
                    beta: config.priors.sample_beta(design.coefficients(), &mut rng),
                    shape: config
                        .family
                        .uses_shape()
                        .then(|| config.priors.shape.sample(&mut rng)),
                    log_likelihood: f64::NAN,
                })
                .collect();
            ChainRun {
                chain,
                draws,
                acceptance: Vec::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::data::{Area, Region, VehBrand, VehGas};

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

    fn five_in_hundred() -> Vec<Policy> {
        (0..100)
            .map(|i| unit_policy(i, u32::from(i % 20 == 0)))
            .collect()
    }

    #[test]
    fn test_prior_only_fit_recovers_prior() {
        let config = FitConfig {
            prior_only: true,
            sampler: SamplerConfig {
                chains: 2,
                warmup: 0,
                draws: 2000,
                seed: 42,
            },
            predictive_draws: 50,
            ..FitConfig::default()
        };
        let fit = FrequencyEngine::new(config).fit(&five_in_hundred()).unwrap();

        assert!(fit.prior_only);
        assert!(fit.mean_deviance.is_none());
        assert_eq!(fit.predictive.len(), 8);

        let intercept = &fit.estimates[0];
        assert!((intercept.mean - -2.0).abs() < 0.1, "mean {}", intercept.mean);
        assert!((intercept.sd - 1.0).abs() < 0.1, "sd {}", intercept.sd);
    }

    #[test]
    fn test_posterior_fit_tracks_observed_rate() {
        let config = FitConfig {
            sampler: SamplerConfig {
                chains: 2,
                warmup: 300,
                draws: 300,
                seed: 7,
            },
            predictive_draws: 60,
            ..FitConfig::default()
        };
        let fit = FrequencyEngine::new(config).fit(&five_in_hundred()).unwrap();

        // observed rate 0.05, log rate about -3.0; prior pulls mildly to -2
        let intercept = &fit.estimates[0];
        assert!(
            intercept.mean > -3.6 && intercept.mean < -2.2,
            "intercept {}",
            intercept.mean
        );
        assert!(fit.mean_deviance.unwrap().is_finite());
        assert_eq!(fit.rows, 100);

        let mean_check = fit
            .predictive
            .iter()
            .find(|c| c.statistic == "mean")
            .unwrap();
        assert!(
            mean_check.lower <= mean_check.observed && mean_check.observed <= mean_check.upper,
            "observed mean {} outside [{}, {}]",
            mean_check.observed,
            mean_check.lower,
            mean_check.upper
        );
    }

    #[test]
    fn test_fit_report_serializes() {
        let config = FitConfig {
            prior_only: true,
            sampler: SamplerConfig {
                chains: 1,
                warmup: 0,
                draws: 100,
                seed: 3,
            },
            predictive_draws: 10,
            ..FitConfig::default()
        };
        let fit = FrequencyEngine::new(config).fit(&five_in_hundred()).unwrap();

        let json = serde_json::to_string(&fit.report()).unwrap();
        assert!(json.contains("\"family\":\"poisson\""));
        assert!(json.contains("\"prior_only\":true"));
        assert!(json.contains("\"mean_deviance\":null"));
    }

    #[test]
    fn test_policy_draws_cover_every_policy_and_draw() {
        let config = FitConfig {
            sampler: SamplerConfig {
                chains: 2,
                warmup: 100,
                draws: 50,
                seed: 11,
            },
            predictive_draws: 10,
            ..FitConfig::default()
        };
        let engine = FrequencyEngine::new(config);
        let portfolio = five_in_hundred();
        let fit = engine.fit(&portfolio).unwrap();

        let rows = engine.policy_draws(&fit, &portfolio).unwrap();
        assert_eq!(rows.len(), 100 * fit.draws.total_draws());
        assert!(rows.iter().all(|r| r.fitted_mean > 0.0));

        // intercept-only model on unit exposures: one fitted mean per draw
        let first_draw: Vec<&PolicyDraw> = rows.iter().filter(|r| r.draw == 0).collect();
        assert_eq!(first_draw.len(), 100);
        assert!(first_draw
            .iter()
            .all(|r| r.fitted_mean == first_draw[0].fitted_mean));

        let again = engine.policy_draws(&fit, &portfolio).unwrap();
        assert_eq!(rows, again);
    }

    #[test]
    fn test_policy_draw_summaries() {
        let config = FitConfig {
            sampler: SamplerConfig {
                chains: 1,
                warmup: 100,
                draws: 100,
                seed: 13,
            },
            predictive_draws: 10,
            ..FitConfig::default()
        };
        let engine = FrequencyEngine::new(config);
        let portfolio = five_in_hundred();
        let fit = engine.fit(&portfolio).unwrap();
        let rows = engine.policy_draws(&fit, &portfolio).unwrap();

        let means: Vec<f64> = rows.iter().map(|r| r.fitted_mean).collect();
        let summary = crate::model::summary::ValueSummary::from_values(&means).unwrap();
        assert!(summary.p10 <= summary.p90);
        // fitted rates should sit near the observed 0.05, not orders away
        assert!(summary.mean > 0.01 && summary.mean < 0.25, "mean {}", summary.mean);

        let counts: Vec<u32> = rows.iter().map(|r| r.simulated).collect();
        let simulated = CountSummary::from_counts(&counts).unwrap();
        assert!(simulated.zero_proportion > 0.8);
    }

    #[test]
    fn test_empty_portfolio_rejected() {
        let err = FrequencyEngine::new(FitConfig::default())
            .fit(&[])
            .unwrap_err();
        assert!(matches!(err, ModelError::EmptyDesign));
    }
}
