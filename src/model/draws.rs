//! Retained draw sets, convergence diagnostics, and parameter estimates

use serde::Serialize;

use crate::model::sampler::{ChainRun, Draw};
use crate::model::summary::quantile;
use crate::model::ModelError;

/// Posterior (or prior) draws of all chains for one fitted model
#[derive(Debug, Clone)]
pub struct DrawSet {
    /// Parameter names: design coefficients, then `shape` for dispersion
    /// families
    pub names: Vec<String>,
    runs: Vec<ChainRun>,
}

/// One evaluation policy under one retained draw: the fitted mean claim
/// count and a count simulated from it. Produced in memory for predictive
/// checking, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyDraw {
    pub policy_id: u64,

    /// Flat draw index across chains
    pub draw: usize,

    /// Expected claim count at this draw, exposure included
    pub fitted_mean: f64,

    /// One count simulated from the family at the fitted mean
    pub simulated: u32,
}

/// Location, spread, interval, and convergence diagnostic for one parameter
#[derive(Debug, Clone, Serialize)]
pub struct ParameterEstimate {
    pub name: String,
    pub mean: f64,
    pub sd: f64,

    /// 2.5th percentile of the draws
    pub lower: f64,

    pub median: f64,

    /// 97.5th percentile of the draws
    pub upper: f64,

    /// Split R-hat; NaN when chains are too short to split
    pub rhat: f64,
}

impl DrawSet {
    pub fn new(coefficient_names: Vec<String>, runs: Vec<ChainRun>) -> Result<Self, ModelError> {
        if runs.iter().all(|run| run.draws.is_empty()) {
            return Err(ModelError::EmptyDrawSet);
        }
        let mut names = coefficient_names;
        let has_shape = runs
            .iter()
            .any(|run| run.draws.iter().any(|d| d.shape.is_some()));
        if has_shape {
            names.push("shape".to_string());
        }
        Ok(Self { names, runs })
    }

    pub fn parameters(&self) -> usize {
        self.names.len()
    }

    pub fn chains(&self) -> usize {
        self.runs.len()
    }

    pub fn total_draws(&self) -> usize {
        self.runs.iter().map(|run| run.draws.len()).sum()
    }

    pub fn iter_draws(&self) -> impl Iterator<Item = &Draw> {
        self.runs.iter().flat_map(|run| run.draws.iter())
    }

    /// Draw by flat index across chains
    pub fn draw(&self, mut index: usize) -> Option<&Draw> {
        for run in &self.runs {
            if index < run.draws.len() {
                return Some(&run.draws[index]);
            }
            index -= run.draws.len();
        }
        None
    }

    fn parameter_value(draw: &Draw, position: usize) -> f64 {
        if position < draw.beta.len() {
            draw.beta[position]
        } else {
            draw.shape.unwrap_or(f64::NAN)
        }
    }

    /// All retained values of one parameter, chains concatenated
    pub fn values(&self, position: usize) -> Vec<f64> {
        self.iter_draws()
            .map(|draw| Self::parameter_value(draw, position))
            .collect()
    }

    /// Mean deviance `-2 E[log p(y | theta)]` over the retained draws,
    /// for informal comparison between fits on the same data
    pub fn mean_deviance(&self) -> f64 {
        let total: f64 = self.iter_draws().map(|d| d.log_likelihood).sum();
        -2.0 * total / self.total_draws() as f64
    }

    /// Split R-hat for one parameter: each chain is halved and the
    /// half-chains compared, so a chain drifting between its own halves is
    /// flagged as much as disagreement across chains.
    fn split_rhat_for(&self, position: usize) -> f64 {
        let mut halves: Vec<Vec<f64>> = Vec::new();
        for run in &self.runs {
            let values: Vec<f64> = run
                .draws
                .iter()
                .map(|d| Self::parameter_value(d, position))
                .collect();
            let half = values.len() / 2;
            if half < 2 {
                return f64::NAN;
            }
            halves.push(values[..half].to_vec());
            halves.push(values[values.len() - half..].to_vec());
        }

        let m = halves.len() as f64;
        let n = halves[0].len() as f64;

        let means: Vec<f64> = halves
            .iter()
            .map(|h| h.iter().sum::<f64>() / n)
            .collect();
        let grand = means.iter().sum::<f64>() / m;

        let within: f64 = halves
            .iter()
            .zip(&means)
            .map(|(half, mean)| {
                half.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0)
            })
            .sum::<f64>()
            / m;
        let between: f64 =
            n * means.iter().map(|mu| (mu - grand) * (mu - grand)).sum::<f64>() / (m - 1.0);

        if within <= 0.0 {
            return if between <= 1e-12 { 1.0 } else { f64::INFINITY };
        }
        let var_plus = (n - 1.0) / n * within + between / n;
        (var_plus / within).sqrt()
    }

    pub fn split_rhat(&self) -> Vec<f64> {
        (0..self.parameters())
            .map(|position| self.split_rhat_for(position))
            .collect()
    }

    pub fn estimates(&self) -> Vec<ParameterEstimate> {
        (0..self.parameters())
            .map(|position| {
                let values = self.values(position);
                let n = values.len() as f64;
                let mean = values.iter().sum::<f64>() / n;
                let sd = if values.len() > 1 {
                    (values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0))
                        .sqrt()
                } else {
                    0.0
                };

                let mut sorted = values;
                sorted.sort_by(|a, b| a.total_cmp(b));

                ParameterEstimate {
                    name: self.names[position].clone(),
                    mean,
                    sd,
                    lower: quantile(&sorted, 0.025),
                    median: quantile(&sorted, 0.5),
                    upper: quantile(&sorted, 0.975),
                    rhat: self.split_rhat_for(position),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use rand_distr::StandardNormal;

    fn run_from_values(chain: usize, values: &[f64]) -> ChainRun {
        ChainRun {
            chain,
            draws: values
                .iter()
                .map(|v| Draw {
                    beta: vec![*v],
                    shape: None,
                    log_likelihood: -1.0,
                })
                .collect(),
            acceptance: vec![0.4],
        }
    }

    fn normal_values(seed: u64, n: usize, loc: f64) -> Vec<f64> {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        (0..n)
            .map(|_| loc + rng.sample::<f64, _>(StandardNormal))
            .collect()
    }

    #[test]
    fn test_empty_draw_set_rejected() {
        let runs = vec![ChainRun {
            chain: 0,
            draws: Vec::new(),
            acceptance: Vec::new(),
        }];
        assert!(matches!(
            DrawSet::new(vec!["intercept".to_string()], runs),
            Err(ModelError::EmptyDrawSet)
        ));
    }

    #[test]
    fn test_mixed_chains_have_rhat_near_one() {
        let runs = vec![
            run_from_values(0, &normal_values(1, 500, 0.0)),
            run_from_values(1, &normal_values(2, 500, 0.0)),
        ];
        let draws = DrawSet::new(vec!["intercept".to_string()], runs).unwrap();
        let rhat = draws.split_rhat()[0];
        assert!(rhat < 1.05, "rhat {rhat}");
        assert!(rhat > 0.9, "rhat {rhat}");
    }

    #[test]
    fn test_separated_chains_have_large_rhat() {
        let runs = vec![
            run_from_values(0, &normal_values(1, 500, 0.0)),
            run_from_values(1, &normal_values(2, 500, 5.0)),
        ];
        let draws = DrawSet::new(vec!["intercept".to_string()], runs).unwrap();
        assert!(draws.split_rhat()[0] > 1.5);
    }

    #[test]
    fn test_short_chains_give_nan_rhat() {
        let runs = vec![run_from_values(0, &[0.1, 0.2, 0.3])];
        let draws = DrawSet::new(vec!["intercept".to_string()], runs).unwrap();
        assert!(draws.split_rhat()[0].is_nan());
    }

    #[test]
    fn test_estimates_summarize_values() {
        let runs = vec![run_from_values(0, &[1.0, 2.0, 3.0, 4.0, 5.0])];
        let draws = DrawSet::new(vec!["intercept".to_string()], runs).unwrap();

        let estimates = draws.estimates();
        assert_eq!(estimates.len(), 1);
        assert_eq!(estimates[0].name, "intercept");
        assert_relative_eq!(estimates[0].mean, 3.0);
        assert_relative_eq!(estimates[0].median, 3.0);
        assert!(estimates[0].sd > 1.5 && estimates[0].sd < 1.6);
    }

    #[test]
    fn test_shape_parameter_appended() {
        let draws_with_shape = vec![
            Draw {
                beta: vec![-2.0],
                shape: Some(1.5),
                log_likelihood: -10.0,
            },
            Draw {
                beta: vec![-2.1],
                shape: Some(1.7),
                log_likelihood: -11.0,
            },
        ];
        let runs = vec![ChainRun {
            chain: 0,
            draws: draws_with_shape,
            acceptance: vec![0.4, 0.4],
        }];
        let draws = DrawSet::new(vec!["intercept".to_string()], runs).unwrap();

        assert_eq!(draws.names, vec!["intercept", "shape"]);
        assert_eq!(draws.values(1), vec![1.5, 1.7]);
    }

    #[test]
    fn test_mean_deviance() {
        let runs = vec![ChainRun {
            chain: 0,
            draws: vec![
                Draw {
                    beta: vec![0.0],
                    shape: None,
                    log_likelihood: -10.0,
                },
                Draw {
                    beta: vec![0.0],
                    shape: None,
                    log_likelihood: -12.0,
                },
            ],
            acceptance: vec![0.4],
        }];
        let draws = DrawSet::new(vec!["intercept".to_string()], runs).unwrap();
        assert_relative_eq!(draws.mean_deviance(), 22.0);
    }

    #[test]
    fn test_flat_draw_indexing() {
        let runs = vec![
            run_from_values(0, &[1.0, 2.0]),
            run_from_values(1, &[3.0]),
        ];
        let draws = DrawSet::new(vec!["intercept".to_string()], runs).unwrap();
        assert_eq!(draws.total_draws(), 3);
        assert_relative_eq!(draws.draw(2).unwrap().beta[0], 3.0);
        assert!(draws.draw(3).is_none());
    }
}
