//! Prior distributions for frequency model parameters

use rand::Rng;
use rand_distr::{Exp1, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::model::ModelError;

/// Normal prior on a regression coefficient
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalPrior {
    pub loc: f64,
    pub scale: f64,
}

impl NormalPrior {
    pub fn new(loc: f64, scale: f64) -> Result<Self, ModelError> {
        if !loc.is_finite() || !scale.is_finite() || scale <= 0.0 {
            return Err(ModelError::InvalidPrior {
                message: format!("normal prior needs finite loc and positive scale, got ({loc}, {scale})"),
            });
        }
        Ok(Self { loc, scale })
    }

    pub fn log_density(&self, value: f64) -> f64 {
        let z = (value - self.loc) / self.scale;
        -0.5 * z * z - self.scale.ln() - 0.5 * (2.0 * std::f64::consts::PI).ln()
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        let z: f64 = rng.sample(StandardNormal);
        self.loc + self.scale * z
    }
}

/// Exponential prior on the negative binomial dispersion parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapePrior {
    pub rate: f64,
}

impl ShapePrior {
    pub fn new(rate: f64) -> Result<Self, ModelError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ModelError::InvalidPrior {
                message: format!("shape prior needs a positive rate, got {rate}"),
            });
        }
        Ok(Self { rate })
    }

    pub fn log_density(&self, shape: f64) -> f64 {
        if shape <= 0.0 {
            return f64::NEG_INFINITY;
        }
        self.rate.ln() - self.rate * shape
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        let unit: f64 = rng.sample(Exp1);
        unit / self.rate
    }
}

/// Priors for every parameter of a frequency model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorConfig {
    /// Prior on the intercept. The default centers portfolio frequency
    /// near exp(-2), about one claim per ten policy-years.
    pub intercept: NormalPrior,

    /// Prior shared by all non-intercept coefficients
    pub coefficient: NormalPrior,

    /// Prior on the negative binomial shape
    pub shape: ShapePrior,
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            intercept: NormalPrior {
                loc: -2.0,
                scale: 1.0,
            },
            coefficient: NormalPrior {
                loc: 0.0,
                scale: 0.5,
            },
            shape: ShapePrior { rate: 1.0 },
        }
    }
}

impl PriorConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        NormalPrior::new(self.intercept.loc, self.intercept.scale)?;
        NormalPrior::new(self.coefficient.loc, self.coefficient.scale)?;
        ShapePrior::new(self.shape.rate)?;
        Ok(())
    }

    /// Prior for the coefficient at a design column position
    pub fn beta_prior(&self, position: usize) -> NormalPrior {
        if position == 0 {
            self.intercept
        } else {
            self.coefficient
        }
    }

    /// Draw a coefficient vector from the priors
    pub fn sample_beta<R: Rng>(&self, coefficients: usize, rng: &mut R) -> Vec<f64> {
        (0..coefficients)
            .map(|position| self.beta_prior(position).sample(rng))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_normal_log_density() {
        let standard = NormalPrior::new(0.0, 1.0).unwrap();
        assert_relative_eq!(
            standard.log_density(0.0),
            -0.5 * (2.0 * std::f64::consts::PI).ln()
        );

        let shifted = NormalPrior::new(1.0, 2.0).unwrap();
        // density falls moving away from the loc
        assert!(shifted.log_density(1.0) > shifted.log_density(4.0));
    }

    #[test]
    fn test_shape_log_density() {
        let prior = ShapePrior::new(2.0).unwrap();
        assert_relative_eq!(prior.log_density(1.0), 2.0f64.ln() - 2.0);
        assert_eq!(prior.log_density(0.0), f64::NEG_INFINITY);
        assert_eq!(prior.log_density(-1.0), f64::NEG_INFINITY);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(NormalPrior::new(0.0, 0.0).is_err());
        assert!(NormalPrior::new(0.0, -1.0).is_err());
        assert!(NormalPrior::new(f64::NAN, 1.0).is_err());
        assert!(ShapePrior::new(0.0).is_err());
    }

    #[test]
    fn test_normal_sampling_statistics() {
        let prior = NormalPrior::new(-2.0, 0.5).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(42);

        let draws: Vec<f64> = (0..20_000).map(|_| prior.sample(&mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        let variance =
            draws.iter().map(|d| (d - mean) * (d - mean)).sum::<f64>() / draws.len() as f64;

        assert!((mean - -2.0).abs() < 0.02, "mean {mean}");
        assert!((variance.sqrt() - 0.5).abs() < 0.02, "std {}", variance.sqrt());
    }

    #[test]
    fn test_shape_sampling_statistics() {
        let prior = ShapePrior::new(2.0).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(7);

        let draws: Vec<f64> = (0..20_000).map(|_| prior.sample(&mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;

        assert!(draws.iter().all(|d| *d > 0.0));
        assert!((mean - 0.5).abs() < 0.02, "mean {mean}");
    }

    #[test]
    fn test_beta_prior_positions() {
        let priors = PriorConfig::default();
        assert_eq!(priors.beta_prior(0), priors.intercept);
        assert_eq!(priors.beta_prior(1), priors.coefficient);
        assert_eq!(priors.beta_prior(7), priors.coefficient);
    }
}
