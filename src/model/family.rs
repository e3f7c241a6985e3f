//! Observation families for claim counts

use rand::Rng;
use rand_distr::{Distribution, Gamma, Poisson};
use serde::{Deserialize, Serialize};

/// Cap on the log mean magnitude when simulating counts. Likelihood
/// evaluation is never capped; this only keeps pathological prior draws
/// from overflowing or underflowing the count distributions.
const MAX_LOG_MEAN: f64 = 20.0;

const LANCZOS_G: f64 = 7.0;
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_93,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_13,
    -176.615_029_162_140_59,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_571_6e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural log of the gamma function, Lanczos approximation
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let t = x + LANCZOS_G + 0.5;
        let mut series = LANCZOS[0];
        for (index, coefficient) in LANCZOS.iter().enumerate().skip(1) {
            series += coefficient / (x + index as f64);
        }
        0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
    }
}

/// Count distribution placed on claim counts given the fitted mean
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Family {
    /// Equidispersed counts, variance equal to the mean
    Poisson,

    /// Gamma-mixed Poisson counts with variance `mu + mu^2 / shape`
    NegativeBinomial,
}

impl Family {
    pub fn name(&self) -> &'static str {
        match self {
            Family::Poisson => "poisson",
            Family::NegativeBinomial => "negative_binomial",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "poisson" => Some(Family::Poisson),
            "negative_binomial" | "nb" => Some(Family::NegativeBinomial),
            _ => None,
        }
    }

    /// Whether the family carries a dispersion parameter
    pub fn uses_shape(&self) -> bool {
        matches!(self, Family::NegativeBinomial)
    }

    /// Joint log-likelihood of observed counts given the linear predictor
    /// (log mean including the exposure offset). `shape` is ignored for
    /// the Poisson family.
    pub fn log_likelihood(&self, counts: &[u32], eta: &[f64], shape: f64) -> f64 {
        match self {
            Family::Poisson => counts
                .iter()
                .zip(eta)
                .map(|(&y, &h)| {
                    let y = y as f64;
                    y * h - h.exp() - ln_gamma(y + 1.0)
                })
                .sum(),
            Family::NegativeBinomial => {
                let ln_gamma_shape = ln_gamma(shape);
                counts
                    .iter()
                    .zip(eta)
                    .map(|(&y, &h)| {
                        let y = y as f64;
                        let mu = h.exp();
                        ln_gamma(y + shape) - ln_gamma_shape - ln_gamma(y + 1.0)
                            + shape * (shape / (shape + mu)).ln()
                            + y * (mu / (shape + mu)).ln()
                    })
                    .sum()
            }
        }
    }

    /// Simulate one claim-count vector from the family at the given linear
    /// predictor
    pub fn simulate<R: Rng>(&self, eta: &[f64], shape: f64, rng: &mut R) -> Vec<u32> {
        match self {
            Family::Poisson => eta
                .iter()
                .map(|h| {
                    let mu = h.clamp(-MAX_LOG_MEAN, MAX_LOG_MEAN).exp();
                    Poisson::new(mu).expect("positive mean").sample(rng) as u32
                })
                .collect(),
            Family::NegativeBinomial => {
                // extreme draws would otherwise break the gamma construction
                let shape = shape.clamp(1e-6, 1e6);
                eta.iter()
                    .map(|h| {
                        let mu = h.clamp(-MAX_LOG_MEAN, MAX_LOG_MEAN).exp();
                        let mixing = Gamma::new(shape, mu / shape)
                            .expect("positive gamma parameters")
                            .sample(rng);
                        if mixing > 0.0 {
                            Poisson::new(mixing).expect("positive mean").sample(rng) as u32
                        } else {
                            0
                        }
                    })
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_ln_gamma_known_values() {
        assert_relative_eq!(ln_gamma(1.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(ln_gamma(2.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(ln_gamma(5.0), 24.0f64.ln(), epsilon = 1e-10);
        assert_relative_eq!(
            ln_gamma(0.5),
            std::f64::consts::PI.sqrt().ln(),
            epsilon = 1e-10
        );
        assert_relative_eq!(ln_gamma(10.5), 1_133_278.388_948_441_2f64.ln(), epsilon = 1e-8);
    }

    #[test]
    fn test_poisson_log_likelihood() {
        let eta = [1.5f64.ln()];
        let expected = 2.0 * 1.5f64.ln() - 1.5 - 2.0f64.ln();
        assert_relative_eq!(
            Family::Poisson.log_likelihood(&[2], &eta, 0.0),
            expected,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_negative_binomial_log_likelihood() {
        // shape 1 is geometric: P(1) with mu 2 is (1/3)(2/3)
        let eta = [2.0f64.ln()];
        let expected = (2.0f64 / 9.0).ln();
        assert_relative_eq!(
            Family::NegativeBinomial.log_likelihood(&[1], &eta, 1.0),
            expected,
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_negative_binomial_approaches_poisson() {
        let counts = [0, 1, 2, 0, 3];
        let eta = [-1.2, -0.4, 0.3, -2.0, 0.8];
        let poisson = Family::Poisson.log_likelihood(&counts, &eta, 0.0);
        let nearly_poisson = Family::NegativeBinomial.log_likelihood(&counts, &eta, 1e7);
        assert_relative_eq!(poisson, nearly_poisson, epsilon = 1e-4);
    }

    #[test]
    fn test_simulated_poisson_mean() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let eta = vec![0.8f64.ln(); 20_000];
        let counts = Family::Poisson.simulate(&eta, 0.0, &mut rng);

        let mean = counts.iter().map(|c| *c as f64).sum::<f64>() / counts.len() as f64;
        assert!((mean - 0.8).abs() < 0.05, "mean {mean}");
    }

    #[test]
    fn test_simulated_negative_binomial_overdispersed() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let eta = vec![0.0; 20_000];
        let counts = Family::NegativeBinomial.simulate(&eta, 0.5, &mut rng);

        let n = counts.len() as f64;
        let mean = counts.iter().map(|c| *c as f64).sum::<f64>() / n;
        let variance = counts
            .iter()
            .map(|c| (*c as f64 - mean) * (*c as f64 - mean))
            .sum::<f64>()
            / n;

        // mu 1, shape 0.5 gives variance mu + mu^2 / shape = 3
        assert!((mean - 1.0).abs() < 0.1, "mean {mean}");
        assert!(variance > 2.0 && variance < 4.0, "variance {variance}");
    }

    #[test]
    fn test_family_names() {
        assert_eq!(Family::from_name("poisson"), Some(Family::Poisson));
        assert_eq!(Family::from_name("nb"), Some(Family::NegativeBinomial));
        assert_eq!(
            Family::from_name(Family::NegativeBinomial.name()),
            Some(Family::NegativeBinomial)
        );
        assert_eq!(Family::from_name("gaussian"), None);
        assert!(!Family::Poisson.uses_shape());
    }
}
