//! Summary statistics for claim-count vectors and predictive checks

use serde::Serialize;

use crate::model::ModelError;

/// Linear-interpolation quantile of an ascending-sorted sample, with
/// `h = p (n - 1)`. Returns NaN for an empty sample.
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let h = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    let fraction = h - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * fraction
}

/// Distribution summary of one claim-count vector, either observed or
/// simulated from a posterior draw
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountSummary {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub mean: f64,
    pub max: u32,
    pub zero_proportion: f64,
}

impl CountSummary {
    pub fn from_counts(counts: &[u32]) -> Result<Self, ModelError> {
        if counts.is_empty() {
            return Err(ModelError::EmptySample);
        }
        let mut sorted: Vec<f64> = counts.iter().map(|c| *c as f64).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let n = counts.len() as f64;
        Ok(Self {
            p10: quantile(&sorted, 0.10),
            p25: quantile(&sorted, 0.25),
            p50: quantile(&sorted, 0.50),
            p75: quantile(&sorted, 0.75),
            p90: quantile(&sorted, 0.90),
            mean: counts.iter().map(|c| *c as f64).sum::<f64>() / n,
            max: counts.iter().max().copied().unwrap_or(0),
            zero_proportion: counts.iter().filter(|c| **c == 0).count() as f64 / n,
        })
    }

    fn statistic(&self, name: &str) -> f64 {
        match name {
            "p10" => self.p10,
            "p25" => self.p25,
            "p50" => self.p50,
            "p75" => self.p75,
            "p90" => self.p90,
            "mean" => self.mean,
            "max" => self.max as f64,
            "zero_proportion" => self.zero_proportion,
            _ => f64::NAN,
        }
    }
}

/// Distribution summary of a continuous draw-level quantity, typically the
/// fitted mean rates of the policy draws
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueSummary {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub mean: f64,
    pub max: f64,
}

impl ValueSummary {
    pub fn from_values(values: &[f64]) -> Result<Self, ModelError> {
        if values.is_empty() {
            return Err(ModelError::EmptySample);
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Ok(Self {
            p10: quantile(&sorted, 0.10),
            p25: quantile(&sorted, 0.25),
            p50: quantile(&sorted, 0.50),
            p75: quantile(&sorted, 0.75),
            p90: quantile(&sorted, 0.90),
            mean: values.iter().sum::<f64>() / values.len() as f64,
            max: sorted[sorted.len() - 1],
        })
    }
}

/// How one summary statistic is distributed across simulated draws,
/// next to its observed value
#[derive(Debug, Clone, Serialize)]
pub struct PredictiveDistribution {
    pub statistic: &'static str,

    /// Statistic computed on the observed counts
    pub observed: f64,

    /// 2.5th percentile across draws
    pub lower: f64,

    /// Median across draws
    pub median: f64,

    /// 97.5th percentile across draws
    pub upper: f64,

    /// Fraction of draws at or above the observed value
    pub tail_prob: f64,
}

const CHECKED_STATISTICS: [&str; 8] = [
    "p10",
    "p25",
    "p50",
    "p75",
    "p90",
    "mean",
    "max",
    "zero_proportion",
];

/// Compare observed count statistics against their distribution under the
/// model. A statistic whose observed value sits far in either tail of the
/// simulated distribution flags a feature of the data the model misses.
pub fn predictive_check(
    observed: &CountSummary,
    simulated: &[CountSummary],
) -> Result<Vec<PredictiveDistribution>, ModelError> {
    if simulated.is_empty() {
        return Err(ModelError::EmptyDrawSet);
    }

    let mut checks = Vec::with_capacity(CHECKED_STATISTICS.len());
    for statistic in CHECKED_STATISTICS {
        let observed_value = observed.statistic(statistic);
        let mut values: Vec<f64> = simulated.iter().map(|s| s.statistic(statistic)).collect();
        let tail_prob =
            values.iter().filter(|v| **v >= observed_value).count() as f64 / values.len() as f64;
        values.sort_by(|a, b| a.total_cmp(b));

        checks.push(PredictiveDistribution {
            statistic,
            observed: observed_value,
            lower: quantile(&values, 0.025),
            median: quantile(&values, 0.5),
            upper: quantile(&values, 0.975),
            tail_prob,
        });
    }
    Ok(checks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(quantile(&sorted, 0.0), 1.0);
        assert_relative_eq!(quantile(&sorted, 0.5), 2.5);
        assert_relative_eq!(quantile(&sorted, 1.0), 4.0);
        assert_relative_eq!(quantile(&sorted, 0.25), 1.75);
    }

    #[test]
    fn test_quantile_single_element() {
        assert_relative_eq!(quantile(&[7.5], 0.9), 7.5);
    }

    #[test]
    fn test_quantile_empty_is_nan() {
        assert!(quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_count_summary() {
        let counts = [0, 0, 0, 0, 0, 0, 1, 1, 2, 4];
        let summary = CountSummary::from_counts(&counts).unwrap();
        assert_relative_eq!(summary.mean, 0.8);
        assert_eq!(summary.max, 4);
        assert_relative_eq!(summary.zero_proportion, 0.6);
        assert_relative_eq!(summary.p50, 0.0);
        // h = 0.9 * 9 = 8.1, between sorted[8] = 2 and sorted[9] = 4
        assert_relative_eq!(summary.p90, 2.2, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_samples_rejected() {
        assert!(matches!(
            CountSummary::from_counts(&[]),
            Err(ModelError::EmptySample)
        ));
        assert!(matches!(
            ValueSummary::from_values(&[]),
            Err(ModelError::EmptySample)
        ));
    }

    #[test]
    fn test_value_summary() {
        let values = [0.4, 0.1, 0.2, 0.3];
        let summary = ValueSummary::from_values(&values).unwrap();
        assert_relative_eq!(summary.mean, 0.25);
        assert_relative_eq!(summary.max, 0.4);
        assert_relative_eq!(summary.p50, 0.25);
        assert_relative_eq!(summary.p10, 0.13);
    }

    #[test]
    fn test_predictive_check_centers_on_identical_draws() {
        let observed = CountSummary::from_counts(&[0, 0, 1, 2]).unwrap();
        let simulated = vec![observed.clone(); 50];

        let checks = predictive_check(&observed, &simulated).unwrap();
        assert_eq!(checks.len(), 8);
        for check in &checks {
            assert_relative_eq!(check.median, check.observed);
            assert_relative_eq!(check.tail_prob, 1.0);
        }
    }

    #[test]
    fn test_predictive_check_requires_draws() {
        let observed = CountSummary::from_counts(&[0, 1]).unwrap();
        assert!(matches!(
            predictive_check(&observed, &[]),
            Err(ModelError::EmptyDrawSet)
        ));
    }

    proptest! {
        #[test]
        fn percentiles_are_monotone(counts in prop::collection::vec(0u32..6, 1..200)) {
            let summary = CountSummary::from_counts(&counts).unwrap();
            prop_assert!(summary.p10 <= summary.p25);
            prop_assert!(summary.p25 <= summary.p50);
            prop_assert!(summary.p50 <= summary.p75);
            prop_assert!(summary.p75 <= summary.p90);
            prop_assert!(summary.p90 <= summary.max as f64);
            prop_assert!((0.0..=1.0).contains(&summary.zero_proportion));
        }
    }
}
