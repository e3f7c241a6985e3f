//! Claim-rate aggregation across portfolio risk dimensions

use std::collections::{BTreeMap, HashMap};

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;

use crate::dataset::data::{Dimension, Policy};
use crate::model::summary::quantile;

/// Aggregated claim experience for one level of a risk dimension
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRate {
    /// Level label within the grouping dimension
    pub level: &'static str,

    /// Number of policy records in the group
    pub policies: usize,

    /// Total claim count over the group
    pub claim_count: u64,

    /// Total exposure in policy-years
    pub exposure: f64,

    /// Claims per policy-year. The division is taken as-is, so a group
    /// holding only zero-exposure records reports a non-finite rate rather
    /// than a masked zero.
    pub claim_rate: f64,
}

/// Claim rate over the whole portfolio
pub fn portfolio_rate(policies: &[Policy]) -> GroupRate {
    let claim_count: u64 = policies.iter().map(|p| p.claim_count as u64).sum();
    let exposure: f64 = policies.iter().map(|p| p.exposure).sum();
    GroupRate {
        level: "portfolio",
        policies: policies.len(),
        claim_count,
        exposure,
        claim_rate: claim_count as f64 / exposure,
    }
}

/// Claim rates per level of a risk dimension.
///
/// Levels appear in the dimension's canonical order; levels with no
/// policies are omitted.
pub fn claim_rates(policies: &[Policy], dimension: Dimension) -> Vec<GroupRate> {
    let mut groups: HashMap<&'static str, (usize, u64, f64)> = HashMap::new();
    for policy in policies {
        let entry = groups
            .entry(dimension.level_of(policy))
            .or_insert((0, 0, 0.0));
        entry.0 += 1;
        entry.1 += policy.claim_count as u64;
        entry.2 += policy.exposure;
    }

    let mut rates = Vec::new();
    for level in dimension.levels() {
        if let Some(&(policies, claim_count, exposure)) = groups.get(level) {
            rates.push(GroupRate {
                level,
                policies,
                claim_count,
                exposure,
                claim_rate: claim_count as f64 / exposure,
            });
        }
    }
    rates
}

/// Claim experience for one combination of levels across several grouping
/// dimensions
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedRate {
    /// One level per grouping dimension, in the dimension order given
    pub levels: Vec<&'static str>,

    pub policies: usize,
    pub claim_count: u64,
    pub exposure: f64,
    pub claim_rate: f64,
}

/// Claim rates grouped by zero or more dimensions.
///
/// An empty dimension list gives a single ungrouped row. Rows come back in
/// lexicographic level-tuple order; combinations with no policies are
/// omitted. As with the single-dimension table, a zero-exposure group
/// reports a non-finite rate.
pub fn grouped_rates(policies: &[Policy], dimensions: &[Dimension]) -> Vec<GroupedRate> {
    let mut groups: BTreeMap<Vec<&'static str>, (usize, u64, f64)> = BTreeMap::new();
    for policy in policies {
        let key: Vec<&'static str> = dimensions.iter().map(|d| d.level_of(policy)).collect();
        let entry = groups.entry(key).or_insert((0, 0, 0.0));
        entry.0 += 1;
        entry.1 += policy.claim_count as u64;
        entry.2 += policy.exposure;
    }

    groups
        .into_iter()
        .map(|(levels, (policies, claim_count, exposure))| GroupedRate {
            levels,
            policies,
            claim_count,
            exposure,
            claim_rate: claim_count as f64 / exposure,
        })
        .collect()
}

/// Bootstrap interval for one group's claim rate
#[derive(Debug, Clone)]
pub struct RateInterval {
    pub level: &'static str,

    /// Rate observed in the data
    pub observed: f64,

    /// 2.5th percentile of resampled rates
    pub lower: f64,

    /// Median of resampled rates
    pub median: f64,

    /// 97.5th percentile of resampled rates
    pub upper: f64,
}

/// Nonparametric bootstrap of group claim rates.
///
/// Policies are resampled with replacement within their group and the rate
/// recomputed as a ratio of resampled sums. Groups run in parallel; each
/// group derives its generator from the base seed and its position in the
/// level order, so results do not depend on scheduling. At least one
/// replicate is always drawn.
pub fn bootstrap_claim_rates(
    policies: &[Policy],
    dimension: Dimension,
    replicates: usize,
    seed: u64,
) -> Vec<RateInterval> {
    let replicates = replicates.max(1);

    let mut members: HashMap<&'static str, Vec<(u32, f64)>> = HashMap::new();
    for policy in policies {
        members
            .entry(dimension.level_of(policy))
            .or_default()
            .push((policy.claim_count, policy.exposure));
    }

    claim_rates(policies, dimension)
        .into_par_iter()
        .enumerate()
        .map(|(position, rate)| {
            let group = &members[rate.level];
            let mut rng = ChaCha20Rng::seed_from_u64(seed.wrapping_add(position as u64));

            let mut resampled = Vec::with_capacity(replicates);
            for _ in 0..replicates {
                let mut count = 0u64;
                let mut exposure = 0.0;
                for _ in 0..group.len() {
                    let (c, e) = group[rng.random_range(0..group.len())];
                    count += c as u64;
                    exposure += e;
                }
                resampled.push(count as f64 / exposure);
            }
            resampled.sort_by(|a, b| a.total_cmp(b));

            RateInterval {
                level: rate.level,
                observed: rate.claim_rate,
                lower: quantile(&resampled, 0.025),
                median: quantile(&resampled, 0.5),
                upper: quantile(&resampled, 0.975),
            }
        })
        .collect()
}
