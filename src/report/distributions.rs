//! Distribution summaries for the exploratory report

use serde::Serialize;

use crate::dataset::data::{Dimension, Policy};
use crate::rates::{claim_rates, portfolio_rate};

/// Equal-width histogram of a numeric column
#[derive(Debug, Clone, Serialize)]
pub struct Histogram {
    /// Bin edges, one more than the bin count
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

/// Histogram of `values` over `bins` equal-width bins spanning the data.
/// Returns `None` for an empty sample or a zero bin request.
pub fn numeric_histogram(values: &[f64], bins: usize) -> Option<Histogram> {
    if values.is_empty() || bins == 0 {
        return None;
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = if max > min { max - min } else { 1.0 };
    let width = span / bins as f64;

    let mut counts = vec![0usize; bins];
    for value in values {
        let bin = (((value - min) / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }

    let edges = (0..=bins).map(|i| min + width * i as f64).collect();
    Some(Histogram { edges, counts })
}

/// Record count for one level of a dimension
#[derive(Debug, Clone, Serialize)]
pub struct LevelCount {
    pub level: &'static str,
    pub policies: usize,

    /// Fraction of all records
    pub share: f64,
}

/// Record counts per level, largest first; equal counts sort by label
pub fn level_counts(policies: &[Policy], dimension: Dimension) -> Vec<LevelCount> {
    let total = policies.len();
    let mut counts: Vec<LevelCount> = claim_rates(policies, dimension)
        .into_iter()
        .map(|rate| LevelCount {
            level: rate.level,
            policies: rate.policies,
            share: rate.policies as f64 / total as f64,
        })
        .collect();
    counts.sort_by(|a, b| b.policies.cmp(&a.policies).then(a.level.cmp(b.level)));
    counts
}

/// Claim rate of one level next to the portfolio baseline
#[derive(Debug, Clone, Serialize)]
pub struct RateComparison {
    pub level: &'static str,
    pub policies: usize,
    pub claim_count: u64,
    pub exposure: f64,
    pub claim_rate: f64,

    /// Level rate divided by the portfolio rate
    pub relative: f64,
}

/// Per-level claim rates with their loading against the portfolio rate,
/// in the dimension's canonical level order
pub fn rate_comparison(policies: &[Policy], dimension: Dimension) -> Vec<RateComparison> {
    let baseline = portfolio_rate(policies).claim_rate;
    claim_rates(policies, dimension)
        .into_iter()
        .map(|rate| RateComparison {
            level: rate.level,
            policies: rate.policies,
            claim_count: rate.claim_count,
            exposure: rate.exposure,
            claim_rate: rate.claim_rate,
            relative: rate.claim_rate / baseline,
        })
        .collect()
}

/// Claim rate in one cell of a two-way faceting
#[derive(Debug, Clone, Serialize)]
pub struct FacetRate {
    pub row_level: &'static str,
    pub col_level: &'static str,
    pub policies: usize,
    pub claim_count: u64,
    pub exposure: f64,
    pub claim_rate: f64,
}

/// Claim rates crossed over two dimensions, cells in canonical row-major
/// order; empty cells are omitted
pub fn faceted_rates(
    policies: &[Policy],
    row_dimension: Dimension,
    col_dimension: Dimension,
) -> Vec<FacetRate> {
    let mut cells = Vec::new();
    for row_level in row_dimension.levels() {
        let members: Vec<Policy> = policies
            .iter()
            .filter(|p| row_dimension.level_of(p) == row_level)
            .cloned()
            .collect();
        for rate in claim_rates(&members, col_dimension) {
            cells.push(FacetRate {
                row_level,
                col_level: rate.level,
                policies: rate.policies,
                claim_count: rate.claim_count,
                exposure: rate.exposure,
                claim_rate: rate.claim_rate,
            });
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::data::{Area, Region, VehBrand, VehGas};
    use approx::assert_relative_eq;

    fn policy_with(policy_id: u64, area: Area, gas: VehGas, claim_count: u32) -> Policy {
        Policy {
            policy_id,
            exposure: 1.0,
            area,
            veh_power: 6,
            veh_age: 3,
            driv_age: 40,
            bonus_malus: 50,
            veh_brand: VehBrand::B2,
            veh_gas: gas,
            density: Some(500.0),
            region: Region::R24,
            reported_claim_count: claim_count,
            claim_count,
            claim_total: 0.0,
            patched: false,
            claims: Vec::new(),
        }
    }

    #[test]
    fn test_histogram_bins_span_data() {
        let values = [0.0, 0.25, 0.5, 0.75, 1.0];
        let hist = numeric_histogram(&values, 4).unwrap();

        assert_eq!(hist.edges.len(), 5);
        assert_relative_eq!(hist.edges[0], 0.0);
        assert_relative_eq!(hist.edges[4], 1.0);
        // max lands in the last bin
        assert_eq!(hist.counts, vec![1, 1, 1, 2]);
        assert_eq!(hist.counts.iter().sum::<usize>(), values.len());
    }

    #[test]
    fn test_histogram_degenerate_sample() {
        let hist = numeric_histogram(&[2.0, 2.0, 2.0], 5).unwrap();
        assert_eq!(hist.counts.iter().sum::<usize>(), 3);
        assert_eq!(hist.counts[0], 3);
    }

    #[test]
    fn test_histogram_empty_is_none() {
        assert!(numeric_histogram(&[], 4).is_none());
        assert!(numeric_histogram(&[1.0], 0).is_none());
    }

    #[test]
    fn test_level_counts_sorted_desc() {
        let policies = vec![
            policy_with(1, Area::A, VehGas::Regular, 0),
            policy_with(2, Area::B, VehGas::Regular, 0),
            policy_with(3, Area::B, VehGas::Regular, 0),
            policy_with(4, Area::B, VehGas::Diesel, 1),
        ];
        let counts = level_counts(&policies, Dimension::Area);

        assert_eq!(counts[0].level, "B");
        assert_eq!(counts[0].policies, 3);
        assert_relative_eq!(counts[0].share, 0.75);
        assert_eq!(counts[1].level, "A");
    }

    #[test]
    fn test_level_count_ties_break_on_label() {
        let mut a = policy_with(1, Area::A, VehGas::Regular, 0);
        a.veh_brand = VehBrand::B2;
        let mut b = policy_with(2, Area::A, VehGas::Regular, 0);
        b.veh_brand = VehBrand::B10;

        let counts = level_counts(&[a, b], Dimension::VehBrand);
        // equal counts fall back to label order: "B10" < "B2"
        assert_eq!(counts[0].level, "B10");
        assert_eq!(counts[1].level, "B2");
    }

    #[test]
    fn test_rate_comparison_relative_to_portfolio() {
        let policies = vec![
            policy_with(1, Area::A, VehGas::Regular, 0),
            policy_with(2, Area::A, VehGas::Regular, 0),
            policy_with(3, Area::F, VehGas::Regular, 1),
        ];
        // portfolio rate 1/3
        let comparisons = rate_comparison(&policies, Dimension::Area);

        assert_eq!(comparisons[0].level, "A");
        assert_relative_eq!(comparisons[0].relative, 0.0);
        assert_eq!(comparisons[1].level, "F");
        assert_relative_eq!(comparisons[1].claim_rate, 1.0);
        assert_relative_eq!(comparisons[1].relative, 3.0);
    }

    #[test]
    fn test_faceted_rates_cover_observed_cells() {
        let policies = vec![
            policy_with(1, Area::A, VehGas::Regular, 1),
            policy_with(2, Area::A, VehGas::Diesel, 0),
            policy_with(3, Area::B, VehGas::Diesel, 2),
        ];
        let cells = faceted_rates(&policies, Dimension::Area, Dimension::VehGas);

        assert_eq!(cells.len(), 3);
        assert_eq!(cells[0].row_level, "A");
        assert_eq!(cells[0].col_level, "Regular");
        assert_relative_eq!(cells[0].claim_rate, 1.0);

        assert_eq!(cells[2].row_level, "B");
        assert_eq!(cells[2].col_level, "Diesel");
        assert_relative_eq!(cells[2].claim_rate, 2.0);

        let total: u64 = cells.iter().map(|c| c.claim_count).sum();
        assert_eq!(total, 3);
    }
}
