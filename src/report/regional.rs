//! Regional claim experience tables

use serde::Serialize;

use crate::dataset::data::{Dimension, Policy, Region};
use crate::rates::claim_rates;

/// Claim experience of one administrative region. The code column is the
/// join key for region boundary geometry; the name is for reading.
#[derive(Debug, Clone, Serialize)]
pub struct RegionalRate {
    pub code: &'static str,
    pub name: &'static str,
    pub policies: usize,
    pub claim_count: u64,
    pub exposure: f64,

    /// Claims per policy-year; non-finite for a region with no exposure
    pub claim_rate: f64,
}

/// Claim rates for every region, in code order. Regions absent from the
/// portfolio still get a row so the table always joins one-to-one onto a
/// full region geometry.
pub fn claim_rate_table(policies: &[Policy]) -> Vec<RegionalRate> {
    let rates = claim_rates(policies, Dimension::Region);

    Region::ALL
        .iter()
        .map(|region| {
            match rates.iter().find(|r| r.level == region.as_str()) {
                Some(rate) => RegionalRate {
                    code: region.as_str(),
                    name: region.name(),
                    policies: rate.policies,
                    claim_count: rate.claim_count,
                    exposure: rate.exposure,
                    claim_rate: rate.claim_rate,
                },
                None => RegionalRate {
                    code: region.as_str(),
                    name: region.name(),
                    policies: 0,
                    claim_count: 0,
                    exposure: 0.0,
                    claim_rate: f64::NAN,
                },
            }
        })
        .collect()
}
