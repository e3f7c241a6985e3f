//! Synthetic portfolio generator
//!
//! Produces raw-format policy and claim tables with the same shape and
//! quirks as the production extracts (skewed exposures, rare missing
//! densities, orphan claims), so the whole pipeline can be rehearsed
//! without the licensed source data.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Exp, Gamma, LogNormal, Normal, Poisson};

use crate::dataset::data::{Area, Claim, Policy, Region, VehBrand, VehGas};

/// Shape of the generated portfolio
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Number of policy records
    pub policies: usize,

    /// Baseline claim frequency per policy-year before risk loadings
    pub base_rate: f64,

    /// Claims written against policy ids absent from the policy table
    pub orphan_claims: usize,

    /// Fraction of records with the density field left empty
    pub missing_density: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            policies: 5000,
            base_rate: 0.10,
            orphan_claims: 2,
            missing_density: 0.002,
        }
    }
}

fn weighted_index(rng: &mut ChaCha20Rng, weights: &[f64]) -> usize {
    let total: f64 = weights.iter().sum();
    let mut draw = rng.random_range(0.0..total);
    for (position, weight) in weights.iter().enumerate() {
        if draw < *weight {
            return position;
        }
        draw -= weight;
    }
    weights.len() - 1
}

/// Claim frequency loading for a risk profile relative to the baseline
fn risk_loading(policy: &Policy) -> f64 {
    let mut loading = 1.0;
    if policy.driv_age < 26 {
        loading *= 1.9;
    } else if policy.driv_age < 31 {
        loading *= 1.3;
    }
    if policy.bonus_malus > 100 {
        loading *= 1.8;
    } else if policy.bonus_malus > 50 {
        loading *= 1.25;
    }
    if matches!(policy.area, Area::E | Area::F) {
        loading *= 1.2;
    }
    if policy.veh_gas == VehGas::Diesel {
        loading *= 1.05;
    }
    if policy.veh_age == 0 {
        loading *= 1.1;
    } else if policy.veh_age > 10 {
        loading *= 0.9;
    }
    loading
}

/// Generate a raw policy table and its claim severity table.
///
/// The same seed always produces the same portfolio. Reported claim counts
/// match the severity rows except for the configured orphan claims, whose
/// keys point past the end of the policy table.
pub fn generate(config: &SyntheticConfig, seed: u64) -> (Vec<Policy>, Vec<Claim>) {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);

    let driver_age = Normal::<f64>::new(45.0, 14.0).expect("valid normal parameters");
    let density = LogNormal::<f64>::new(5.0, 1.6).expect("valid lognormal parameters");
    let malus_excess = Exp::<f64>::new(0.03).expect("valid exponential rate");
    let severity = Gamma::<f64>::new(2.0, 600.0).expect("valid gamma parameters");

    let area_weights = [0.15, 0.18, 0.29, 0.22, 0.10, 0.06];
    let brand_weights = [0.30, 0.12, 0.06, 0.04, 0.08, 0.07, 0.04, 0.03, 0.20, 0.04, 0.02];
    let region_weights = [
        0.09, 0.02, 0.03, 0.03, 0.07, 0.03, 0.03, 0.06, 0.04, 0.03, 0.02, 0.07, 0.06, 0.04,
        0.07, 0.05, 0.02, 0.11, 0.03, 0.04, 0.05, 0.01,
    ];

    let mut policies = Vec::with_capacity(config.policies);
    let mut claims = Vec::new();

    for policy_id in 1..=config.policies as u64 {
        let driv_age = driver_age.sample(&mut rng).round().clamp(18.0, 90.0) as u32;
        let bonus_malus = if rng.random_range(0.0..1.0) < 0.6 {
            50
        } else {
            50 + (malus_excess.sample(&mut rng).round() as u32).min(180)
        };
        let density = if rng.random_range(0.0..1.0) < config.missing_density {
            None
        } else {
            Some(density.sample(&mut rng).round().max(1.0))
        };

        let mut policy = Policy {
            policy_id,
            exposure: rng.random_range(0.05..=1.0),
            area: Area::ALL[weighted_index(&mut rng, &area_weights)],
            veh_power: rng.random_range(4..=12),
            veh_age: rng.random_range(0..=20),
            driv_age,
            bonus_malus,
            veh_brand: VehBrand::ALL[weighted_index(&mut rng, &brand_weights)],
            veh_gas: if rng.random_range(0.0..1.0) < 0.55 {
                VehGas::Regular
            } else {
                VehGas::Diesel
            },
            density,
            region: Region::ALL[weighted_index(&mut rng, &region_weights)],
            reported_claim_count: 0,
            claim_count: 0,
            claim_total: 0.0,
            patched: false,
            claims: Vec::new(),
        };

        let lambda = (config.base_rate * risk_loading(&policy) * policy.exposure).max(1e-12);
        let count = Poisson::new(lambda).expect("positive rate").sample(&mut rng) as u32;
        policy.reported_claim_count = count;
        for _ in 0..count {
            let amount = (severity.sample(&mut rng).max(1.0) * 100.0).round() / 100.0;
            claims.push(Claim { policy_id, amount });
        }
        policies.push(policy);
    }

    for offset in 0..config.orphan_claims as u64 {
        let amount = (severity.sample(&mut rng).max(1.0) * 100.0).round() / 100.0;
        claims.push(Claim {
            policy_id: config.policies as u64 + 1000 + offset,
            amount,
        });
    }

    (policies, claims)
}
