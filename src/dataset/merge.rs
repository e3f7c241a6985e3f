//! Joining the claim severity table onto the policy table

use std::collections::BTreeMap;

use log::{info, warn};

use crate::dataset::data::{Claim, Policy};
use crate::dataset::DataError;

/// Join claim line-items onto policies and derive per-policy claim counts
/// and totals.
///
/// Every claim must land on a policy: a claim whose key has no base policy
/// gets a patched placeholder record appended after the real portfolio, so
/// downstream totals always conserve the claim table. Input policy order is
/// preserved.
pub fn merge_portfolio(
    mut policies: Vec<Policy>,
    claims: Vec<Claim>,
) -> Result<Vec<Policy>, DataError> {
    let mut index: BTreeMap<u64, usize> = BTreeMap::new();
    for (position, policy) in policies.iter().enumerate() {
        if index.insert(policy.policy_id, position).is_some() {
            return Err(DataError::DuplicatePolicy {
                policy_id: policy.policy_id,
            });
        }
    }

    let mut patched = 0usize;
    for claim in claims {
        let position = match index.get(&claim.policy_id) {
            Some(&position) => position,
            None => {
                warn!(
                    "claim of {:.2} references unknown policy {}; patching placeholder record",
                    claim.amount, claim.policy_id
                );
                let position = policies.len();
                policies.push(Policy::placeholder(claim.policy_id));
                index.insert(claim.policy_id, position);
                patched += 1;
                position
            }
        };
        policies[position].claims.push(claim);
    }

    let mut mismatched = 0usize;
    for policy in &mut policies {
        policy.claim_count = policy.claims.len() as u32;
        policy.claim_total = policy.claims.iter().map(|c| c.amount).sum();
        if policy.claim_count != policy.reported_claim_count {
            mismatched += 1;
        }
    }

    if patched > 0 {
        warn!("patched {patched} placeholder policies for orphan claims");
    }
    if mismatched > 0 {
        info!("derived claim counts differ from reported counts on {mismatched} policies");
    }
    Ok(policies)
}

/// Reattach claim line-items from a hand-off claim table.
///
/// Unlike the raw-table join, the policy table is expected to be complete:
/// a claim that misses every policy is an error, as is a stored claim count
/// that disagrees with the attached line-items. Claim totals are recomputed
/// from the attached amounts.
pub fn attach_claims(policies: &mut [Policy], claims: Vec<Claim>) -> Result<(), DataError> {
    let mut index: BTreeMap<u64, usize> = BTreeMap::new();
    for (position, policy) in policies.iter().enumerate() {
        if index.insert(policy.policy_id, position).is_some() {
            return Err(DataError::DuplicatePolicy {
                policy_id: policy.policy_id,
            });
        }
    }

    for claim in claims {
        let position = index
            .get(&claim.policy_id)
            .copied()
            .ok_or(DataError::MissingPolicy {
                policy_id: claim.policy_id,
            })?;
        policies[position].claims.push(claim);
    }

    for policy in policies.iter_mut() {
        let attached = policy.claims.len() as u32;
        if attached != policy.claim_count {
            return Err(DataError::ClaimCountMismatch {
                policy_id: policy.policy_id,
                stored: policy.claim_count,
                attached,
            });
        }
        policy.claim_total = policy.claims.iter().map(|c| c.amount).sum();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::data::{Area, Region, VehBrand, VehGas};

    fn base_policy(policy_id: u64, exposure: f64) -> Policy {
        Policy {
            policy_id,
            exposure,
            area: Area::C,
            veh_power: 6,
            veh_age: 3,
            driv_age: 40,
            bonus_malus: 50,
            veh_brand: VehBrand::B2,
            veh_gas: VehGas::Regular,
            density: Some(500.0),
            region: Region::R24,
            reported_claim_count: 0,
            claim_count: 0,
            claim_total: 0.0,
            patched: false,
            claims: Vec::new(),
        }
    }

    fn claim(policy_id: u64, amount: f64) -> Claim {
        Claim { policy_id, amount }
    }

    #[test]
    fn test_merge_attaches_claims() {
        let policies = vec![base_policy(1, 1.0), base_policy(2, 0.5)];
        let claims = vec![claim(1, 100.0), claim(1, 250.0), claim(2, 80.0)];

        let merged = merge_portfolio(policies, claims).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].claim_count, 2);
        assert_eq!(merged[0].claim_total, 350.0);
        assert_eq!(merged[1].claim_count, 1);
        assert_eq!(merged[1].claims.len(), 1);
    }

    #[test]
    fn test_claim_count_matches_line_items() {
        let policies = vec![base_policy(1, 1.0), base_policy(2, 0.5)];
        let claims = vec![claim(2, 80.0), claim(2, 20.0), claim(2, 55.5)];

        let merged = merge_portfolio(policies, claims).unwrap();
        for policy in &merged {
            assert_eq!(policy.claim_count as usize, policy.claims.len());
        }
    }

    #[test]
    fn test_orphan_claim_patches_placeholder() {
        let policies = vec![base_policy(1, 1.0)];
        let claims = vec![claim(1, 100.0), claim(777, 999.0), claim(777, 1.0)];

        let merged = merge_portfolio(policies, claims).unwrap();
        assert_eq!(merged.len(), 2);

        let patched = &merged[1];
        assert!(patched.patched);
        assert_eq!(patched.policy_id, 777);
        assert_eq!(patched.exposure, 1.0);
        assert_eq!(patched.claim_count, 2);
        assert_eq!(patched.claim_total, 1000.0);
        assert_eq!(patched.reported_claim_count, 0);
    }

    #[test]
    fn test_duplicate_policy_rejected() {
        let policies = vec![base_policy(5, 1.0), base_policy(5, 0.2)];
        let err = merge_portfolio(policies, Vec::new()).unwrap_err();
        assert!(matches!(err, DataError::DuplicatePolicy { policy_id: 5 }));
    }

    #[test]
    fn test_attach_rejects_missing_policy() {
        let mut policies = vec![base_policy(1, 1.0)];
        let err = attach_claims(&mut policies, vec![claim(2, 10.0)]).unwrap_err();
        assert!(matches!(err, DataError::MissingPolicy { policy_id: 2 }));
    }

    #[test]
    fn test_attach_rejects_count_mismatch() {
        let mut policies = vec![base_policy(1, 1.0)];
        policies[0].claim_count = 2;
        let err = attach_claims(&mut policies, vec![claim(1, 10.0)]).unwrap_err();
        assert!(matches!(
            err,
            DataError::ClaimCountMismatch {
                policy_id: 1,
                stored: 2,
                attached: 1
            }
        ));
    }
}
