//! CSV input and output for raw source tables and serialized hand-off tables

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use log::warn;
use serde::Deserialize;

use crate::dataset::data::{Area, Claim, Policy, Region, VehBrand, VehGas};
use crate::dataset::merge;
use crate::dataset::DataError;

/// Raw policy row as exported from the source systems. Integer columns
/// arrive as strings because some exports write them float-formatted
/// (`"139.0"`), so each field is parsed explicitly.
#[derive(Debug, Deserialize)]
struct PolicyCsvRow {
    #[serde(rename = "IDpol")]
    policy_id: String,
    #[serde(rename = "ClaimNb")]
    claim_count: String,
    #[serde(rename = "Exposure")]
    exposure: String,
    #[serde(rename = "Area")]
    area: String,
    #[serde(rename = "VehPower")]
    veh_power: String,
    #[serde(rename = "VehAge")]
    veh_age: String,
    #[serde(rename = "DrivAge")]
    driv_age: String,
    #[serde(rename = "BonusMalus")]
    bonus_malus: String,
    #[serde(rename = "VehBrand")]
    veh_brand: String,
    #[serde(rename = "VehGas")]
    veh_gas: String,
    #[serde(rename = "Density")]
    density: String,
    #[serde(rename = "Region")]
    region: String,
}

impl PolicyCsvRow {
    fn to_policy(&self) -> Result<Policy, DataError> {
        let exposure = parse_number("Exposure", &self.exposure)?;
        if !exposure.is_finite() || exposure <= 0.0 {
            return Err(DataError::InvalidField {
                field: "Exposure",
                message: format!("must be a positive year fraction, got {}", self.exposure),
            });
        }

        let density = match self.density.trim() {
            "" | "NA" => None,
            value => Some(parse_number("Density", value)?),
        };

        Ok(Policy {
            policy_id: parse_integral("IDpol", &self.policy_id)?,
            exposure,
            area: Area::from_code(self.area.trim()).ok_or_else(|| DataError::UnknownLevel {
                field: "Area",
                value: self.area.clone(),
            })?,
            veh_power: parse_integral("VehPower", &self.veh_power)? as u8,
            veh_age: parse_integral("VehAge", &self.veh_age)? as u32,
            driv_age: parse_integral("DrivAge", &self.driv_age)? as u32,
            bonus_malus: parse_integral("BonusMalus", &self.bonus_malus)? as u32,
            veh_brand: VehBrand::from_code(self.veh_brand.trim()).ok_or_else(|| {
                DataError::UnknownLevel {
                    field: "VehBrand",
                    value: self.veh_brand.clone(),
                }
            })?,
            veh_gas: VehGas::from_code(self.veh_gas.trim()).ok_or_else(|| {
                DataError::UnknownLevel {
                    field: "VehGas",
                    value: self.veh_gas.clone(),
                }
            })?,
            density,
            region: Region::from_code(self.region.trim()).ok_or_else(|| {
                DataError::UnknownLevel {
                    field: "Region",
                    value: self.region.clone(),
                }
            })?,
            reported_claim_count: parse_integral("ClaimNb", &self.claim_count)? as u32,
            claim_count: 0,
            claim_total: 0.0,
            patched: false,
            claims: Vec::new(),
        })
    }
}

/// Raw claim row from the severity table
#[derive(Debug, Deserialize)]
struct ClaimCsvRow {
    #[serde(rename = "IDpol")]
    policy_id: String,
    #[serde(rename = "ClaimAmount")]
    amount: String,
}

impl ClaimCsvRow {
    fn to_claim(&self) -> Result<Claim, DataError> {
        let amount = parse_number("ClaimAmount", &self.amount)?;
        if !amount.is_finite() {
            return Err(DataError::InvalidField {
                field: "ClaimAmount",
                message: format!("must be finite, got {}", self.amount),
            });
        }
        Ok(Claim {
            policy_id: parse_integral("IDpol", &self.policy_id)?,
            amount,
        })
    }
}

/// Parse a column that must hold an integral value, tolerating the
/// float formatting (`"139.0"`) that numeric exports apply to key columns
fn parse_integral(field: &'static str, raw: &str) -> Result<u64, DataError> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<u64>() {
        return Ok(value);
    }
    let value: f64 = trimmed.parse().map_err(|_| DataError::Parse {
        field,
        value: raw.to_string(),
    })?;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(DataError::Parse {
            field,
            value: raw.to_string(),
        });
    }
    Ok(value as u64)
}

fn parse_number(field: &'static str, raw: &str) -> Result<f64, DataError> {
    raw.trim().parse().map_err(|_| DataError::Parse {
        field,
        value: raw.to_string(),
    })
}

/// Load the raw policy table. Exposures above one year are clamped to 1.0;
/// derived claim fields stay zeroed until the claim join runs.
pub fn load_raw_policies<P: AsRef<Path>>(path: P) -> Result<Vec<Policy>, DataError> {
    let file = File::open(path)?;
    load_raw_policies_from_reader(file)
}

pub fn load_raw_policies_from_reader<R: Read>(reader: R) -> Result<Vec<Policy>, DataError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut policies = Vec::new();
    let mut clamped = 0usize;
    for result in csv_reader.deserialize() {
        let row: PolicyCsvRow = result?;
        let mut policy = row.to_policy()?;
        if policy.exposure > 1.0 {
            policy.exposure = 1.0;
            clamped += 1;
        }
        policies.push(policy);
    }
    if clamped > 0 {
        warn!("clamped exposure to one year on {clamped} policies");
    }
    Ok(policies)
}

/// Load the raw claim severity table
pub fn load_raw_claims<P: AsRef<Path>>(path: P) -> Result<Vec<Claim>, DataError> {
    let file = File::open(path)?;
    load_raw_claims_from_reader(file)
}

pub fn load_raw_claims_from_reader<R: Read>(reader: R) -> Result<Vec<Claim>, DataError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut claims = Vec::new();
    let mut nonpositive = 0usize;
    for result in csv_reader.deserialize() {
        let row: ClaimCsvRow = result?;
        let claim = row.to_claim()?;
        // recoveries and zero settlements stay on the book; they still
        // count as claim events for frequency
        if claim.amount <= 0.0 {
            nonpositive += 1;
        }
        claims.push(claim);
    }
    if nonpositive > 0 {
        warn!("kept {nonpositive} claims with non-positive amounts");
    }
    Ok(claims)
}

/// Write policies in the raw source format, as produced by the portfolio
/// simulator
pub fn write_raw_policies<W: Write>(writer: &mut W, policies: &[Policy]) -> Result<(), DataError> {
    writeln!(
        writer,
        "IDpol,ClaimNb,Exposure,Area,VehPower,VehAge,DrivAge,BonusMalus,VehBrand,VehGas,Density,Region"
    )?;
    for p in policies {
        let density = p.density.map(|d| d.to_string()).unwrap_or_default();
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            p.policy_id,
            p.reported_claim_count,
            p.exposure,
            p.area.as_str(),
            p.veh_power,
            p.veh_age,
            p.driv_age,
            p.bonus_malus,
            p.veh_brand.as_str(),
            p.veh_gas.as_str(),
            density,
            p.region.as_str(),
        )?;
    }
    Ok(())
}

/// Write claims in the raw severity format
pub fn write_raw_claims<W: Write>(writer: &mut W, claims: &[Claim]) -> Result<(), DataError> {
    writeln!(writer, "IDpol,ClaimAmount")?;
    for claim in claims {
        writeln!(writer, "{},{}", claim.policy_id, claim.amount)?;
    }
    Ok(())
}

/// Merged policy row in the hand-off table format
#[derive(Debug, Deserialize)]
struct PolicyTableRow {
    policy_id: u64,
    exposure: f64,
    area: String,
    veh_power: u8,
    veh_age: u32,
    driv_age: u32,
    bonus_malus: u32,
    veh_brand: String,
    veh_gas: String,
    density: Option<f64>,
    region: String,
    reported_claim_count: u32,
    claim_count: u32,
    claim_total: f64,
    patched: bool,
}

impl PolicyTableRow {
    fn to_policy(&self) -> Result<Policy, DataError> {
        Ok(Policy {
            policy_id: self.policy_id,
            exposure: self.exposure,
            area: Area::from_code(&self.area).ok_or_else(|| DataError::UnknownLevel {
                field: "area",
                value: self.area.clone(),
            })?,
            veh_power: self.veh_power,
            veh_age: self.veh_age,
            driv_age: self.driv_age,
            bonus_malus: self.bonus_malus,
            veh_brand: VehBrand::from_code(&self.veh_brand).ok_or_else(|| {
                DataError::UnknownLevel {
                    field: "veh_brand",
                    value: self.veh_brand.clone(),
                }
            })?,
            veh_gas: VehGas::from_code(&self.veh_gas).ok_or_else(|| DataError::UnknownLevel {
                field: "veh_gas",
                value: self.veh_gas.clone(),
            })?,
            density: self.density,
            region: Region::from_code(&self.region).ok_or_else(|| DataError::UnknownLevel {
                field: "region",
                value: self.region.clone(),
            })?,
            reported_claim_count: self.reported_claim_count,
            claim_count: self.claim_count,
            claim_total: self.claim_total,
            patched: self.patched,
            claims: Vec::new(),
        })
    }
}

/// Write the merged policy table for hand-off to downstream stages.
/// Claim line-items are flattened out; `write_claim_table` carries them.
pub fn write_policy_table<W: Write>(writer: &mut W, policies: &[Policy]) -> Result<(), DataError> {
    writeln!(
        writer,
        "policy_id,exposure,area,veh_power,veh_age,driv_age,bonus_malus,veh_brand,veh_gas,\
         density,region,reported_claim_count,claim_count,claim_total,patched"
    )?;
    for p in policies {
        let density = p.density.map(|d| d.to_string()).unwrap_or_default();
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            p.policy_id,
            p.exposure,
            p.area.as_str(),
            p.veh_power,
            p.veh_age,
            p.driv_age,
            p.bonus_malus,
            p.veh_brand.as_str(),
            p.veh_gas.as_str(),
            density,
            p.region.as_str(),
            p.reported_claim_count,
            p.claim_count,
            p.claim_total,
            p.patched,
        )?;
    }
    Ok(())
}

/// Write the joined claim line-items for hand-off
pub fn write_claim_table<W: Write>(writer: &mut W, policies: &[Policy]) -> Result<(), DataError> {
    writeln!(writer, "policy_id,amount")?;
    for policy in policies {
        for claim in &policy.claims {
            writeln!(writer, "{},{}", claim.policy_id, claim.amount)?;
        }
    }
    Ok(())
}

/// Load a merged policy table without its claim line-items
pub fn load_policy_table<P: AsRef<Path>>(path: P) -> Result<Vec<Policy>, DataError> {
    let file = File::open(path)?;
    load_policy_table_from_reader(file)
}

pub fn load_policy_table_from_reader<R: Read>(reader: R) -> Result<Vec<Policy>, DataError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut policies = Vec::new();
    for result in csv_reader.deserialize() {
        let row: PolicyTableRow = result?;
        policies.push(row.to_policy()?);
    }
    Ok(policies)
}

/// Load a hand-off claim table
pub fn load_claim_table<P: AsRef<Path>>(path: P) -> Result<Vec<Claim>, DataError> {
    let file = File::open(path)?;
    load_claim_table_from_reader(file)
}

pub fn load_claim_table_from_reader<R: Read>(reader: R) -> Result<Vec<Claim>, DataError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut claims = Vec::new();
    for result in csv_reader.deserialize() {
        let claim: Claim = result?;
        claims.push(claim);
    }
    Ok(claims)
}

/// Load both hand-off tables and reattach claim line-items to their policies
pub fn load_portfolio<P: AsRef<Path>>(
    policy_path: P,
    claim_path: P,
) -> Result<Vec<Policy>, DataError> {
    let mut policies = load_policy_table(policy_path)?;
    let claims = load_claim_table(claim_path)?;
    merge::attach_claims(&mut policies, claims)?;
    Ok(policies)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW_POLICIES: &str = "\
IDpol,ClaimNb,Exposure,Area,VehPower,VehAge,DrivAge,BonusMalus,VehBrand,VehGas,Density,Region
1.0,1.0,0.1,D,5,0,55,50,B12,Regular,1217,R82
3.0,1.0,0.77,D,5,0,55,50,B12,Regular,1217,R82
5.0,0.0,0.75,B,6,2,52,50,B12,Diesel,54,R22
10.0,0.0,1.09,B,7,0,46,50,B12,Diesel,,R72
";

    const RAW_CLAIMS: &str = "\
IDpol,ClaimAmount
1.0,303.0
1.0,1981.84
5.0,1456.55
";

    #[test]
    fn test_load_raw_policies() {
        let policies = load_raw_policies_from_reader(RAW_POLICIES.as_bytes()).unwrap();
        assert_eq!(policies.len(), 4);

        let first = &policies[0];
        assert_eq!(first.policy_id, 1);
        assert_eq!(first.reported_claim_count, 1);
        assert_eq!(first.area, Area::D);
        assert_eq!(first.veh_brand, VehBrand::B12);
        assert_eq!(first.region, Region::R82);
        assert_eq!(first.density, Some(1217.0));
        assert_eq!(first.claim_count, 0);
        assert!(first.claims.is_empty());
    }

    #[test]
    fn test_exposure_clamped_to_one_year() {
        let policies = load_raw_policies_from_reader(RAW_POLICIES.as_bytes()).unwrap();
        assert_eq!(policies[3].exposure, 1.0);
        assert_eq!(policies[2].exposure, 0.75);
    }

    #[test]
    fn test_missing_density_is_none() {
        let policies = load_raw_policies_from_reader(RAW_POLICIES.as_bytes()).unwrap();
        assert_eq!(policies[3].density, None);
    }

    #[test]
    fn test_unknown_region_rejected() {
        let csv = "\
IDpol,ClaimNb,Exposure,Area,VehPower,VehAge,DrivAge,BonusMalus,VehBrand,VehGas,Density,Region
1,0,0.5,A,5,1,40,50,B1,Regular,100,R99
";
        let err = load_raw_policies_from_reader(csv.as_bytes()).unwrap_err();
        match err {
            DataError::UnknownLevel { field, value } => {
                assert_eq!(field, "Region");
                assert_eq!(value, "R99");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fractional_key_rejected() {
        let csv = "\
IDpol,ClaimNb,Exposure,Area,VehPower,VehAge,DrivAge,BonusMalus,VehBrand,VehGas,Density,Region
1.5,0,0.5,A,5,1,40,50,B1,Regular,100,R11
";
        let err = load_raw_policies_from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::Parse { field: "IDpol", .. }));
    }

    #[test]
    fn test_nonpositive_exposure_rejected() {
        let csv = "\
IDpol,ClaimNb,Exposure,Area,VehPower,VehAge,DrivAge,BonusMalus,VehBrand,VehGas,Density,Region
1,0,0.0,A,5,1,40,50,B1,Regular,100,R11
";
        let err = load_raw_policies_from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::InvalidField { field: "Exposure", .. }));
    }

    #[test]
    fn test_load_raw_claims() {
        let claims = load_raw_claims_from_reader(RAW_CLAIMS.as_bytes()).unwrap();
        assert_eq!(claims.len(), 3);
        assert_eq!(claims[0].policy_id, 1);
        assert_eq!(claims[1].amount, 1981.84);
    }

    #[test]
    fn test_nonpositive_claim_amounts_kept() {
        let csv = "\
IDpol,ClaimAmount
1,100.0
1,0.0
2,-35.5
";
        let claims = load_raw_claims_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(claims.len(), 3);
        assert_eq!(claims[2].amount, -35.5);
    }

    #[test]
    fn test_policy_table_round_trip() {
        let policies = load_raw_policies_from_reader(RAW_POLICIES.as_bytes()).unwrap();
        let claims = load_raw_claims_from_reader(RAW_CLAIMS.as_bytes()).unwrap();
        let merged = merge::merge_portfolio(policies, claims).unwrap();

        let mut policy_buf = Vec::new();
        let mut claim_buf = Vec::new();
        write_policy_table(&mut policy_buf, &merged).unwrap();
        write_claim_table(&mut claim_buf, &merged).unwrap();

        let mut reloaded = load_policy_table_from_reader(policy_buf.as_slice()).unwrap();
        let claims = load_claim_table_from_reader(claim_buf.as_slice()).unwrap();
        merge::attach_claims(&mut reloaded, claims).unwrap();

        assert_eq!(reloaded.len(), merged.len());
        for (before, after) in merged.iter().zip(&reloaded) {
            assert_eq!(before.policy_id, after.policy_id);
            assert_eq!(before.exposure, after.exposure);
            assert_eq!(before.density, after.density);
            assert_eq!(before.claim_count, after.claim_count);
            assert_eq!(before.claims, after.claims);
            assert_eq!(before.patched, after.patched);
        }
    }

    #[test]
    fn test_raw_format_round_trip() {
        let policies = load_raw_policies_from_reader(RAW_POLICIES.as_bytes()).unwrap();
        let claims = load_raw_claims_from_reader(RAW_CLAIMS.as_bytes()).unwrap();

        let mut policy_buf = Vec::new();
        let mut claim_buf = Vec::new();
        write_raw_policies(&mut policy_buf, &policies).unwrap();
        write_raw_claims(&mut claim_buf, &claims).unwrap();

        let reloaded = load_raw_policies_from_reader(policy_buf.as_slice()).unwrap();
        assert_eq!(reloaded.len(), policies.len());
        for (before, after) in policies.iter().zip(&reloaded) {
            assert_eq!(before.policy_id, after.policy_id);
            assert_eq!(before.exposure, after.exposure);
            assert_eq!(before.reported_claim_count, after.reported_claim_count);
        }
        let reloaded_claims = load_raw_claims_from_reader(claim_buf.as_slice()).unwrap();
        assert_eq!(reloaded_claims, claims);
    }
}
