//! Build the modelling dataset from raw policy and claim extracts
//!
//! Joins the claim table onto the policy table by policy id, patching a
//! placeholder policy record for every claim whose policy is missing
//! from the extract, and writes the merged pair of hand-off tables read
//! by the report and model binaries.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;

use mtpl_frequency::dataset::loader::{
    load_raw_claims, load_raw_policies, write_claim_table, write_policy_table,
};
use mtpl_frequency::dataset::merge::merge_portfolio;
use mtpl_frequency::rates::portfolio_rate;

#[derive(Parser, Debug)]
#[command(about = "Merge raw extracts into the modelling dataset")]
struct Args {
    /// Raw policy table (IDpol, ClaimNb, Exposure, ...)
    #[arg(long, default_value = "policies_raw.csv")]
    policy_in: String,

    /// Raw claim table (IDpol, ClaimAmount)
    #[arg(long, default_value = "claims_raw.csv")]
    claim_in: String,

    /// Output path for the merged policy table
    #[arg(long, default_value = "policies.csv")]
    policy_out: String,

    /// Output path for the per-claim table
    #[arg(long, default_value = "claims.csv")]
    claim_out: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let start = Instant::now();

    let policies = load_raw_policies(&args.policy_in)
        .with_context(|| format!("loading {}", args.policy_in))?;
    println!(
        "Loaded {} policies from {} in {:?}",
        policies.len(),
        args.policy_in,
        start.elapsed()
    );

    let claims =
        load_raw_claims(&args.claim_in).with_context(|| format!("loading {}", args.claim_in))?;
    println!("Loaded {} claims from {}", claims.len(), args.claim_in);

    let merge_start = Instant::now();
    let portfolio = merge_portfolio(policies, claims)?;
    let patched = portfolio.iter().filter(|p| p.patched).count();
    let on_book: u64 = portfolio.iter().map(|p| u64::from(p.claim_count)).sum();
    let severity: f64 = portfolio.iter().map(|p| p.claim_total).sum();
    println!(
        "Merged {} records in {:?} ({} patched for orphan claims)",
        portfolio.len(),
        merge_start.elapsed(),
        patched
    );
    println!("  {} claims on book, total severity {:.2}", on_book, severity);

    let total = portfolio_rate(&portfolio);
    println!(
        "  portfolio rate {:.4} over {:.1} policy-years",
        total.claim_rate, total.exposure
    );

    let mut policy_file = BufWriter::new(
        File::create(&args.policy_out).with_context(|| format!("creating {}", args.policy_out))?,
    );
    write_policy_table(&mut policy_file, &portfolio)?;
    policy_file.flush()?;

    let mut claim_file = BufWriter::new(
        File::create(&args.claim_out).with_context(|| format!("creating {}", args.claim_out))?,
    );
    write_claim_table(&mut claim_file, &portfolio)?;
    claim_file.flush()?;

    println!("Policy table written to: {}", args.policy_out);
    println!("Claim table written to:  {}", args.claim_out);
    println!("Total time: {:?}", start.elapsed());
    Ok(())
}
