//! Generate a synthetic portfolio in the raw extract layout
//!
//! Produces a policy table keyed by IDpol and a claim table with one row
//! per claim, shaped like the production extracts. Useful for exercising
//! the dataset builder and the models without real data.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;

use mtpl_frequency::dataset::loader::{write_raw_claims, write_raw_policies};
use mtpl_frequency::dataset::synthetic::{generate, SyntheticConfig};

#[derive(Parser, Debug)]
#[command(about = "Generate a synthetic raw policy/claim extract")]
struct Args {
    /// Number of policies to generate
    #[arg(long, default_value_t = 50_000)]
    policies: usize,

    /// Baseline claim frequency per policy-year
    #[arg(long, default_value_t = 0.10)]
    base_rate: f64,

    /// Claims written against policy ids absent from the policy table
    #[arg(long, default_value_t = 2)]
    orphan_claims: usize,

    /// Fraction of policies with the density field blanked
    #[arg(long, default_value_t = 0.002)]
    missing_density: f64,

    /// Generator seed
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Output path for the raw policy table
    #[arg(long, default_value = "policies_raw.csv")]
    policy_out: String,

    /// Output path for the raw claim table
    #[arg(long, default_value = "claims_raw.csv")]
    claim_out: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let start = Instant::now();

    let config = SyntheticConfig {
        policies: args.policies,
        base_rate: args.base_rate,
        orphan_claims: args.orphan_claims,
        missing_density: args.missing_density,
    };

    println!(
        "Generating {} policies at base rate {:.3} (seed {})...",
        config.policies, config.base_rate, args.seed
    );
    let (policies, claims) = generate(&config, args.seed);

    let claim_total: f64 = claims.iter().map(|c| c.amount).sum();
    println!(
        "  {} claims drawn, total severity {:.2}",
        claims.len(),
        claim_total
    );

    let mut policy_file = BufWriter::new(
        File::create(&args.policy_out).with_context(|| format!("creating {}", args.policy_out))?,
    );
    write_raw_policies(&mut policy_file, &policies)?;
    policy_file.flush()?;

    let mut claim_file = BufWriter::new(
        File::create(&args.claim_out).with_context(|| format!("creating {}", args.claim_out))?,
    );
    write_raw_claims(&mut claim_file, &claims)?;
    claim_file.flush()?;

    println!("Policy table written to: {}", args.policy_out);
    println!("Claim table written to:  {}", args.claim_out);
    println!("Done in {:?}", start.elapsed());
    Ok(())
}
