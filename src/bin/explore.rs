//! Exploratory report over the merged portfolio tables
//!
//! Profiles the table schemas, summarizes the exposure and claim count
//! distributions, tabulates claim rates by rating dimension with their
//! loadings against the portfolio rate, and prints the regional rate
//! table. Bootstrap rate intervals are available per dimension.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;

use mtpl_frequency::dataset::loader::load_portfolio;
use mtpl_frequency::rates::{bootstrap_claim_rates, portfolio_rate};
use mtpl_frequency::report::distributions::{
    faceted_rates, level_counts, numeric_histogram, rate_comparison, Histogram,
};
use mtpl_frequency::report::regional::claim_rate_table;
use mtpl_frequency::report::schema::profile_file;
use mtpl_frequency::Dimension;

#[derive(Parser, Debug)]
#[command(about = "Exploratory claim-frequency report")]
struct Args {
    /// Merged policy table
    #[arg(long, default_value = "policies.csv")]
    policy_table: String,

    /// Per-claim table
    #[arg(long, default_value = "claims.csv")]
    claim_table: String,

    /// Histogram bins for numeric columns
    #[arg(long, default_value_t = 12)]
    bins: usize,

    /// Cross two dimensions, e.g. "driv_age,bonus_malus"
    #[arg(long)]
    facet: Option<String>,

    /// Dimension to bootstrap rate intervals for (repeatable)
    #[arg(long = "intervals")]
    intervals: Vec<String>,

    /// Bootstrap replicates per group
    #[arg(long, default_value_t = 1000)]
    replicates: usize,

    /// Bootstrap seed
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Write the regional rate table to this CSV path
    #[arg(long)]
    regional_out: Option<String>,
}

fn parse_dimension(name: &str) -> anyhow::Result<Dimension> {
    Dimension::from_name(name).ok_or_else(|| anyhow::anyhow!("unknown dimension: {name}"))
}

fn print_histogram(histogram: &Histogram) {
    for (i, count) in histogram.counts.iter().enumerate() {
        println!(
            "  [{:>10.2}, {:>10.2}) {:>8}",
            histogram.edges[i],
            histogram.edges[i + 1],
            count
        );
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let start = Instant::now();

    // Schema profiles straight off the files
    for path in [&args.policy_table, &args.claim_table] {
        let profiles = profile_file(path).with_context(|| format!("profiling {path}"))?;
        println!("Schema of {path}:");
        println!(
            "{:>22} {:>12} {:>8} {:>8} {:>9} {:>12} {:>12}",
            "Column", "Kind", "Rows", "Missing", "Distinct", "Min", "Max"
        );
        println!("{}", "-".repeat(90));
        for profile in &profiles {
            let min = profile.min.map(|v| format!("{v:.2}")).unwrap_or_default();
            let max = profile.max.map(|v| format!("{v:.2}")).unwrap_or_default();
            println!(
                "{:>22} {:>12} {:>8} {:>8} {:>9} {:>12} {:>12}",
                profile.name,
                profile.kind.as_str(),
                profile.rows,
                profile.missing,
                profile.distinct,
                min,
                max
            );
        }
        println!();
    }

    let portfolio = load_portfolio(&args.policy_table, &args.claim_table)?;
    let total = portfolio_rate(&portfolio);
    let patched = portfolio.iter().filter(|p| p.patched).count();
    let missing_density = portfolio.iter().filter(|p| p.density.is_none()).count();
    println!(
        "Portfolio: {} records ({} patched, {} missing density)",
        portfolio.len(),
        patched,
        missing_density
    );
    println!(
        "  {} claims / {:.1} policy-years = {:.4}",
        total.claim_count, total.exposure, total.claim_rate
    );

    let exposures: Vec<f64> = portfolio.iter().map(|p| p.exposure).collect();
    if let Some(histogram) = numeric_histogram(&exposures, args.bins) {
        println!("\nExposure distribution:");
        print_histogram(&histogram);
    }

    let densities: Vec<f64> = portfolio.iter().filter_map(|p| p.density).collect();
    if let Some(histogram) = numeric_histogram(&densities, args.bins) {
        println!("\nDensity distribution:");
        print_histogram(&histogram);
    }

    let mut count_frequencies: BTreeMap<u32, usize> = BTreeMap::new();
    for policy in &portfolio {
        *count_frequencies.entry(policy.claim_count).or_default() += 1;
    }
    println!("\nClaim count distribution:");
    for (count, records) in &count_frequencies {
        println!(
            "  {:>2} claims: {:>8} ({:.5})",
            count,
            records,
            *records as f64 / portfolio.len() as f64
        );
    }

    println!("\nRecord share by vehicle brand:");
    println!("{:>8} {:>9} {:>8}", "Brand", "Policies", "Share");
    println!("{}", "-".repeat(28));
    for count in level_counts(&portfolio, Dimension::VehBrand) {
        println!(
            "{:>8} {:>9} {:>8.4}",
            count.level, count.policies, count.share
        );
    }

    for dimension in Dimension::ALL {
        if dimension == Dimension::Region {
            continue;
        }
        println!("\nClaim rates by {}:", dimension.name());
        println!(
            "{:>8} {:>9} {:>10} {:>8} {:>8} {:>9}",
            "Level", "Policies", "Exposure", "Claims", "Rate", "Relative"
        );
        println!("{}", "-".repeat(58));
        for row in rate_comparison(&portfolio, dimension) {
            println!(
                "{:>8} {:>9} {:>10.1} {:>8} {:>8.4} {:>9.3}",
                row.level, row.policies, row.exposure, row.claim_count, row.claim_rate,
                row.relative
            );
        }
    }

    if let Some(facet) = &args.facet {
        let Some((row_name, col_name)) = facet.split_once(',') else {
            bail!("facet wants two dimension names separated by a comma, got {facet}");
        };
        let row_dimension = parse_dimension(row_name.trim())?;
        let col_dimension = parse_dimension(col_name.trim())?;
        println!(
            "\nClaim rates by {} x {}:",
            row_dimension.name(),
            col_dimension.name()
        );
        println!(
            "{:>8} {:>8} {:>9} {:>10} {:>8} {:>8}",
            row_dimension.name(),
            col_dimension.name(),
            "Policies",
            "Exposure",
            "Claims",
            "Rate"
        );
        println!("{}", "-".repeat(58));
        for cell in faceted_rates(&portfolio, row_dimension, col_dimension) {
            println!(
                "{:>8} {:>8} {:>9} {:>10.1} {:>8} {:>8.4}",
                cell.row_level,
                cell.col_level,
                cell.policies,
                cell.exposure,
                cell.claim_count,
                cell.claim_rate
            );
        }
    }

    for name in &args.intervals {
        let dimension = parse_dimension(name)?;
        println!(
            "\n{} rates with bootstrap intervals ({} replicates):",
            dimension.name(),
            args.replicates
        );
        println!(
            "{:>8} {:>9} {:>9} {:>9} {:>9}",
            "Level", "Observed", "p2.5", "p50", "p97.5"
        );
        println!("{}", "-".repeat(50));
        for interval in bootstrap_claim_rates(&portfolio, dimension, args.replicates, args.seed) {
            println!(
                "{:>8} {:>9.4} {:>9.4} {:>9.4} {:>9.4}",
                interval.level, interval.observed, interval.lower, interval.median,
                interval.upper
            );
        }
    }

    let regional = claim_rate_table(&portfolio);
    println!("\nRegional claim rates:");
    println!(
        "{:>5} {:<28} {:>9} {:>10} {:>8} {:>8}",
        "Code", "Region", "Policies", "Exposure", "Claims", "Rate"
    );
    println!("{}", "-".repeat(74));
    for row in &regional {
        let rate = if row.claim_rate.is_finite() {
            format!("{:.4}", row.claim_rate)
        } else {
            "-".to_string()
        };
        println!(
            "{:>5} {:<28} {:>9} {:>10.1} {:>8} {:>8}",
            row.code, row.name, row.policies, row.exposure, row.claim_count, rate
        );
    }

    if let Some(path) = &args.regional_out {
        let mut file = File::create(path).with_context(|| format!("creating {path}"))?;
        writeln!(file, "code,name,policies,claim_count,exposure,claim_rate")?;
        for row in &regional {
            let rate = if row.claim_rate.is_finite() {
                format!("{:.6}", row.claim_rate)
            } else {
                String::new()
            };
            writeln!(
                file,
                "{},{},{},{},{:.2},{}",
                row.code, row.name, row.policies, row.claim_count, row.exposure, rate
            )?;
        }
        println!("\nRegional rate table written to: {path}");
    }

    println!("\nReport complete in {:?}", start.elapsed());
    Ok(())
}
