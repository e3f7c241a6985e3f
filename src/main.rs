//! MTPL Frequency CLI
//!
//! End-to-end walkthrough on a synthetic portfolio: build the merged
//! dataset, report claim rates, and fit a quick frequency model

use std::fs::File;
use std::io::Write;

use mtpl_frequency::dataset::{merge, synthetic};
use mtpl_frequency::model::sampler::SamplerConfig;
use mtpl_frequency::model::summary::ValueSummary;
use mtpl_frequency::rates::{bootstrap_claim_rates, claim_rates, portfolio_rate};
use mtpl_frequency::report::regional;
use mtpl_frequency::{Dimension, FitConfig, Formula, FrequencyEngine};

fn main() {
    env_logger::init();

    println!("MTPL Frequency v0.1.0");
    println!("=====================\n");

    // Synthetic stand-in portfolio with the production table shape
    let config = synthetic::SyntheticConfig {
        policies: 5000,
        base_rate: 0.10,
        orphan_claims: 2,
        missing_density: 0.002,
    };
    let (policies, claims) = synthetic::generate(&config, 2024);
    println!("Generated {} policies, {} claims", policies.len(), claims.len());

    let portfolio = merge::merge_portfolio(policies, claims).expect("merge failed");
    let patched = portfolio.iter().filter(|p| p.patched).count();
    let total = portfolio_rate(&portfolio);
    println!(
        "Merged portfolio: {} records ({} patched for orphan claims)",
        portfolio.len(),
        patched
    );
    println!(
        "Portfolio rate: {} claims / {:.1} policy-years = {:.4}\n",
        total.claim_count, total.exposure, total.claim_rate
    );

    // Claim rates by area
    println!("Claim rates by area:");
    println!(
        "{:>6} {:>9} {:>10} {:>8} {:>8}",
        "Area", "Policies", "Exposure", "Claims", "Rate"
    );
    println!("{}", "-".repeat(46));
    for rate in claim_rates(&portfolio, Dimension::Area) {
        println!(
            "{:>6} {:>9} {:>10.1} {:>8} {:>8.4}",
            rate.level, rate.policies, rate.exposure, rate.claim_count, rate.claim_rate
        );
    }

    // Bootstrap intervals by driver age band
    println!("\nDriver age rates with bootstrap intervals:");
    println!(
        "{:>8} {:>9} {:>9} {:>9} {:>9}",
        "Band", "Observed", "p2.5", "p50", "p97.5"
    );
    println!("{}", "-".repeat(50));
    for interval in bootstrap_claim_rates(&portfolio, Dimension::DrivAge, 500, 2024) {
        println!(
            "{:>8} {:>9.4} {:>9.4} {:>9.4} {:>9.4}",
            interval.level, interval.observed, interval.lower, interval.median, interval.upper
        );
    }

    // Prior predictive check before trusting any fit
    let prior_config = FitConfig {
        formula: Formula::parse("area + veh_gas").expect("valid formula"),
        prior_only: true,
        sampler: SamplerConfig {
            chains: 2,
            warmup: 0,
            draws: 300,
            seed: 2024,
        },
        predictive_draws: 100,
        ..FitConfig::default()
    };
    println!("\nPrior predictive check ({})...", prior_config.formula.label());
    let prior_fit = FrequencyEngine::new(prior_config)
        .fit(&portfolio)
        .expect("prior check failed");
    println!(
        "{:>16} {:>9} {:>9} {:>9}",
        "Statistic", "Observed", "p2.5", "p97.5"
    );
    println!("{}", "-".repeat(48));
    for check in &prior_fit.predictive {
        println!(
            "{:>16} {:>9.4} {:>9.4} {:>9.4}",
            check.statistic, check.observed, check.lower, check.upper
        );
    }

    // Posterior Poisson fit with the same formula
    let fit_config = FitConfig {
        formula: Formula::parse("area + veh_gas").expect("valid formula"),
        sampler: SamplerConfig {
            chains: 2,
            warmup: 300,
            draws: 300,
            seed: 2024,
        },
        predictive_draws: 100,
        ..FitConfig::default()
    };
    println!("\nFitting Poisson model ({})...", fit_config.formula.label());
    let engine = FrequencyEngine::new(fit_config);
    let fit = engine.fit(&portfolio).expect("fit failed");

    println!("\nParameter estimates:");
    println!(
        "{:>18} {:>9} {:>8} {:>9} {:>9} {:>7}",
        "Parameter", "Mean", "SD", "p2.5", "p97.5", "R-hat"
    );
    println!("{}", "-".repeat(66));
    for estimate in &fit.estimates {
        println!(
            "{:>18} {:>9.3} {:>8.3} {:>9.3} {:>9.3} {:>7.3}",
            estimate.name, estimate.mean, estimate.sd, estimate.lower, estimate.upper,
            estimate.rhat
        );
    }

    println!("\nPosterior predictive checks:");
    println!(
        "{:>16} {:>9} {:>9} {:>9} {:>9}",
        "Statistic", "Observed", "p2.5", "p97.5", "Tail"
    );
    println!("{}", "-".repeat(58));
    for check in &fit.predictive {
        println!(
            "{:>16} {:>9.4} {:>9.4} {:>9.4} {:>9.3}",
            check.statistic, check.observed, check.lower, check.upper, check.tail_prob
        );
    }
    if let Some(deviance) = fit.mean_deviance {
        println!("\nMean deviance: {deviance:.1}");
    }

    // Draw-level fitted rates over a slice of the portfolio
    let scored = &portfolio[..500.min(portfolio.len())];
    let rows = engine.policy_draws(&fit, scored).expect("scoring failed");
    let fitted: Vec<f64> = rows.iter().map(|r| r.fitted_mean).collect();
    let summary = ValueSummary::from_values(&fitted).expect("non-empty draws");
    println!(
        "\nFitted mean claim counts over {} policy draws:",
        rows.len()
    );
    println!(
        "  p10 {:.4}  p50 {:.4}  p90 {:.4}  mean {:.4}  max {:.4}",
        summary.p10, summary.p50, summary.p90, summary.mean, summary.max
    );

    // Regional table for mapping
    let csv_path = "regional_rates.csv";
    let mut file = File::create(csv_path).expect("Unable to create CSV file");
    writeln!(file, "code,name,policies,claim_count,exposure,claim_rate").unwrap();
    for row in regional::claim_rate_table(&portfolio) {
        let rate = if row.claim_rate.is_finite() {
            format!("{:.6}", row.claim_rate)
        } else {
            String::new()
        };
        writeln!(
            file,
            "{},{},{},{},{:.2},{}",
            row.code, row.name, row.policies, row.claim_count, row.exposure, rate
        )
        .unwrap();
    }
    println!("\nRegional rate table written to: {csv_path}");
}
