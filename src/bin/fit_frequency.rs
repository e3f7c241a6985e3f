//! Fit a Bayesian claim-frequency model to the merged portfolio
//!
//! Builds the design matrix from a formula, runs the adaptive
//! random-walk sampler, and prints parameter estimates, convergence
//! diagnostics, and posterior predictive checks. Supports prior-only
//! fits, a Poisson/negative-binomial comparison, and a JSON report
//! for hand-off.

use std::fs::File;
use std::io::Write;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;

use mtpl_frequency::model::priors::{NormalPrior, PriorConfig, ShapePrior};
use mtpl_frequency::model::sampler::SamplerConfig;
use mtpl_frequency::model::summary::{CountSummary, ValueSummary};
use mtpl_frequency::{Family, FitConfig, Formula, FrequencyEngine, FrequencyFit, ModelRunner};

#[derive(Parser, Debug)]
#[command(about = "Fit a Bayesian claim-frequency model")]
struct Args {
    /// Merged policy table
    #[arg(long, default_value = "policies.csv")]
    policy_table: String,

    /// Per-claim table
    #[arg(long, default_value = "claims.csv")]
    claim_table: String,

    /// Model formula: factors and covariates joined by '+', or "1" for
    /// the intercept-only model
    #[arg(
        long,
        default_value = "area + veh_power + veh_age + driv_age + bonus_malus + veh_brand + veh_gas"
    )]
    formula: String,

    /// Count family: poisson or nb
    #[arg(long, default_value = "poisson")]
    family: String,

    /// Draw from the priors instead of conditioning on the data
    #[arg(long)]
    prior_only: bool,

    /// Fit both families on the formula and print a deviance comparison
    #[arg(long)]
    compare: bool,

    #[arg(long, default_value_t = 4)]
    chains: usize,

    /// Warmup iterations per chain (discarded)
    #[arg(long, default_value_t = 1000)]
    warmup: usize,

    /// Retained draws per chain
    #[arg(long, default_value_t = 1000)]
    draws: usize,

    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Retained draws pushed through the count simulator
    #[arg(long, default_value_t = 200)]
    predictive_draws: usize,

    /// Prior location for the intercept
    #[arg(long, default_value_t = -2.0)]
    intercept_loc: f64,

    /// Prior scale for the intercept
    #[arg(long, default_value_t = 1.0)]
    intercept_scale: f64,

    /// Prior location shared by the non-intercept coefficients
    #[arg(long, default_value_t = 0.0)]
    coefficient_loc: f64,

    /// Prior scale shared by the non-intercept coefficients
    #[arg(long, default_value_t = 0.5)]
    coefficient_scale: f64,

    /// Exponential prior rate on the negative binomial shape
    #[arg(long, default_value_t = 1.0)]
    shape_rate: f64,

    /// Score the first N policies under every retained draw and print the
    /// fitted-rate and simulated-count summaries (0 = skip)
    #[arg(long, default_value_t = 0)]
    score: usize,

    /// Write the fit report as JSON to this path
    #[arg(long)]
    report_out: Option<String>,
}

fn print_fit(fit: &FrequencyFit) {
    println!(
        "\n{} fit of {} ({} rows, {} dropped):",
        fit.family.name(),
        fit.formula_label,
        fit.rows,
        fit.dropped
    );
    println!(
        "{:>24} {:>9} {:>8} {:>9} {:>9} {:>9} {:>7}",
        "Parameter", "Mean", "SD", "p2.5", "p50", "p97.5", "R-hat"
    );
    println!("{}", "-".repeat(82));
    for estimate in &fit.estimates {
        println!(
            "{:>24} {:>9.3} {:>8.3} {:>9.3} {:>9.3} {:>9.3} {:>7.3}",
            estimate.name,
            estimate.mean,
            estimate.sd,
            estimate.lower,
            estimate.median,
            estimate.upper,
            estimate.rhat
        );
    }

    println!("\nPredictive checks:");
    println!(
        "{:>16} {:>9} {:>9} {:>9} {:>9} {:>7}",
        "Statistic", "Observed", "p2.5", "p50", "p97.5", "Tail"
    );
    println!("{}", "-".repeat(66));
    for check in &fit.predictive {
        println!(
            "{:>16} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>7.3}",
            check.statistic, check.observed, check.lower, check.median, check.upper,
            check.tail_prob
        );
    }

    match fit.mean_deviance {
        Some(deviance) => println!("\nMean deviance: {deviance:.1}"),
        None => println!("\nMean deviance: - (prior only)"),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let start = Instant::now();

    println!("Loading portfolio tables...");
    let runner = ModelRunner::from_tables(&args.policy_table, &args.claim_table)?;
    println!(
        "Loaded {} policies in {:?}",
        runner.portfolio().len(),
        start.elapsed()
    );

    let formula = Formula::parse(&args.formula)?;
    let family = Family::from_name(&args.family)
        .ok_or_else(|| anyhow::anyhow!("unknown family: {}", args.family))?;
    let priors = PriorConfig {
        intercept: NormalPrior::new(args.intercept_loc, args.intercept_scale)?,
        coefficient: NormalPrior::new(args.coefficient_loc, args.coefficient_scale)?,
        shape: ShapePrior::new(args.shape_rate)?,
    };
    let config = FitConfig {
        formula,
        family,
        priors,
        sampler: SamplerConfig {
            chains: args.chains,
            warmup: args.warmup,
            draws: args.draws,
            seed: args.seed,
        },
        prior_only: args.prior_only,
        predictive_draws: args.predictive_draws,
    };
    let config_for_scoring = config.clone();

    let fit_start = Instant::now();
    let fits = if args.compare {
        let mut configs = vec![config];
        for family in [Family::Poisson, Family::NegativeBinomial] {
            if family != configs[0].family {
                let mut other = configs[0].clone();
                other.family = family;
                configs.push(other);
            }
        }
        println!("Fitting {} models...", configs.len());
        runner.run_fits(&configs)?
    } else {
        println!(
            "Fitting {} model ({} chains x {} draws)...",
            family.name(),
            args.chains,
            args.draws
        );
        vec![runner.run(config)?]
    };
    println!("Sampling complete in {:?}", fit_start.elapsed());

    for fit in &fits {
        print_fit(fit);
    }

    if args.compare {
        println!("\nModel comparison (best first):");
        println!(
            "{:>20} {:>8} {:>7} {:>14}",
            "Family", "Rows", "Prior", "Mean deviance"
        );
        println!("{}", "-".repeat(52));
        for row in ModelRunner::compare(&fits) {
            let deviance = match row.mean_deviance {
                Some(value) => format!("{value:.1}"),
                None => "-".to_string(),
            };
            println!(
                "{:>20} {:>8} {:>7} {:>14}",
                row.family, row.rows, row.prior_only, deviance
            );
        }
    }

    if args.score > 0 {
        let scored = &runner.portfolio()[..args.score.min(runner.portfolio().len())];
        let engine = FrequencyEngine::new(config_for_scoring);
        let rows = engine.policy_draws(&fits[0], scored)?;

        let fitted: Vec<f64> = rows.iter().map(|r| r.fitted_mean).collect();
        let means = ValueSummary::from_values(&fitted)?;
        println!(
            "\nFitted mean claim counts over {} policy draws ({} policies):",
            rows.len(),
            scored.len()
        );
        println!(
            "  p10 {:.4}  p25 {:.4}  p50 {:.4}  p75 {:.4}  p90 {:.4}  mean {:.4}  max {:.4}",
            means.p10, means.p25, means.p50, means.p75, means.p90, means.mean, means.max
        );

        let counts: Vec<u32> = rows.iter().map(|r| r.simulated).collect();
        let simulated = CountSummary::from_counts(&counts)?;
        println!(
            "Simulated counts: p90 {:.2}  mean {:.4}  max {}  zero share {:.4}",
            simulated.p90, simulated.mean, simulated.max, simulated.zero_proportion
        );
    }

    if let Some(path) = &args.report_out {
        let report = fits[0].report();
        let mut file = File::create(path).with_context(|| format!("creating {path}"))?;
        file.write_all(serde_json::to_string_pretty(&report)?.as_bytes())?;
        println!("\nFit report written to: {path}");
    }

    println!("\nTotal time: {:?}", start.elapsed());
    Ok(())
}
