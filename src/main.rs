//! Financial Projection CLI
//!
//! Runs a yearly projection for a household described by an assumptions CSV
//! and an accounts JSON file.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use financial_projection::accounts::{load_accounts, loader::DEFAULT_ACCOUNTS_PATH};
use financial_projection::assumptions::{load_assumptions, DEFAULT_ASSUMPTIONS_PATH};
use financial_projection::export::export_all;
use financial_projection::{ProjectionConfig, ProjectionResult, ScenarioRunner};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "financial_projection")]
#[command(about = "Year-by-year projection of income, savings, debt and net worth")]
struct Args {
    /// Assumptions file (name,value rows)
    #[arg(short, long, default_value = DEFAULT_ASSUMPTIONS_PATH)]
    assumptions: PathBuf,

    /// Account definitions (JSON array)
    #[arg(long, default_value = DEFAULT_ACCOUNTS_PATH)]
    accounts: PathBuf,

    /// Directory for CSV export of all tables
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Abort when a year's computation is undefined instead of warning
    #[arg(long)]
    strict: bool,

    /// Compare retirement ages, e.g. 62,65,67
    #[arg(long, value_delimiter = ',')]
    retire_ages: Vec<u32>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let start = Instant::now();
    let assumptions = load_assumptions(&args.assumptions)
        .map_err(|e| anyhow!("loading {}: {e}", args.assumptions.display()))?;
    let accounts = load_accounts(&args.accounts)
        .map_err(|e| anyhow!("loading {}: {e}", args.accounts.display()))?;
    log::info!("Loaded {} accounts in {:?}", accounts.len(), start.elapsed());

    let runner = ScenarioRunner::new(assumptions, accounts)
        .with_config(ProjectionConfig { strict: args.strict });
    let result = runner.run().context("projection failed")?;

    print_years(&result);
    print_diagnostics(&result);

    if let Some(dir) = &args.output {
        let files = export_all(&result, runner.assumptions(), dir)
            .map_err(|e| anyhow!("exporting to {}: {e}", dir.display()))?;
        println!("\nFull results written to:");
        for file in files {
            println!("  {}", file.display());
        }
    }

    if !args.retire_ages.is_empty() {
        print_retirement_sweep(&runner, &args.retire_ages)?;
    }

    Ok(())
}

fn print_years(result: &ProjectionResult) {
    println!(
        "{:>6} {:>16} {:>14} {:>14} {:>14} {:>14} {:>16}",
        "Year", "NetWorth", "Income", "Taxable", "AfterTax", "Expenses", "Savings"
    );
    println!("{}", "-".repeat(100));
    for y in &result.years {
        println!(
            "{:>6} {:>16.2} {:>14.2} {:>14.2} {:>14.2} {:>14.2} {:>16.2}",
            y.year,
            y.net_worth,
            y.gross_income,
            y.taxable_income,
            y.after_tax_income,
            y.total_expenses,
            y.total_savings,
        );
    }

    let summary = result.summary();
    println!("\nSummary:");
    println!("  Years: {}", summary.total_years);
    println!("  Final Net Worth: ${:.2}", summary.final_net_worth);
    if let Some(year) = summary.peak_year {
        println!("  Peak Net Worth: ${:.2} ({year})", summary.peak_net_worth);
    }
    println!("  Final Total Savings: ${:.2}", summary.final_total_savings);
    match summary.first_negative_year {
        Some(year) => println!("  Net worth first negative in {year}"),
        None => println!("  Net worth never negative"),
    }
}

fn print_diagnostics(result: &ProjectionResult) {
    if result.diagnostics.is_empty() {
        return;
    }
    println!("\nDiagnostics ({}):", result.diagnostics.len());
    for diagnostic in &result.diagnostics {
        println!("  {diagnostic}");
    }
}

fn print_retirement_sweep(runner: &ScenarioRunner, ages: &[u32]) -> Result<()> {
    println!("\nRetirement age comparison:");
    println!(
        "{:>5} {:>18} {:>18} {:>14}",
        "Age", "FinalNetWorth", "PeakNetWorth", "FirstNegative"
    );
    for (age, result) in runner.run_retirement_ages(ages) {
        let summary = result
            .with_context(|| format!("projection retiring at {age} failed"))?
            .summary();
        let negative = summary
            .first_negative_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>5} {:>18.2} {:>18.2} {:>14}",
            age, summary.final_net_worth, summary.peak_net_worth, negative
        );
    }
    Ok(())
}
