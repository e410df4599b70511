//! CSV export of projection results

use crate::assumptions::Assumptions;
use crate::projection::{AccountSeries, ProjectionResult};
use std::error::Error;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const YEARLY_TOTALS_FILE: &str = "yearly_totals.csv";
pub const ACCOUNT_TABLES_FILE: &str = "account_tables.csv";
pub const EXPENSE_MATRIX_FILE: &str = "expense_matrix.csv";

/// One row per year with the aggregate totals
pub fn write_yearly_totals<W: Write>(
    result: &ProjectionResult,
    writer: W,
) -> Result<(), Box<dyn Error>> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for year in &result.years {
        csv_writer.serialize(year)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Long format: one row per account per year; absent series are left blank
pub fn write_account_tables<W: Write>(
    result: &ProjectionResult,
    assumptions: &Assumptions,
    writer: W,
) -> Result<(), Box<dyn Error>> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record([
        "account",
        "type",
        "year",
        "balance",
        "earnings",
        "interest",
        "contribution",
        "employer_match",
        "withdrawal",
        "payment",
        "escrow",
        "insurance",
        "expense",
    ])?;

    for account in &result.accounts {
        for (year_index, balance) in account.tables.balance.iter().enumerate() {
            let mut record = vec![
                account.name.clone(),
                account.account_type.to_string(),
                assumptions.year_at(year_index).to_string(),
                format!("{balance:.2}"),
            ];
            record.extend(optional_columns(account, year_index));
            csv_writer.write_record(&record)?;
        }
    }
    csv_writer.flush()?;
    Ok(())
}

fn optional_columns(account: &AccountSeries, year_index: usize) -> Vec<String> {
    let t = &account.tables;
    [
        &t.earnings,
        &t.interest,
        &t.contribution,
        &t.employer_match,
        &t.withdrawal,
        &t.payment,
        &t.escrow,
        &t.insurance,
        &t.expense,
    ]
    .into_iter()
    .map(|series| {
        series
            .as_ref()
            .map(|values| format!("{:.2}", values[year_index]))
            .unwrap_or_default()
    })
    .collect()
}

/// Years down, accounts across
pub fn write_expense_matrix<W: Write>(
    result: &ProjectionResult,
    writer: W,
) -> Result<(), Box<dyn Error>> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec!["year".to_string()];
    header.extend(result.accounts.iter().map(|a| a.name.clone()));
    csv_writer.write_record(&header)?;

    for (summary, row) in result.years.iter().zip(&result.expense_matrix) {
        let mut record = vec![summary.year.to_string()];
        record.extend(row.iter().map(|v| format!("{v:.2}")));
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write all three tables into `dir`, creating it if needed
pub fn export_all(
    result: &ProjectionResult,
    assumptions: &Assumptions,
    dir: &Path,
) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    fs::create_dir_all(dir)?;

    let yearly = dir.join(YEARLY_TOTALS_FILE);
    write_yearly_totals(result, File::create(&yearly)?)?;

    let accounts = dir.join(ACCOUNT_TABLES_FILE);
    write_account_tables(result, assumptions, File::create(&accounts)?)?;

    let expenses = dir.join(EXPENSE_MATRIX_FILE);
    write_expense_matrix(result, File::create(&expenses)?)?;

    log::info!("Wrote projection tables to {}", dir.display());
    Ok(vec![yearly, accounts, expenses])
}
