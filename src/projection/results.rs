//! Output structures for a projection run

use crate::accounts::{AccountEntry, AccountId, AccountTables, AccountType};
use crate::error::{Diagnostic, Severity};
use serde::{Deserialize, Serialize};

/// Aggregate totals for one simulated year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearSummary {
    pub year_index: usize,
    pub year: u32,

    // Income
    pub gross_income: f64,
    pub taxable_income: f64,
    pub income_tax: f64,
    pub after_tax_income: f64,

    // Spending and savings
    pub total_expenses: f64,
    pub total_savings: f64,

    /// Running sum of each year's after-tax income less expenses
    pub net_worth: f64,
}

/// Year-indexed tables for one account after the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSeries {
    pub id: AccountId,
    pub name: String,
    pub account_type: AccountType,
    pub tables: AccountTables,
}

impl AccountSeries {
    pub fn from_entry(index: usize, entry: AccountEntry) -> Self {
        Self {
            id: AccountId(index),
            account_type: entry.definition.account_type(),
            name: entry.definition.name,
            tables: entry.tables,
        }
    }
}

/// Complete projection result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionResult {
    /// One row per simulated year
    pub years: Vec<YearSummary>,

    /// Per-year, per-account expense postings (rows: years, columns: accounts)
    pub expense_matrix: Vec<Vec<f64>>,

    /// Per-account tables in definition order
    pub accounts: Vec<AccountSeries>,

    /// Anomalies recorded during the run
    pub diagnostics: Vec<Diagnostic>,
}

impl ProjectionResult {
    pub fn new(
        years: Vec<YearSummary>,
        expense_matrix: Vec<Vec<f64>>,
        entries: Vec<AccountEntry>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        let accounts = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| AccountSeries::from_entry(index, entry))
            .collect();
        Self {
            years,
            expense_matrix,
            accounts,
            diagnostics,
        }
    }

    /// Look up an account's tables by name
    pub fn account(&self, name: &str) -> Option<&AccountSeries> {
        self.accounts.iter().find(|a| a.name == name)
    }

    /// Get summary statistics
    pub fn summary(&self) -> ProjectionSummary {
        let total_gross_income: f64 = self.years.iter().map(|y| y.gross_income).sum();
        let total_income_tax: f64 = self.years.iter().map(|y| y.income_tax).sum();
        let total_expenses: f64 = self.years.iter().map(|y| y.total_expenses).sum();

        let peak = self
            .years
            .iter()
            .max_by(|a, b| a.net_worth.total_cmp(&b.net_worth));
        let first_negative_year = self
            .years
            .iter()
            .find(|y| y.net_worth < 0.0)
            .map(|y| y.year);

        let final_year = self.years.last();

        ProjectionSummary {
            total_years: self.years.len(),
            total_gross_income,
            total_income_tax,
            total_expenses,
            final_net_worth: final_year.map(|y| y.net_worth).unwrap_or(0.0),
            final_total_savings: final_year.map(|y| y.total_savings).unwrap_or(0.0),
            peak_net_worth: peak.map(|y| y.net_worth).unwrap_or(0.0),
            peak_year: peak.map(|y| y.year),
            first_negative_year,
            warnings: self.count(Severity::Warning),
            errors: self.count(Severity::Error),
        }
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == severity).count()
    }
}

/// Summary statistics for a projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSummary {
    pub total_years: usize,
    pub total_gross_income: f64,
    pub total_income_tax: f64,
    pub total_expenses: f64,
    pub final_net_worth: f64,
    pub final_total_savings: f64,
    pub peak_net_worth: f64,
    pub peak_year: Option<u32>,
    pub first_negative_year: Option<u32>,
    pub warnings: usize,
    pub errors: usize,
}
