//! Running aggregate totals for the year being simulated

use crate::accounts::AccountId;

/// Aggregates accumulated while one year's accounts are processed
///
/// Later accounts in the processing order read what earlier ones posted
/// (taxable income for percent contributions, expenses for cost-of-living
/// withdrawals).
#[derive(Debug, Clone, PartialEq)]
pub struct YearTotals {
    pub year_index: usize,
    pub year: u32,
    pub gross_income: f64,
    pub taxable_income: f64,
    pub total_savings: f64,
    /// Expense matrix row: one entry per account
    pub expenses: Vec<f64>,
    /// Last year's total savings, available once two years of history exist
    prior_total_savings: Option<f64>,
}

impl YearTotals {
    pub fn new(year_index: usize, year: u32, num_accounts: usize) -> Self {
        Self {
            year_index,
            year,
            gross_income: 0.0,
            taxable_income: 0.0,
            total_savings: 0.0,
            expenses: vec![0.0; num_accounts],
            prior_total_savings: None,
        }
    }

    /// Attach last year's savings total as history for this year
    pub fn with_history(mut self, prior_total_savings: f64) -> Self {
        self.prior_total_savings = Some(prior_total_savings);
        self
    }

    pub fn prior_total_savings(&self) -> Option<f64> {
        self.prior_total_savings
    }

    /// Sum of the expense matrix row posted so far
    pub fn total_expenses(&self) -> f64 {
        self.expenses.iter().sum()
    }

    pub fn post_expense(&mut self, id: AccountId, amount: f64) {
        self.expenses[id.index()] = amount;
    }

    /// Income after the flat income tax
    pub fn after_tax_income(&self, income_tax_rate: f64) -> f64 {
        self.gross_income - self.taxable_income * income_tax_rate
    }
}
