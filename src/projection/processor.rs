//! One account's transition through one simulated year

use super::totals::YearTotals;
use crate::accounts::{
    AccountId, AccountKind, AccountRegistry, AccountTables, AccountType, ContributionKind,
    EmployerFunding, ExpenseTerms, IncomeTerms, LoanTerms, MortgageTerms, SavingsTerms,
    WithdrawalKind, YearWindow,
};
use crate::assumptions::Assumptions;
use crate::error::{Diagnostic, DiagnosticKind, ProjectionError, Severity};

/// Amounts computed for one account in one year
///
/// Debt balances are negative: interest makes them more negative and
/// payments move them back toward zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountYear {
    pub opening_balance: f64,
    pub earnings: f64,
    pub interest: f64,
    pub contribution: f64,
    pub employer_match: f64,
    pub payment: f64,
    pub withdrawal: f64,
    /// Expense before any HSA offset
    pub gross_expense: f64,
    /// Expense left after the HSA offset, applied to this account
    pub expense: f64,
    pub escrow: f64,
    pub insurance: f64,
    /// Healthcare expense paid from a linked HSA
    pub hsa_draw: Option<(AccountId, f64)>,
    pub closing_balance: f64,
}

/// Applies the per-year account rules for one projection run
pub struct YearProcessor<'a> {
    assumptions: &'a Assumptions,
    strict: bool,
}

/// Context for diagnostics raised while computing one account-year
struct Scope<'d> {
    account: &'d str,
    year: u32,
    diagnostics: &'d mut Vec<Diagnostic>,
}

impl Scope<'_> {
    /// Negative amounts are anomalies: record a warning and use zero
    fn non_negative(&mut self, value: f64, kind: fn(f64) -> DiagnosticKind) -> f64 {
        if value < 0.0 {
            self.record(Severity::Warning, kind(value));
            0.0
        } else {
            value
        }
    }

    fn record(&mut self, severity: Severity, kind: DiagnosticKind) {
        let diagnostic = Diagnostic {
            account: self.account.to_string(),
            year: self.year,
            severity,
            kind,
        };
        match severity {
            Severity::Warning => log::warn!("{diagnostic}"),
            Severity::Error => log::error!("{diagnostic}"),
        }
        self.diagnostics.push(diagnostic);
    }
}

impl<'a> YearProcessor<'a> {
    pub fn new(assumptions: &'a Assumptions, strict: bool) -> Self {
        Self { assumptions, strict }
    }

    /// Compute, record and post one account's year
    pub fn process(
        &self,
        id: AccountId,
        registry: &mut AccountRegistry,
        totals: &mut YearTotals,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<AccountYear, ProjectionError> {
        let step = self.compute(id, registry, totals, diagnostics)?;
        record(id, &step, registry, totals.year_index);
        post(id, &step, registry, totals);
        Ok(step)
    }

    /// Compute one account's year from the registry and this year's totals so far
    pub fn compute(
        &self,
        id: AccountId,
        registry: &AccountRegistry,
        totals: &YearTotals,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<AccountYear, ProjectionError> {
        let entry = registry.get(id);
        let opening = registry.balance(id, totals.year_index);
        let mut step = AccountYear {
            opening_balance: opening,
            ..Default::default()
        };
        let mut scope = Scope {
            account: &entry.definition.name,
            year: totals.year,
            diagnostics,
        };

        step.closing_balance = match &entry.definition.kind {
            AccountKind::Income(terms) => self.income(terms, totals, &mut step),
            AccountKind::Retirement(terms)
            | AccountKind::College(terms)
            | AccountKind::Savings(terms)
            | AccountKind::Hsa(terms) => {
                self.savings(id, terms, registry, totals, &mut scope, &mut step)?
            }
            AccountKind::Expense(terms) => {
                self.expense(terms, registry, totals, &mut scope, &mut step)
            }
            AccountKind::Loan(terms) => self.loan(terms, totals, &mut scope, &mut step),
            AccountKind::Mortgage(terms) => self.mortgage(terms, totals, &mut scope, &mut step),
        };

        Ok(step)
    }

    fn income(&self, terms: &IncomeTerms, totals: &YearTotals, step: &mut AccountYear) -> f64 {
        if let Some((start, end)) = terms.active.resolve(self.assumptions) {
            if (start..=end).contains(&totals.year) {
                let years_active = (totals.year - start) as i32;
                step.earnings = terms.base * (1.0 + terms.raise_rate).powi(years_active);
            }
        }
        step.opening_balance + step.earnings
    }

    fn savings(
        &self,
        id: AccountId,
        terms: &SavingsTerms,
        registry: &AccountRegistry,
        totals: &YearTotals,
        scope: &mut Scope<'_>,
        step: &mut AccountYear,
    ) -> Result<f64, ProjectionError> {
        let y = totals.year_index;
        let mut balance = step.opening_balance;

        step.earnings = balance * terms.yearly_return;
        balance += step.earnings;

        let active = |window: YearWindow| window.contains(totals.year, self.assumptions);

        if let Some(contribution) = terms.contribution.filter(|c| active(c.window)) {
            let raw = match contribution.kind {
                ContributionKind::Fixed(value) => value,
                ContributionKind::FixedWithInflation(value) => {
                    value * self.assumptions.inflation_factor(y)
                }
                ContributionKind::PercentOfIncome(fraction) => match terms.income_link {
                    Some(income) => registry.balance(income, y) * fraction,
                    None => totals.taxable_income * fraction,
                },
            };
            step.contribution = scope.non_negative(raw, DiagnosticKind::NegativeContribution);
            balance += step.contribution;

            step.employer_match = match (terms.employer, terms.income_link) {
                (Some(EmployerFunding::Match(tiers)), Some(income)) => {
                    tiers.employer_match(step.contribution, registry.balance(income, y))
                }
                (Some(EmployerFunding::Contribution(amount)), _)
                    if totals.year < self.assumptions.year_retire() =>
                {
                    amount.value(y, self.assumptions)
                }
                _ => 0.0,
            };
            balance += step.employer_match;
        }

        if let Some(withdrawal) = terms.withdrawal.filter(|w| active(w.window)) {
            let raw = match withdrawal.kind {
                WithdrawalKind::Fixed(value) => value,
                WithdrawalKind::FixedWithInflation(value) => {
                    value * self.assumptions.inflation_factor(y)
                }
                WithdrawalKind::EndAtZero => {
                    let remaining = withdrawal
                        .window
                        .remaining_years(totals.year, self.assumptions);
                    balance / remaining as f64
                }
                WithdrawalKind::ColFractionOfSavings => match totals.prior_total_savings() {
                    Some(total_savings) => {
                        let prior = registry.balance(id, y - 1);
                        if prior > 0.0 && total_savings > 0.0 {
                            let share = totals.total_expenses() * prior / total_savings;
                            if terms.tax_status.is_some_and(|s| s.taxes_withdrawals()) {
                                share * (1.0 + self.assumptions.income_tax_rate)
                            } else {
                                share
                            }
                        } else {
                            0.0
                        }
                    }
                    None if self.strict => {
                        return Err(ProjectionError::InsufficientHistory {
                            account: scope.account.to_string(),
                            year: scope.year,
                        });
                    }
                    None => {
                        scope.record(Severity::Error, DiagnosticKind::InsufficientHistory);
                        0.0
                    }
                },
            };
            step.withdrawal = scope
                .non_negative(raw, DiagnosticKind::NegativeWithdrawal)
                .min(balance.max(0.0));
            balance -= step.withdrawal;
        }

        Ok(balance)
    }

    fn expense(
        &self,
        terms: &ExpenseTerms,
        registry: &AccountRegistry,
        totals: &YearTotals,
        scope: &mut Scope<'_>,
        step: &mut AccountYear,
    ) -> f64 {
        if terms.expense.window.contains(totals.year, self.assumptions) {
            let mut raw = terms.expense.amount.value(totals.year_index, self.assumptions);
            if self.assumptions.is_retired(totals.year) {
                raw *= self.assumptions.retirement_cost_of_living;
            }
            step.gross_expense = scope.non_negative(raw, DiagnosticKind::NegativeExpense);
        }

        step.expense = step.gross_expense;
        if let Some(hsa) = terms.hsa_link {
            let available = registry.balance(hsa, totals.year_index).max(0.0);
            let draw = step.expense.min(available);
            if draw > 0.0 {
                step.hsa_draw = Some((hsa, draw));
                step.expense -= draw;
            }
        }

        step.opening_balance + step.expense
    }

    fn loan(
        &self,
        terms: &LoanTerms,
        totals: &YearTotals,
        scope: &mut Scope<'_>,
        step: &mut AccountYear,
    ) -> f64 {
        let mut balance = step.opening_balance;
        step.interest = balance * terms.rate;
        balance += step.interest;

        if let Some(payment) = terms
            .payment
            .filter(|p| p.window.contains(totals.year, self.assumptions))
        {
            let raw = payment.amount.value(totals.year_index, self.assumptions);
            let owed = (-balance).max(0.0);
            step.payment = scope.non_negative(raw, DiagnosticKind::NegativePayment).min(owed);
            balance += step.payment;
        }

        balance
    }

    /// Escrow and insurance come out of the yearly payment first; the rest
    /// goes to principal, so dropping insurance pays the loan down faster.
    fn mortgage(
        &self,
        terms: &MortgageTerms,
        totals: &YearTotals,
        scope: &mut Scope<'_>,
        step: &mut AccountYear,
    ) -> f64 {
        let mut balance = step.opening_balance;
        let insured = terms.requires_insurance(balance);
        step.interest = terms.yearly_interest(balance);
        balance += step.interest;

        if let Some(payment) = terms
            .payment
            .filter(|p| p.window.contains(totals.year, self.assumptions))
        {
            let owed = (-balance).max(0.0);
            if owed > 0.0 {
                let raw = payment.amount.value(totals.year_index, self.assumptions);
                let total = scope.non_negative(raw, DiagnosticKind::NegativePayment);
                step.escrow = terms.escrow.min(total);
                step.insurance = if insured {
                    terms.insurance.min(total - step.escrow)
                } else {
                    0.0
                };
                let principal = (total - step.escrow - step.insurance).min(owed);
                balance += principal;
                step.payment = principal + step.escrow + step.insurance;
            }
        }

        balance
    }
}

fn set(series: &mut Option<Vec<f64>>, year_index: usize, value: f64) {
    if let Some(values) = series.as_mut() {
        values[year_index] = value;
    }
}

/// Write the step into the account's tables (and the linked HSA's)
fn record(id: AccountId, step: &AccountYear, registry: &mut AccountRegistry, y: usize) {
    let tables: &mut AccountTables = &mut registry.get_mut(id).tables;
    tables.balance[y] = step.closing_balance;
    set(&mut tables.earnings, y, step.earnings);
    set(&mut tables.interest, y, step.interest);
    set(&mut tables.contribution, y, step.contribution);
    set(&mut tables.employer_match, y, step.employer_match);
    set(&mut tables.withdrawal, y, step.withdrawal);
    set(&mut tables.payment, y, step.payment);
    set(&mut tables.escrow, y, step.escrow);
    set(&mut tables.insurance, y, step.insurance);
    set(&mut tables.expense, y, step.expense);

    if let Some((hsa, draw)) = step.hsa_draw {
        let hsa_tables = &mut registry.get_mut(hsa).tables;
        hsa_tables.balance[y] -= draw;
        if let Some(withdrawals) = hsa_tables.withdrawal.as_mut() {
            withdrawals[y] += draw;
        }
    }
}

/// Post the step's effect on this year's aggregate totals
fn post(id: AccountId, step: &AccountYear, registry: &AccountRegistry, totals: &mut YearTotals) {
    let kind = &registry.get(id).definition.kind;
    let account_type = kind.account_type();
    let tax_status = kind.tax_status();

    if account_type == AccountType::Income {
        totals.gross_income += step.closing_balance;
        totals.taxable_income += step.closing_balance;
    }

    if tax_status.is_some_and(|s| s.is_pretax()) {
        totals.taxable_income -= step.contribution + step.gross_expense;
    }

    // College withdrawals go to the student, not to household income
    if step.withdrawal > 0.0 && account_type != AccountType::College {
        totals.gross_income += step.withdrawal;
        if tax_status.is_some_and(|s| s.taxes_withdrawals()) {
            totals.taxable_income += step.withdrawal;
        }
    }

    match account_type {
        AccountType::Expense => totals.post_expense(id, step.expense),
        AccountType::Loan | AccountType::Mortgage => totals.post_expense(id, step.payment),
        AccountType::College
        | AccountType::Savings
        | AccountType::Retirement
        | AccountType::Hsa => totals.post_expense(id, step.contribution),
        AccountType::Income => {}
    }

    if account_type.counts_as_savings() {
        totals.total_savings += step.closing_balance;
    }
}
