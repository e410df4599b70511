//! Typed account definitions
//!
//! Each account kind carries only the policy fields its yearly computation
//! reads. Links to other accounts are `AccountId`s resolved through the
//! registry.

use crate::assumptions::Assumptions;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable account identifier (position in definition order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub usize);

impl AccountId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Account type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    Income,
    Retirement,
    College,
    Expense,
    Loan,
    Mortgage,
    Savings,
    Hsa,
}

impl AccountType {
    /// Type priority used to order accounts within a year
    pub const PROCESSING_ORDER: [AccountType; 8] = [
        AccountType::Income,
        AccountType::Hsa,
        AccountType::Expense,
        AccountType::Mortgage,
        AccountType::Loan,
        AccountType::College,
        AccountType::Retirement,
        AccountType::Savings,
    ];

    /// Parse the lowercase label used in account files
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "income" => Some(AccountType::Income),
            "retirement" => Some(AccountType::Retirement),
            "college" => Some(AccountType::College),
            "expense" => Some(AccountType::Expense),
            "loan" => Some(AccountType::Loan),
            "mortgage" => Some(AccountType::Mortgage),
            "savings" => Some(AccountType::Savings),
            "hsa" => Some(AccountType::Hsa),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Income => "income",
            AccountType::Retirement => "retirement",
            AccountType::College => "college",
            AccountType::Expense => "expense",
            AccountType::Loan => "loan",
            AccountType::Mortgage => "mortgage",
            AccountType::Savings => "savings",
            AccountType::Hsa => "hsa",
        }
    }

    /// Flow accounts start every year at zero instead of carrying a balance
    pub fn is_flow(&self) -> bool {
        matches!(self, AccountType::Income | AccountType::Expense)
    }

    /// Debt balances are negative (amount owed)
    pub fn is_debt(&self) -> bool {
        matches!(self, AccountType::Loan | AccountType::Mortgage)
    }

    /// Accounts whose balance earns a yearly return
    pub fn is_interest_bearing(&self) -> bool {
        matches!(
            self,
            AccountType::Savings | AccountType::College | AccountType::Retirement | AccountType::Hsa
        )
    }

    /// Accounts counted in the total-savings aggregate
    pub fn counts_as_savings(&self) -> bool {
        matches!(self, AccountType::Savings | AccountType::Retirement)
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference year a relative year input is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearAnchor {
    YearStart,
    YearRetire,
    YearDie,
}

impl YearAnchor {
    pub fn year(&self, assumptions: &Assumptions) -> u32 {
        match self {
            YearAnchor::YearStart => assumptions.year_start,
            YearAnchor::YearRetire => assumptions.year_retire(),
            YearAnchor::YearDie => assumptions.year_die(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            YearAnchor::YearStart => "year_start",
            YearAnchor::YearRetire => "year_retire",
            YearAnchor::YearDie => "year_die",
        }
    }
}

/// A calendar year given directly or relative to the run's assumptions
///
/// In account files: `2030`, `"year_retire"`, or
/// `{"base": "year_retire", "delta": -1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum YearInput {
    Offset { base: YearAnchor, delta: i32 },
    Anchor(YearAnchor),
    Year(u32),
}

impl YearInput {
    /// Calendar year under `assumptions`, `None` if it falls outside `u32`
    pub fn resolve(&self, assumptions: &Assumptions) -> Option<u32> {
        match *self {
            YearInput::Year(year) => Some(year),
            YearInput::Anchor(base) => Some(base.year(assumptions)),
            YearInput::Offset { base, delta } => {
                u32::try_from(i64::from(base.year(assumptions)) + i64::from(delta)).ok()
            }
        }
    }
}

impl fmt::Display for YearInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearInput::Year(year) => write!(f, "{year}"),
            YearInput::Anchor(base) => f.write_str(base.as_str()),
            YearInput::Offset { base, delta } => write!(f, "{}{delta:+}", base.as_str()),
        }
    }
}

/// Inclusive range of years
///
/// Bounds may be relative, so membership is always asked against a set of
/// assumptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearWindow {
    pub start: YearInput,
    pub end: YearInput,
}

impl YearWindow {
    /// Window between two fixed calendar years
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start: YearInput::Year(start),
            end: YearInput::Year(end),
        }
    }

    pub fn between(start: YearInput, end: YearInput) -> Self {
        Self { start, end }
    }

    /// Calendar bounds under `assumptions`
    pub fn resolve(&self, assumptions: &Assumptions) -> Option<(u32, u32)> {
        Some((self.start.resolve(assumptions)?, self.end.resolve(assumptions)?))
    }

    pub fn contains(&self, year: u32, assumptions: &Assumptions) -> bool {
        self.resolve(assumptions)
            .is_some_and(|(start, end)| start <= year && year <= end)
    }

    /// Years left in the window counting `year` itself
    pub fn remaining_years(&self, year: u32, assumptions: &Assumptions) -> u32 {
        match self.resolve(assumptions) {
            Some((_, end)) if year <= end => end - year + 1,
            _ => 0,
        }
    }
}

impl fmt::Display for YearWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// A dollar amount, optionally grown by inflation from the simulation start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Amount {
    Fixed(f64),
    FixedWithInflation(f64),
}

impl Amount {
    pub fn value(&self, year_index: usize, assumptions: &Assumptions) -> f64 {
        match *self {
            Amount::Fixed(v) => v,
            Amount::FixedWithInflation(v) => v * assumptions.inflation_factor(year_index),
        }
    }
}

/// Amount paid into an account each year
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ContributionKind {
    Fixed(f64),
    FixedWithInflation(f64),
    /// Fraction of the linked income, or of taxable income without a link
    PercentOfIncome(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub kind: ContributionKind,
    pub window: YearWindow,
}

/// How money is drawn out of a savings-type account
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WithdrawalKind {
    Fixed(f64),
    FixedWithInflation(f64),
    /// Equal drawdown reaching zero at the end of the window
    EndAtZero,
    /// This year's expenses times the account's share of total savings
    ColFractionOfSavings,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub kind: WithdrawalKind,
    pub window: YearWindow,
}

/// Payment or expense amount active within a window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scheduled {
    pub amount: Amount,
    pub window: YearWindow,
}

/// Tax treatment of contributions, earnings and withdrawals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaxStatus {
    /// Code 0: paid with taxed income, earnings deferred, withdrawals untaxed
    TaxedContributionDeferredEarnings,
    /// Code 1: paid with taxed income, earnings taxed as earned, withdrawals untaxed
    TaxedContributionTaxedEarnings,
    /// Code 3: paid pretax, withdrawals taxed as income
    PretaxContributionTaxedWithdrawal,
    /// Code 4: paid pretax, withdrawals untaxed (health savings)
    PretaxContributionUntaxedWithdrawal,
}

impl TaxStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(TaxStatus::TaxedContributionDeferredEarnings),
            1 => Some(TaxStatus::TaxedContributionTaxedEarnings),
            3 => Some(TaxStatus::PretaxContributionTaxedWithdrawal),
            4 => Some(TaxStatus::PretaxContributionUntaxedWithdrawal),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            TaxStatus::TaxedContributionDeferredEarnings => 0,
            TaxStatus::TaxedContributionTaxedEarnings => 1,
            TaxStatus::PretaxContributionTaxedWithdrawal => 3,
            TaxStatus::PretaxContributionUntaxedWithdrawal => 4,
        }
    }

    /// Contributions (and qualifying expenses) are deducted from taxable income
    pub fn is_pretax(&self) -> bool {
        matches!(
            self,
            TaxStatus::PretaxContributionTaxedWithdrawal
                | TaxStatus::PretaxContributionUntaxedWithdrawal
        )
    }

    /// Withdrawals count as taxable income
    pub fn taxes_withdrawals(&self) -> bool {
        matches!(self, TaxStatus::PretaxContributionTaxedWithdrawal)
    }
}

/// One employer match level: `rate` of contributions up to `limit` of income
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchTier {
    pub rate: f64,
    pub limit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MatchTiers {
    Single(MatchTier),
    Double(MatchTier, MatchTier),
}

impl MatchTiers {
    /// Employer match for a contribution against the linked income
    pub fn employer_match(&self, contribution: f64, income: f64) -> f64 {
        if income <= 0.0 {
            return 0.0;
        }
        match *self {
            MatchTiers::Single(first) => {
                if contribution >= first.limit * income {
                    income * first.rate * first.limit
                } else {
                    contribution * first.rate
                }
            }
            MatchTiers::Double(first, second) => {
                if contribution >= (first.limit + second.limit) * income {
                    income * (first.rate * first.limit + second.rate * second.limit)
                } else if contribution >= first.limit * income {
                    let above_first = contribution / income - first.limit;
                    income * (first.rate * first.limit + second.rate * above_first)
                } else {
                    contribution * first.rate
                }
            }
        }
    }
}

/// Money the employer adds to a savings-type account
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EmployerFunding {
    /// Match on the employee contribution (requires an income link)
    Match(MatchTiers),
    /// Flat contribution paid while working
    Contribution(Amount),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeTerms {
    /// Income in the first active year
    pub base: f64,
    /// Yearly raise, compounded from `active.start`
    pub raise_rate: f64,
    pub active: YearWindow,
}

/// Terms shared by savings, retirement, college and HSA accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsTerms {
    pub yearly_return: f64,
    pub contribution: Option<Contribution>,
    pub employer: Option<EmployerFunding>,
    pub withdrawal: Option<Withdrawal>,
    pub tax_status: Option<TaxStatus>,
    pub income_link: Option<AccountId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseTerms {
    pub expense: Scheduled,
    pub tax_status: Option<TaxStatus>,
    /// Healthcare expenses are paid from this HSA first
    pub hsa_link: Option<AccountId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub rate: f64,
    pub payment: Option<Scheduled>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MortgageTerms {
    /// Annual percentage rate
    pub rate: f64,
    /// Compounding periods per year (12 = monthly)
    pub compound_periods: u32,
    pub home_value: f64,
    /// Loan-to-value fraction below which insurance stops
    pub ltv_limit: f64,
    /// Yearly mortgage insurance
    pub insurance: f64,
    /// Yearly escrow (property tax), constant
    pub escrow: f64,
    /// Total yearly payment including escrow and insurance
    pub payment: Option<Scheduled>,
}

impl MortgageTerms {
    /// Interest accrued over one year on a (negative) balance
    pub fn yearly_interest(&self, balance: f64) -> f64 {
        let periods = self.compound_periods.max(1);
        let periodic = self.rate / periods as f64;
        balance * ((1.0 + periodic).powi(periods as i32) - 1.0)
    }

    /// Whether the amount owed is above the insurance cutoff
    pub fn requires_insurance(&self, balance: f64) -> bool {
        self.home_value > 0.0 && -balance / self.home_value > self.ltv_limit
    }
}

/// Kind-specific account terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AccountKind {
    Income(IncomeTerms),
    Retirement(SavingsTerms),
    College(SavingsTerms),
    Savings(SavingsTerms),
    Hsa(SavingsTerms),
    Expense(ExpenseTerms),
    Loan(LoanTerms),
    Mortgage(MortgageTerms),
}

impl AccountKind {
    pub fn account_type(&self) -> AccountType {
        match self {
            AccountKind::Income(_) => AccountType::Income,
            AccountKind::Retirement(_) => AccountType::Retirement,
            AccountKind::College(_) => AccountType::College,
            AccountKind::Savings(_) => AccountType::Savings,
            AccountKind::Hsa(_) => AccountType::Hsa,
            AccountKind::Expense(_) => AccountType::Expense,
            AccountKind::Loan(_) => AccountType::Loan,
            AccountKind::Mortgage(_) => AccountType::Mortgage,
        }
    }

    pub fn savings_terms(&self) -> Option<&SavingsTerms> {
        match self {
            AccountKind::Retirement(t)
            | AccountKind::College(t)
            | AccountKind::Savings(t)
            | AccountKind::Hsa(t) => Some(t),
            _ => None,
        }
    }

    pub fn tax_status(&self) -> Option<TaxStatus> {
        match self {
            AccountKind::Expense(t) => t.tax_status,
            other => other.savings_terms().and_then(|t| t.tax_status),
        }
    }

    /// Payment policy for debt accounts
    pub fn payment(&self) -> Option<&Scheduled> {
        match self {
            AccountKind::Loan(t) => t.payment.as_ref(),
            AccountKind::Mortgage(t) => t.payment.as_ref(),
            _ => None,
        }
    }

    /// Every year window the terms use
    pub fn windows(&self) -> Vec<YearWindow> {
        match self {
            AccountKind::Income(t) => vec![t.active],
            AccountKind::Expense(t) => vec![t.expense.window],
            AccountKind::Loan(_) | AccountKind::Mortgage(_) => {
                self.payment().map(|p| p.window).into_iter().collect()
            }
            AccountKind::Retirement(t)
            | AccountKind::College(t)
            | AccountKind::Savings(t)
            | AccountKind::Hsa(t) => t
                .contribution
                .map(|c| c.window)
                .into_iter()
                .chain(t.withdrawal.map(|w| w.window))
                .collect(),
        }
    }
}

/// Static definition of one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountDefinition {
    pub name: String,
    /// Balance at the start of the first year (negative for debt)
    pub starting_balance: f64,
    pub kind: AccountKind,
}

impl AccountDefinition {
    pub fn new(name: impl Into<String>, starting_balance: f64, kind: AccountKind) -> Self {
        Self {
            name: name.into(),
            starting_balance,
            kind,
        }
    }

    pub fn account_type(&self) -> AccountType {
        self.kind.account_type()
    }

    /// Loans and mortgages are owed money, so they start at or below zero
    pub fn validate_balance(&self) -> Result<(), ConfigError> {
        if self.account_type().is_debt() && self.starting_balance > 0.0 {
            return Err(ConfigError::InvalidDebtBalance {
                account: self.name.clone(),
                balance: self.starting_balance,
            });
        }
        Ok(())
    }

    /// Every window must resolve to a non-empty calendar range
    pub fn validate_windows(&self, assumptions: &Assumptions) -> Result<(), ConfigError> {
        for window in self.kind.windows() {
            match window.resolve(assumptions) {
                Some((start, end)) if start <= end => {}
                _ => {
                    return Err(ConfigError::InvalidWindow {
                        account: self.name.clone(),
                        window: window.to_string(),
                    })
                }
            }
        }
        Ok(())
    }
}
