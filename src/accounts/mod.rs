//! Account definitions, loading, and the per-run registry

mod data;
pub mod loader;
mod registry;

pub use data::{
    AccountDefinition, AccountId, AccountKind, AccountType, Amount, Contribution, ContributionKind,
    EmployerFunding, ExpenseTerms, IncomeTerms, LoanTerms, MatchTier, MatchTiers, MortgageTerms,
    Scheduled, SavingsTerms, TaxStatus, Withdrawal, WithdrawalKind, YearAnchor, YearInput,
    YearWindow,
};
pub use loader::{load_accounts, load_accounts_from_reader, resolve_accounts, RawAccount};
pub use registry::{AccountEntry, AccountRegistry, AccountTables};
