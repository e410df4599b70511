//! Account registry: static definitions plus per-year derived tables

use super::data::{AccountDefinition, AccountId, AccountKind, AccountType, EmployerFunding};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Year-indexed tables for one account
///
/// Optional series exist only for the account kinds and policies that use them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountTables {
    pub balance: Vec<f64>,
    pub earnings: Option<Vec<f64>>,
    pub interest: Option<Vec<f64>>,
    pub contribution: Option<Vec<f64>>,
    pub employer_match: Option<Vec<f64>>,
    pub withdrawal: Option<Vec<f64>>,
    pub payment: Option<Vec<f64>>,
    pub escrow: Option<Vec<f64>>,
    pub insurance: Option<Vec<f64>>,
    pub expense: Option<Vec<f64>>,
}

impl AccountTables {
    /// Size every applicable table for `definition`
    pub fn for_definition(definition: &AccountDefinition, num_years: usize) -> Self {
        let series = |present: bool| present.then(|| vec![0.0; num_years]);
        let account_type = definition.account_type();
        let savings = definition.kind.savings_terms();

        let mut balance = vec![0.0; num_years];
        if let Some(first) = balance.first_mut() {
            *first = definition.starting_balance;
        }

        Self {
            balance,
            earnings: series(account_type.is_interest_bearing()),
            interest: series(account_type.is_debt()),
            contribution: series(savings.is_some_and(|t| t.contribution.is_some())),
            employer_match: series(savings.is_some_and(|t| t.employer.is_some())),
            withdrawal: series(savings.is_some()),
            payment: series(definition.kind.payment().is_some()),
            escrow: series(account_type == AccountType::Mortgage),
            insurance: series(account_type == AccountType::Mortgage),
            expense: series(account_type == AccountType::Expense),
        }
    }
}

/// One registered account
#[derive(Debug, Clone, PartialEq)]
pub struct AccountEntry {
    pub definition: AccountDefinition,
    pub tables: AccountTables,
}

/// Holds every account for the length of one projection run
#[derive(Debug, Clone)]
pub struct AccountRegistry {
    entries: Vec<AccountEntry>,
}

impl AccountRegistry {
    /// Validate links and balances, then size tables
    pub fn new(definitions: Vec<AccountDefinition>, num_years: usize) -> Result<Self, ConfigError> {
        for definition in &definitions {
            validate(definition, &definitions)?;
        }

        let entries = definitions
            .into_iter()
            .map(|definition| {
                let tables = AccountTables::for_definition(&definition, num_years);
                AccountEntry { definition, tables }
            })
            .collect();

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: AccountId) -> &AccountEntry {
        &self.entries[id.index()]
    }

    pub fn get_mut(&mut self, id: AccountId) -> &mut AccountEntry {
        &mut self.entries[id.index()]
    }

    pub fn into_entries(self) -> Vec<AccountEntry> {
        self.entries
    }

    /// Balance of an account at a year index
    pub fn balance(&self, id: AccountId, year_index: usize) -> f64 {
        self.entries[id.index()].tables.balance[year_index]
    }

    /// Apply the carry-forward rule for every account
    ///
    /// Flow accounts (income, expense) restart at zero; all others begin the
    /// year at last year's closing balance. Year 0 keeps the starting values.
    pub fn open_year(&mut self, year_index: usize) {
        for entry in &mut self.entries {
            let balance = &mut entry.tables.balance;
            if entry.definition.account_type().is_flow() {
                balance[year_index] = 0.0;
            } else if year_index > 0 {
                balance[year_index] = balance[year_index - 1];
            }
        }
    }
}

fn validate(
    definition: &AccountDefinition,
    definitions: &[AccountDefinition],
) -> Result<(), ConfigError> {
    definition.validate_balance()?;

    let check = |link: AccountId, expected: AccountType| -> Result<(), ConfigError> {
        match definitions.get(link.index()) {
            None => Err(ConfigError::UnknownLink {
                account: definition.name.clone(),
                link: format!("#{}", link.index()),
            }),
            Some(target) if target.account_type() != expected => {
                Err(ConfigError::InvalidLinkTarget {
                    account: definition.name.clone(),
                    link: target.name.clone(),
                    expected: expected.as_str(),
                })
            }
            Some(_) => Ok(()),
        }
    };

    match &definition.kind {
        AccountKind::Expense(terms) => {
            if let Some(hsa) = terms.hsa_link {
                check(hsa, AccountType::Hsa)?;
            }
        }
        kind => {
            if let Some(terms) = kind.savings_terms() {
                match terms.income_link {
                    Some(income) => check(income, AccountType::Income)?,
                    None if matches!(terms.employer, Some(EmployerFunding::Match(_))) => {
                        return Err(ConfigError::MatchWithoutIncomeLink(definition.name.clone()));
                    }
                    None => {}
                }
            }
        }
    }

    Ok(())
}
