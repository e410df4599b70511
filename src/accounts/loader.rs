//! Load account definitions from a JSON file
//!
//! The file is an array of flat records. Fields that do not apply to an
//! account's type are ignored; fields the type needs are required.

use super::data::*;
use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::io::Read;
use std::path::Path;

/// Default path to the account definitions file
pub const DEFAULT_ACCOUNTS_PATH: &str = "data/accounts.json";

/// Raw JSON record as written by hand
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawAccount {
    #[serde(rename = "type")]
    pub account_type: String,
    pub name: String,
    /// Starting balance, negative for loans and mortgages
    pub balance: f64,

    /// Years money flows in: a calendar year, `"year_start"`,
    /// `"year_retire"`, `"year_die"`, or `{"base": ..., "delta": ...}`
    pub start_in: Option<YearInput>,
    pub end_in: Option<YearInput>,
    /// Years money flows out, same forms as `start_in`
    pub start_out: Option<YearInput>,
    pub end_out: Option<YearInput>,

    // Income
    pub base: Option<f64>,
    pub raise: Option<f64>,

    // Savings-type accounts
    pub yearly_return: Option<f64>,
    pub contribution_type: Option<String>,
    pub yearly_contribution: Option<f64>,
    pub withdrawal_type: Option<String>,
    pub withdrawal_value: Option<f64>,
    pub tax_status: Option<u8>,
    pub income_link: Option<String>,
    pub employer_match: Vec<f64>,
    pub match_limit: Vec<f64>,
    pub employer_contribution: Option<f64>,
    pub employer_contribution_type: Option<String>,

    // Loans and mortgages
    pub rate: Option<f64>,
    pub payment_type: Option<String>,
    pub payment_value: Option<f64>,
    pub compound_time: Option<u32>,
    pub value: Option<f64>,
    pub ltv_limit: Option<f64>,
    pub mortgage_insurance: Option<f64>,
    pub escrow: Option<f64>,

    // Expenses
    pub expense_type: Option<String>,
    pub expense_value: Option<f64>,
    pub is_healthcare: bool,
    pub hsa_link: Option<String>,
}

impl RawAccount {
    /// Convert to a typed definition, resolving links through `ids`
    pub fn to_definition(
        &self,
        ids: &HashMap<&str, AccountId>,
    ) -> Result<AccountDefinition, ConfigError> {
        let account_type = AccountType::from_label(&self.account_type).ok_or_else(|| {
            ConfigError::UnknownAccountType {
                account: self.name.clone(),
                code: self.account_type.clone(),
            }
        })?;

        let kind = match account_type {
            AccountType::Income => AccountKind::Income(IncomeTerms {
                base: self.required(self.base, "base")?,
                raise_rate: self.raise.unwrap_or(0.0),
                active: self.window_in()?,
            }),
            AccountType::Retirement => AccountKind::Retirement(self.savings_terms(ids)?),
            AccountType::College => AccountKind::College(self.savings_terms(ids)?),
            AccountType::Savings => AccountKind::Savings(self.savings_terms(ids)?),
            AccountType::Hsa => AccountKind::Hsa(self.savings_terms(ids)?),
            AccountType::Expense => AccountKind::Expense(ExpenseTerms {
                expense: Scheduled {
                    amount: self.amount(
                        "expense_type",
                        self.expense_type.as_deref(),
                        self.expense_value,
                        "expense_value",
                    )?,
                    window: self.window_out()?,
                },
                tax_status: self.tax_status()?,
                hsa_link: match (self.is_healthcare, self.hsa_link.as_deref()) {
                    (false, Some(_)) => {
                        return Err(ConfigError::HsaLinkWithoutHealthcare(self.name.clone()))
                    }
                    (_, link) => self.link(ids, link)?,
                },
            }),
            AccountType::Loan => AccountKind::Loan(LoanTerms {
                rate: self.non_negative(self.required(self.rate, "rate")?, "rate")?,
                payment: self.payment()?,
            }),
            AccountType::Mortgage => AccountKind::Mortgage(MortgageTerms {
                rate: self.non_negative(self.required(self.rate, "rate")?, "rate")?,
                compound_periods: self.compound_time.unwrap_or(12),
                home_value: self.non_negative(self.required(self.value, "value")?, "value")?,
                ltv_limit: self.non_negative(self.ltv_limit.unwrap_or(0.0), "ltv_limit")?,
                insurance: self.non_negative(
                    self.mortgage_insurance.unwrap_or(0.0),
                    "mortgage_insurance",
                )?,
                escrow: self.non_negative(self.escrow.unwrap_or(0.0), "escrow")?,
                payment: self.payment()?,
            }),
        };

        let definition = AccountDefinition::new(self.name.clone(), self.balance, kind);
        definition.validate_balance()?;
        Ok(definition)
    }

    fn savings_terms(&self, ids: &HashMap<&str, AccountId>) -> Result<SavingsTerms, ConfigError> {
        let income_link = self.link(ids, self.income_link.as_deref())?;

        let contribution = match self.contribution_type.as_deref() {
            None => None,
            Some(code) => {
                let value = self.required(self.yearly_contribution, "yearly_contribution")?;
                let kind = match code {
                    "fixed" => ContributionKind::Fixed(value),
                    "fixed_with_inflation" => ContributionKind::FixedWithInflation(value),
                    "percent_of_income" => ContributionKind::PercentOfIncome(value),
                    other => return Err(self.unsupported("contribution_type", other)),
                };
                Some(Contribution {
                    kind,
                    window: self.window_in()?,
                })
            }
        };

        let employer = if !self.employer_match.is_empty() || !self.match_limit.is_empty() {
            if income_link.is_none() {
                return Err(ConfigError::MatchWithoutIncomeLink(self.name.clone()));
            }
            Some(EmployerFunding::Match(self.match_tiers()?))
        } else if let Some(value) = self.employer_contribution {
            let code = self.employer_contribution_type.as_deref().unwrap_or("fixed");
            Some(EmployerFunding::Contribution(self.amount(
                "employer_contribution_type",
                Some(code),
                Some(value),
                "employer_contribution",
            )?))
        } else {
            None
        };

        let withdrawal = match self.withdrawal_type.as_deref() {
            None => None,
            Some(code) => {
                let kind = match code {
                    "fixed" => WithdrawalKind::Fixed(
                        self.required(self.withdrawal_value, "withdrawal_value")?,
                    ),
                    "fixed_with_inflation" => WithdrawalKind::FixedWithInflation(
                        self.required(self.withdrawal_value, "withdrawal_value")?,
                    ),
                    "end_at_zero" => WithdrawalKind::EndAtZero,
                    "col_fraction_of_total_savings" => WithdrawalKind::ColFractionOfSavings,
                    other => return Err(self.unsupported("withdrawal_type", other)),
                };
                Some(Withdrawal {
                    kind,
                    window: self.window_out()?,
                })
            }
        };

        Ok(SavingsTerms {
            yearly_return: self.yearly_return.unwrap_or(0.0),
            contribution,
            employer,
            withdrawal,
            tax_status: self.tax_status()?,
            income_link,
        })
    }

    fn match_tiers(&self) -> Result<MatchTiers, ConfigError> {
        let tier = |i: usize| MatchTier {
            rate: self.employer_match[i],
            limit: self.match_limit[i],
        };
        match (self.employer_match.len(), self.match_limit.len()) {
            (1, 1) => Ok(MatchTiers::Single(tier(0))),
            (2, 2) => Ok(MatchTiers::Double(tier(0), tier(1))),
            (rates, limits) => Err(ConfigError::InvalidMatchTiers {
                account: self.name.clone(),
                rates,
                limits,
            }),
        }
    }

    fn payment(&self) -> Result<Option<Scheduled>, ConfigError> {
        match self.payment_type.as_deref() {
            None => Ok(None),
            Some(code) => Ok(Some(Scheduled {
                amount: self.amount(
                    "payment_type",
                    Some(code),
                    self.payment_value,
                    "payment_value",
                )?,
                window: self.window_out()?,
            })),
        }
    }

    fn amount(
        &self,
        type_field: &'static str,
        code: Option<&str>,
        value: Option<f64>,
        value_field: &'static str,
    ) -> Result<Amount, ConfigError> {
        let code = code.ok_or_else(|| self.missing(type_field))?;
        match code {
            "fixed" => Ok(Amount::Fixed(self.required(value, value_field)?)),
            "fixed_with_inflation" => {
                Ok(Amount::FixedWithInflation(self.required(value, value_field)?))
            }
            other => Err(self.unsupported(type_field, other)),
        }
    }

    fn tax_status(&self) -> Result<Option<TaxStatus>, ConfigError> {
        match self.tax_status {
            None => Ok(None),
            Some(code) => TaxStatus::from_code(code).map(Some).ok_or_else(|| {
                ConfigError::UnsupportedTaxStatus {
                    account: self.name.clone(),
                    code,
                }
            }),
        }
    }

    fn link(
        &self,
        ids: &HashMap<&str, AccountId>,
        name: Option<&str>,
    ) -> Result<Option<AccountId>, ConfigError> {
        match name {
            None => Ok(None),
            Some(link) => ids
                .get(link)
                .copied()
                .map(Some)
                .ok_or_else(|| ConfigError::UnknownLink {
                    account: self.name.clone(),
                    link: link.to_string(),
                }),
        }
    }

    fn window_in(&self) -> Result<YearWindow, ConfigError> {
        self.window(
            self.required(self.start_in, "start_in")?,
            self.required(self.end_in, "end_in")?,
        )
    }

    fn window_out(&self) -> Result<YearWindow, ConfigError> {
        self.window(
            self.required(self.start_out, "start_out")?,
            self.required(self.end_out, "end_out")?,
        )
    }

    /// Relative bounds are checked once assumptions are known
    fn window(&self, start: YearInput, end: YearInput) -> Result<YearWindow, ConfigError> {
        let window = YearWindow::between(start, end);
        match (start, end) {
            (YearInput::Year(first), YearInput::Year(last)) if first > last => {
                Err(ConfigError::InvalidWindow {
                    account: self.name.clone(),
                    window: window.to_string(),
                })
            }
            _ => Ok(window),
        }
    }

    fn non_negative(&self, value: f64, field: &'static str) -> Result<f64, ConfigError> {
        if value < 0.0 {
            return Err(ConfigError::NegativeValue {
                account: self.name.clone(),
                field,
                value,
            });
        }
        Ok(value)
    }

    fn required<T>(&self, value: Option<T>, field: &'static str) -> Result<T, ConfigError> {
        value.ok_or_else(|| self.missing(field))
    }

    fn missing(&self, field: &'static str) -> ConfigError {
        ConfigError::MissingField {
            account: self.name.clone(),
            field,
        }
    }

    fn unsupported(&self, field: &'static str, code: &str) -> ConfigError {
        ConfigError::UnsupportedPolicyKind {
            account: self.name.clone(),
            field,
            code: code.to_string(),
        }
    }
}

/// Convert raw records to typed definitions, resolving links by name
pub fn resolve_accounts(raw: &[RawAccount]) -> Result<Vec<AccountDefinition>, ConfigError> {
    let mut ids: HashMap<&str, AccountId> = HashMap::new();
    for (index, account) in raw.iter().enumerate() {
        if ids.insert(account.name.as_str(), AccountId(index)).is_some() {
            return Err(ConfigError::DuplicateAccount(account.name.clone()));
        }
    }

    raw.iter().map(|account| account.to_definition(&ids)).collect()
}

/// Load account definitions from a JSON file
pub fn load_accounts<P: AsRef<Path>>(path: P) -> Result<Vec<AccountDefinition>, Box<dyn Error>> {
    let file = std::fs::File::open(path)?;
    load_accounts_from_reader(file)
}

/// Load account definitions from any reader
pub fn load_accounts_from_reader<R: Read>(
    reader: R,
) -> Result<Vec<AccountDefinition>, Box<dyn Error>> {
    let raw: Vec<RawAccount> = serde_json::from_reader(reader)?;
    Ok(resolve_accounts(&raw)?)
}
