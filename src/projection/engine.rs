//! Year-by-year simulation driver

use super::order::processing_order;
use super::processor::YearProcessor;
use super::results::{ProjectionResult, YearSummary};
use super::totals::YearTotals;
use crate::accounts::{AccountDefinition, AccountRegistry};
use crate::assumptions::Assumptions;
use crate::error::ProjectionError;
use log::{debug, info};

/// Configuration for a projection run
#[derive(Debug, Clone, Default)]
pub struct ProjectionConfig {
    /// Abort on a cost-of-living withdrawal that lacks history instead of
    /// recording an error diagnostic and treating it as zero
    pub strict: bool,
}

/// Main projection engine
pub struct ProjectionEngine {
    assumptions: Assumptions,
    config: ProjectionConfig,
}

impl ProjectionEngine {
    /// Create a new projection engine with given assumptions and config
    pub fn new(assumptions: Assumptions, config: ProjectionConfig) -> Self {
        Self { assumptions, config }
    }

    pub fn assumptions(&self) -> &Assumptions {
        &self.assumptions
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Run the projection from the first year through age at death
    pub fn project(
        &self,
        definitions: &[AccountDefinition],
    ) -> Result<ProjectionResult, ProjectionError> {
        self.assumptions.validate()?;
        for definition in definitions {
            definition.validate_windows(&self.assumptions)?;
        }

        let num_years = self.assumptions.num_years();
        let mut registry = AccountRegistry::new(definitions.to_vec(), num_years)?;
        let order = processing_order(definitions);
        let processor = YearProcessor::new(&self.assumptions, self.config.strict);

        info!(
            "Projecting {} accounts over {} years ({}-{}), retiring in {}",
            registry.len(),
            num_years,
            self.assumptions.year_start,
            self.assumptions.year_die(),
            self.assumptions.year_retire()
        );

        let mut years: Vec<YearSummary> = Vec::with_capacity(num_years);
        let mut expense_matrix = Vec::with_capacity(num_years);
        let mut diagnostics = Vec::new();

        for year_index in 0..num_years {
            registry.open_year(year_index);

            let year = self.assumptions.year_at(year_index);
            let mut totals = YearTotals::new(year_index, year, registry.len());
            if year_index >= 2 {
                totals = totals.with_history(years[year_index - 1].total_savings);
            }

            for &id in &order {
                processor.process(id, &mut registry, &mut totals, &mut diagnostics)?;
            }

            let prior_net_worth = years.last().map(|y| y.net_worth).unwrap_or(0.0);
            let summary = self.close_year(&totals, prior_net_worth);
            debug!(
                "Year {}: gross {:.2}, taxable {:.2}, expenses {:.2}, savings {:.2}, \
                 net worth {:.2}",
                summary.year,
                summary.gross_income,
                summary.taxable_income,
                summary.total_expenses,
                summary.total_savings,
                summary.net_worth
            );

            years.push(summary);
            expense_matrix.push(totals.expenses);
        }

        let accounts = registry.into_entries();
        let result = ProjectionResult::new(years, expense_matrix, accounts, diagnostics);
        let summary = result.summary();
        info!(
            "Projection complete: final net worth {:.2}, {} warnings, {} errors",
            summary.final_net_worth, summary.warnings, summary.errors
        );

        Ok(result)
    }

    /// Net worth and after-tax income for a finished year
    fn close_year(&self, totals: &YearTotals, prior_net_worth: f64) -> YearSummary {
        let total_expenses = totals.total_expenses();
        let income_tax = totals.taxable_income * self.assumptions.income_tax_rate;
        let after_tax_income = totals.after_tax_income(self.assumptions.income_tax_rate);

        YearSummary {
            year_index: totals.year_index,
            year: totals.year,
            gross_income: totals.gross_income,
            taxable_income: totals.taxable_income,
            income_tax,
            after_tax_income,
            total_expenses,
            total_savings: totals.total_savings,
            net_worth: prior_net_worth + after_tax_income - total_expenses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::*;
    use crate::error::{ConfigError, DiagnosticKind, Severity};
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn three_years() -> Assumptions {
        Assumptions {
            inflation_rate: 0.02,
            income_tax_rate: 0.25,
            capital_gains_tax_rate: 0.15,
            retirement_cost_of_living: 0.8,
            age_now: 30,
            age_retire: 65,
            age_die: 32,
            year_start: 2020,
        }
    }

    fn engine(assumptions: Assumptions) -> ProjectionEngine {
        ProjectionEngine::new(assumptions, ProjectionConfig::default())
    }

    fn savings_terms() -> SavingsTerms {
        SavingsTerms {
            yearly_return: 0.0,
            contribution: None,
            employer: None,
            withdrawal: None,
            tax_status: None,
            income_link: None,
        }
    }

    fn income(base: f64, raise_rate: f64) -> AccountDefinition {
        AccountDefinition::new(
            "Salary",
            0.0,
            AccountKind::Income(IncomeTerms {
                base,
                raise_rate,
                active: YearWindow::new(2020, 2100),
            }),
        )
    }

    fn fixed_expense(name: &str, amount: f64) -> AccountDefinition {
        AccountDefinition::new(
            name,
            0.0,
            AccountKind::Expense(ExpenseTerms {
                expense: Scheduled {
                    amount: Amount::Fixed(amount),
                    window: YearWindow::new(2000, 2100),
                },
                tax_status: None,
                hsa_link: None,
            }),
        )
    }

    /// A household exercising every account type
    fn household() -> Vec<AccountDefinition> {
        let mut k401 = savings_terms();
        k401.yearly_return = 0.06;
        k401.contribution = Some(Contribution {
            kind: ContributionKind::PercentOfIncome(0.05),
            window: YearWindow::new(2020, 2060),
        });
        k401.employer = Some(EmployerFunding::Match(MatchTiers::Double(
            MatchTier { rate: 1.0, limit: 0.03 },
            MatchTier { rate: 0.5, limit: 0.02 },
        )));
        k401.tax_status = Some(TaxStatus::PretaxContributionTaxedWithdrawal);
        k401.income_link = Some(AccountId(0));

        let mut hsa = savings_terms();
        hsa.yearly_return = 0.03;
        hsa.contribution = Some(Contribution {
            kind: ContributionKind::Fixed(2_000.0),
            window: YearWindow::new(2020, 2060),
        });
        hsa.tax_status = Some(TaxStatus::PretaxContributionUntaxedWithdrawal);

        let mut brokerage = savings_terms();
        brokerage.yearly_return = 0.05;
        brokerage.withdrawal = Some(Withdrawal {
            kind: WithdrawalKind::ColFractionOfSavings,
            window: YearWindow::new(2022, 2060),
        });

        vec![
            income(80_000.0, 0.02),
            AccountDefinition::new("401k", 10_000.0, AccountKind::Retirement(k401)),
            AccountDefinition::new("HSA", 500.0, AccountKind::Hsa(hsa)),
            AccountDefinition::new(
                "Doctor",
                0.0,
                AccountKind::Expense(ExpenseTerms {
                    expense: Scheduled {
                        amount: Amount::FixedWithInflation(1_500.0),
                        window: YearWindow::new(2020, 2060),
                    },
                    tax_status: Some(TaxStatus::PretaxContributionUntaxedWithdrawal),
                    hsa_link: Some(AccountId(2)),
                }),
            ),
            fixed_expense("Rent", 18_000.0),
            AccountDefinition::new(
                "Car",
                -12_000.0,
                AccountKind::Loan(LoanTerms {
                    rate: 0.05,
                    payment: Some(Scheduled {
                        amount: Amount::Fixed(5_000.0),
                        window: YearWindow::new(2020, 2030),
                    }),
                }),
            ),
            AccountDefinition::new("Brokerage", 40_000.0, AccountKind::Savings(brokerage)),
            AccountDefinition::new(
                "House",
                -200_000.0,
                AccountKind::Mortgage(MortgageTerms {
                    rate: 0.04,
                    compound_periods: 12,
                    home_value: 240_000.0,
                    ltv_limit: 0.8,
                    insurance: 1_200.0,
                    escrow: 3_000.0,
                    payment: Some(Scheduled {
                        amount: Amount::Fixed(16_000.0),
                        window: YearWindow::new(2020, 2050),
                    }),
                }),
            ),
        ]
    }

    #[test]
    fn test_savings_scenario() {
        let mut terms = savings_terms();
        terms.yearly_return = 0.05;
        terms.contribution = Some(Contribution {
            kind: ContributionKind::Fixed(5_000.0),
            window: YearWindow::new(2020, 2022),
        });
        let definitions = vec![
            income(50_000.0, 0.02),
            AccountDefinition::new("Savings", 1_000.0, AccountKind::Savings(terms)),
        ];

        let result = engine(three_years()).project(&definitions).unwrap();
        let balance = &result.account("Savings").unwrap().tables.balance;
        assert_eq!(balance.len(), 3);
        assert_relative_eq!(balance[0], 6_050.0, epsilon = 1e-9);
        assert_relative_eq!(balance[1], 11_352.50, epsilon = 1e-9);

        let salary = &result.account("Salary").unwrap().tables.balance;
        assert_relative_eq!(salary[2], 50_000.0 * 1.02 * 1.02, epsilon = 1e-6);
        assert_relative_eq!(result.years[1].total_savings, 11_352.50, epsilon = 1e-9);
    }

    #[test]
    fn test_loan_scenario() {
        let definitions = vec![AccountDefinition::new(
            "Loan",
            -10_000.0,
            AccountKind::Loan(LoanTerms {
                rate: 0.06,
                payment: Some(Scheduled {
                    amount: Amount::Fixed(2_000.0),
                    window: YearWindow::new(2020, 2040),
                }),
            }),
        )];

        let result = engine(three_years()).project(&definitions).unwrap();
        let loan = &result.accounts[0].tables;
        assert_relative_eq!(loan.balance[0], -8_600.0, epsilon = 1e-9);
        assert_relative_eq!(loan.interest.as_ref().unwrap()[0], -600.0, epsilon = 1e-9);
        assert_relative_eq!(result.expense_matrix[0][0], 2_000.0);
        assert_relative_eq!(result.years[0].net_worth, -2_000.0);
    }

    #[test]
    fn test_loan_payment_clamped_to_amount_owed() {
        let definitions = vec![AccountDefinition::new(
            "Loan",
            -1_000.0,
            AccountKind::Loan(LoanTerms {
                rate: 0.0,
                payment: Some(Scheduled {
                    amount: Amount::Fixed(600.0),
                    window: YearWindow::new(2020, 2040),
                }),
            }),
        )];

        let result = engine(three_years()).project(&definitions).unwrap();
        let loan = &result.accounts[0].tables;
        assert_eq!(loan.payment.as_ref().unwrap(), &vec![600.0, 400.0, 0.0]);
        assert_eq!(loan.balance, vec![-400.0, 0.0, 0.0]);
    }

    #[test]
    fn test_net_worth_identity() {
        let mut a = three_years();
        a.age_die = 45;
        a.age_retire = 40;
        let result = engine(a.clone()).project(&household()).unwrap();

        let mut prior = 0.0;
        for year in &result.years {
            let expected = prior + year.gross_income
                - year.taxable_income * a.income_tax_rate
                - year.total_expenses;
            assert_relative_eq!(year.net_worth, expected, epsilon = 1e-6);
            assert_relative_eq!(
                year.total_expenses,
                result.expense_matrix[year.year_index].iter().sum::<f64>(),
                epsilon = 1e-9
            );
            prior = year.net_worth;
        }
    }

    #[test]
    fn test_flow_accounts_reset_and_others_carry() {
        let result = engine(three_years()).project(&household()).unwrap();

        let rent = &result.account("Rent").unwrap().tables.balance;
        assert_eq!(rent, &vec![18_000.0; 3]);

        // Brokerage balance carried forward: next opening is last close
        let brokerage = &result.account("Brokerage").unwrap().tables;
        let earnings = brokerage.earnings.as_ref().unwrap();
        for y in 1..3 {
            assert_relative_eq!(earnings[y], brokerage.balance[y - 1] * 0.05, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_two_tier_match_in_projection() {
        let result = engine(three_years()).project(&household()).unwrap();
        let k401 = &result.account("401k").unwrap().tables;
        // 5% contribution sits exactly at the second threshold
        assert_relative_eq!(k401.contribution.as_ref().unwrap()[0], 4_000.0, epsilon = 1e-6);
        assert_relative_eq!(k401.employer_match.as_ref().unwrap()[0], 3_200.0, epsilon = 1e-6);
        assert_relative_eq!(k401.balance[0], 10_000.0 * 1.06 + 7_200.0, epsilon = 1e-6);
    }

    #[test]
    fn test_pretax_postings() {
        let result = engine(three_years()).project(&household()).unwrap();
        let year = &result.years[0];
        // 401k contribution, HSA contribution and the HSA-eligible expense are deducted
        assert_relative_eq!(year.gross_income, 80_000.0, epsilon = 1e-6);
        let taxable = 80_000.0 - 4_000.0 - 2_000.0 - 1_500.0;
        assert_relative_eq!(year.taxable_income, taxable, epsilon = 1e-6);
    }

    #[test]
    fn test_hsa_offsets_healthcare_expense() {
        let result = engine(three_years()).project(&household()).unwrap();
        let hsa = &result.account("HSA").unwrap().tables;
        let doctor = &result.account("Doctor").unwrap().tables;

        // Year 0: HSA holds 500*1.03 + 2000, enough for the whole bill
        assert_relative_eq!(hsa.withdrawal.as_ref().unwrap()[0], 1_500.0, epsilon = 1e-9);
        assert_relative_eq!(hsa.balance[0], 515.0 + 2_000.0 - 1_500.0, epsilon = 1e-9);
        assert_relative_eq!(doctor.balance[0], 0.0);
        assert_relative_eq!(result.expense_matrix[0][3], 0.0);
        assert!(hsa.balance.iter().all(|&b| b >= 0.0));
    }

    #[test]
    fn test_mortgage_pays_down() {
        let mut a = three_years();
        a.age_die = 60;
        let result = engine(a).project(&household()).unwrap();
        let house = &result.account("House").unwrap().tables;
        let insurance = house.insurance.as_ref().unwrap();

        assert!(house.balance.iter().all(|&b| b <= 0.0));
        assert!(house.balance.windows(2).all(|w| w[1] >= w[0]));
        assert_relative_eq!(*house.balance.last().unwrap(), 0.0);
        // Insured at 200k/240k, dropped once under 80% LTV
        assert_relative_eq!(insurance[0], 1_200.0);
        let cutoff = house.balance.iter().position(|&b| -b / 240_000.0 <= 0.8).unwrap();
        assert!(insurance[cutoff + 1..].iter().all(|&i| i == 0.0));
        assert!(house.escrow.as_ref().unwrap().iter().any(|&e| e == 0.0));
    }

    #[test]
    fn test_mortgage_matches_amortization_schedule() {
        // Level payment that retires 100k at 6% annual in exactly 10 years
        let payment = 100_000.0 * 0.06 / (1.0 - 1.06f64.powi(-10));
        let terms = MortgageTerms {
            rate: 0.06,
            compound_periods: 1,
            home_value: 200_000.0,
            ltv_limit: 0.8,
            insurance: 900.0,
            escrow: 0.0,
            payment: Some(Scheduled {
                amount: Amount::Fixed(payment),
                window: YearWindow::new(2020, 2040),
            }),
        };
        let mut a = three_years();
        a.age_die = 41;

        let house = AccountDefinition::new("House", -100_000.0, AccountKind::Mortgage(terms));
        let definitions = vec![house];
        let result = engine(a).project(&definitions).unwrap();
        let house = &result.accounts[0].tables;

        assert_relative_eq!(house.balance[0], -106_000.0 + payment, epsilon = 1e-9);
        assert_abs_diff_eq!(house.balance[9], 0.0, epsilon = 1e-6);
        assert!(house.balance[10..].iter().all(|&b| b.abs() < 1e-6));
        // 50% loan-to-value never needs insurance
        assert!(house.insurance.as_ref().unwrap().iter().all(|&i| i == 0.0));
        assert!(house.payment.as_ref().unwrap()[10..].iter().all(|&p| p < 1e-6));
    }

    #[test]
    fn test_end_at_zero_reaches_exact_zero() {
        let mut terms = savings_terms();
        terms.yearly_return = 0.07;
        terms.withdrawal = Some(Withdrawal {
            kind: WithdrawalKind::EndAtZero,
            window: YearWindow::new(2022, 2026),
        });
        let mut a = three_years();
        a.age_die = 40;

        let annuity = AccountDefinition::new("Annuity", 100_000.0, AccountKind::Savings(terms));
        let definitions = vec![annuity];
        let result = engine(a).project(&definitions).unwrap();
        let tables = &result.accounts[0].tables;

        assert!(tables.balance[5] > 0.0);
        assert_eq!(tables.balance[6], 0.0);
        assert!(tables.balance[7..].iter().all(|&b| b == 0.0));
        assert!(tables.withdrawal.as_ref().unwrap()[2..7].iter().all(|&w| w > 0.0));
    }

    #[test]
    fn test_debits_never_overdraw() {
        let mut terms = savings_terms();
        terms.withdrawal = Some(Withdrawal {
            kind: WithdrawalKind::FixedWithInflation(4_000.0),
            window: YearWindow::new(2020, 2040),
        });
        let cash = AccountDefinition::new("Cash", 10_000.0, AccountKind::Savings(terms));
        let definitions = vec![cash];
        let mut a = three_years();
        a.age_die = 40;

        let result = engine(a).project(&definitions).unwrap();
        let tables = &result.accounts[0].tables;
        assert!(tables.balance.iter().all(|&b| b >= 0.0));
        assert_eq!(tables.balance[2], 0.0);
        let withdrawn: f64 = tables.withdrawal.as_ref().unwrap().iter().sum();
        assert_relative_eq!(withdrawn, 10_000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_col_withdrawal_uses_history() {
        let mut a = three_years();
        a.age_die = 35;
        let result = engine(a).project(&household()).unwrap();
        let brokerage = &result.account("Brokerage").unwrap().tables;
        let withdrawals = brokerage.withdrawal.as_ref().unwrap();

        let year = &result.years[2];
        let prior = &result.years[1];
        let expected = year.total_expenses * brokerage.balance[1] / prior.total_savings;
        assert_relative_eq!(withdrawals[2], expected, epsilon = 1e-6);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_col_withdrawal_grossed_up_for_taxed_accounts() {
        let col = |status: TaxStatus| {
            let mut terms = savings_terms();
            terms.tax_status = Some(status);
            terms.withdrawal = Some(Withdrawal {
                kind: WithdrawalKind::ColFractionOfSavings,
                window: YearWindow::new(2022, 2040),
            });
            terms
        };
        let definitions = vec![
            fixed_expense("Living", 10_000.0),
            AccountDefinition::new(
                "IRA",
                50_000.0,
                AccountKind::Retirement(col(TaxStatus::PretaxContributionTaxedWithdrawal)),
            ),
            AccountDefinition::new(
                "Bank",
                50_000.0,
                AccountKind::Savings(col(TaxStatus::TaxedContributionTaxedEarnings)),
            ),
        ];

        let result = engine(three_years()).project(&definitions).unwrap();
        let withdrawal = |name: &str| result.account(name).unwrap().tables.withdrawal.clone();
        // Each holds half of last year's savings; the IRA also covers the tax on its draw
        assert_relative_eq!(withdrawal("IRA").unwrap()[2], 6_250.0, epsilon = 1e-9);
        assert_relative_eq!(withdrawal("Bank").unwrap()[2], 5_000.0, epsilon = 1e-9);
        assert_relative_eq!(result.years[2].gross_income, 11_250.0, epsilon = 1e-9);
        assert_relative_eq!(result.years[2].taxable_income, 6_250.0, epsilon = 1e-9);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_premature_col_withdrawal() {
        let mut terms = savings_terms();
        terms.withdrawal = Some(Withdrawal {
            kind: WithdrawalKind::ColFractionOfSavings,
            window: YearWindow::new(2020, 2040),
        });
        let definitions = vec![
            fixed_expense("Food", 1_000.0),
            AccountDefinition::new("Bank", 5_000.0, AccountKind::Savings(terms)),
        ];

        let lenient = engine(three_years()).project(&definitions).unwrap();
        let errors: Vec<_> = lenient
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::InsufficientHistory)
            .collect();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].year, 2020);
        assert_eq!(errors[1].year, 2021);
        assert!(errors.iter().all(|d| d.severity == Severity::Error));
        assert_relative_eq!(lenient.accounts[1].tables.balance[1], 5_000.0);
        assert_relative_eq!(lenient.accounts[1].tables.withdrawal.as_ref().unwrap()[2], 1_000.0);

        let strict = ProjectionEngine::new(three_years(), ProjectionConfig { strict: true });
        assert_eq!(
            strict.project(&definitions),
            Err(ProjectionError::InsufficientHistory {
                account: "Bank".to_string(),
                year: 2020
            })
        );
    }

    #[test]
    fn test_negative_expense_warning() {
        let definitions = vec![fixed_expense("Refund", -50.0)];
        let result = engine(three_years()).project(&definitions).unwrap();

        assert_eq!(result.diagnostics.len(), 3);
        assert!(result.diagnostics.iter().all(|d| d.account == "Refund"
            && d.severity == Severity::Warning
            && d.kind == DiagnosticKind::NegativeExpense(-50.0)));
        assert_eq!(result.accounts[0].tables.balance, vec![0.0; 3]);
        assert_eq!(result.summary().warnings, 3);
    }

    #[test]
    fn test_config_errors_abort_before_running() {
        let mut terms = savings_terms();
        terms.income_link = Some(AccountId(1));
        let definitions = vec![
            income(1.0, 0.0),
            AccountDefinition::new("Bank", 0.0, AccountKind::Savings(terms)),
        ];
        let err = engine(three_years()).project(&definitions).unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::Config(ConfigError::InvalidLinkTarget { .. })
        ));

        let mut bad = three_years();
        bad.income_tax_rate = 1.5;
        assert!(engine(bad).project(&[]).is_err());

        let mut bad = three_years();
        bad.year_start = u32::MAX - 1;
        bad.age_now = 0;
        bad.age_retire = 0;
        bad.age_die = 5;
        assert!(matches!(
            engine(bad).project(&[]),
            Err(ProjectionError::Config(ConfigError::InvalidAssumption { .. }))
        ));
    }

    #[test]
    fn test_window_resolving_backwards_rejected() {
        let mut terms = savings_terms();
        terms.withdrawal = Some(Withdrawal {
            kind: WithdrawalKind::EndAtZero,
            window: YearWindow::between(
                YearInput::Anchor(YearAnchor::YearRetire),
                YearInput::Year(2060),
            ),
        });
        let definitions = vec![AccountDefinition::new(
            "Roth",
            1_000.0,
            AccountKind::Retirement(terms),
        )];

        // Retiring in 2055 leaves a valid window
        assert!(engine(three_years()).project(&definitions).is_ok());

        let mut late = three_years();
        late.age_retire = 75;
        assert_eq!(
            engine(late).project(&definitions),
            Err(ProjectionError::Config(ConfigError::InvalidWindow {
                account: "Roth".to_string(),
                window: "year_retire to 2060".to_string(),
            }))
        );
    }

    #[test]
    fn test_deterministic() {
        let mut a = three_years();
        a.age_die = 70;
        let e = engine(a);
        let first = e.project(&household()).unwrap();
        let second = e.project(&household()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_accounts() {
        let result = engine(three_years()).project(&[]).unwrap();
        assert_eq!(result.years.len(), 3);
        assert!(result.years.iter().all(|y| y.net_worth == 0.0));
        assert!(result.expense_matrix.iter().all(Vec::is_empty));
    }
}
