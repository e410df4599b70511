//! Scenario runner for repeated projections over one household
//!
//! Loads assumptions and accounts once, then runs the projection under
//! variations of the assumptions without re-reading input files.

use crate::accounts::{load_accounts, AccountDefinition};
use crate::assumptions::{load_assumptions, Assumptions};
use crate::error::ProjectionError;
use crate::projection::{ProjectionConfig, ProjectionEngine, ProjectionResult};
use rayon::prelude::*;
use std::path::Path;

/// Pre-loaded scenario runner
///
/// # Example
/// ```ignore
/// let runner = ScenarioRunner::from_files(assumptions_path, accounts_path)?;
/// for (age, result) in runner.run_retirement_ages(&[62, 65, 67]) {
///     println!("{age}: {:.2}", result?.summary().final_net_worth);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    base_assumptions: Assumptions,
    accounts: Vec<AccountDefinition>,
    config: ProjectionConfig,
}

impl ScenarioRunner {
    pub fn new(assumptions: Assumptions, accounts: Vec<AccountDefinition>) -> Self {
        Self {
            base_assumptions: assumptions,
            accounts,
            config: ProjectionConfig::default(),
        }
    }

    /// Create runner by loading assumptions (CSV) and accounts (JSON)
    pub fn from_files(
        assumptions_path: &Path,
        accounts_path: &Path,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::new(
            load_assumptions(assumptions_path)?,
            load_accounts(accounts_path)?,
        ))
    }

    pub fn with_config(mut self, config: ProjectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the base scenario
    pub fn run(&self) -> Result<ProjectionResult, ProjectionError> {
        self.run_with(self.base_assumptions.clone())
    }

    /// Run the same accounts under different assumptions
    pub fn run_with(&self, assumptions: Assumptions) -> Result<ProjectionResult, ProjectionError> {
        ProjectionEngine::new(assumptions, self.config.clone()).project(&self.accounts)
    }

    /// Run one projection per retirement age, in parallel
    ///
    /// Results come back in the order of `ages`.
    pub fn run_retirement_ages(
        &self,
        ages: &[u32],
    ) -> Vec<(u32, Result<ProjectionResult, ProjectionError>)> {
        ages.par_iter()
            .map(|&age| {
                let assumptions = Assumptions {
                    age_retire: age,
                    ..self.base_assumptions.clone()
                };
                (age, self.run_with(assumptions))
            })
            .collect()
    }

    pub fn assumptions(&self) -> &Assumptions {
        &self.base_assumptions
    }

    /// Get mutable reference to base assumptions for customization
    pub fn assumptions_mut(&mut self) -> &mut Assumptions {
        &mut self.base_assumptions
    }

    pub fn accounts(&self) -> &[AccountDefinition] {
        &self.accounts
    }
}
