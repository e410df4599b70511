//! Economic assumptions shared by every account in a projection

pub mod loader;

pub use loader::{load_assumptions, load_assumptions_from_reader, DEFAULT_ASSUMPTIONS_PATH};

use crate::error::ConfigError;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Global inputs for a projection run
///
/// Rates are decimal fractions (0.03 = 3%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assumptions {
    /// Yearly inflation used to grow inflation-adjusted amounts
    pub inflation_rate: f64,

    /// Flat tax rate applied to taxable income
    pub income_tax_rate: f64,

    /// Capital gains rate (carried for reporting, not applied to net worth)
    pub capital_gains_tax_rate: f64,

    /// Spending in retirement relative to today's spending
    pub retirement_cost_of_living: f64,

    /// Age in the first simulated year
    pub age_now: u32,

    /// Age at which retirement starts
    pub age_retire: u32,

    /// Age of the final simulated year
    pub age_die: u32,

    /// Calendar year of the first simulated year
    pub year_start: u32,
}

/// Longest run accepted, in years
pub const MAX_YEARS: u32 = 150;

impl Assumptions {
    /// Build from a name/value mapping
    pub fn from_map(values: &HashMap<String, f64>) -> Result<Self, ConfigError> {
        const KNOWN: [&str; 8] = [
            "inflation_rate",
            "income_tax_rate",
            "capital_gains_tax_rate",
            "retirement_cost_of_living",
            "age_now",
            "age_retire",
            "age_die",
            "year_start",
        ];

        // Sorted so the reported name is stable across runs
        let mut names: Vec<&String> = values.keys().collect();
        names.sort();
        if let Some(unknown) = names.into_iter().find(|n| !KNOWN.contains(&n.as_str())) {
            return Err(ConfigError::UnknownAssumption(unknown.clone()));
        }

        let required = |name: &str| -> Result<f64, ConfigError> {
            values
                .get(name)
                .copied()
                .ok_or_else(|| ConfigError::MissingAssumption(name.to_string()))
        };

        let assumptions = Self {
            inflation_rate: required("inflation_rate")?,
            income_tax_rate: required("income_tax_rate")?,
            capital_gains_tax_rate: values.get("capital_gains_tax_rate").copied().unwrap_or(0.0),
            retirement_cost_of_living: values
                .get("retirement_cost_of_living")
                .copied()
                .unwrap_or(1.0),
            age_now: whole("age_now", required("age_now")?)?,
            age_retire: whole("age_retire", required("age_retire")?)?,
            age_die: whole("age_die", required("age_die")?)?,
            year_start: match values.get("year_start") {
                Some(&v) => whole("year_start", v)?,
                None => current_year(),
            },
        };
        assumptions.validate()?;
        Ok(assumptions)
    }

    /// Sanity checks on ages, years and rates
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |name: &str, reason: String| ConfigError::InvalidAssumption {
            name: name.to_string(),
            reason,
        };

        if self.age_now > self.age_die {
            return Err(invalid(
                "age_die",
                format!("{} is before current age {}", self.age_die, self.age_now),
            ));
        }
        let span = self.age_die - self.age_now;
        if span >= MAX_YEARS {
            return Err(invalid(
                "age_die",
                format!("run of {} years exceeds {MAX_YEARS}", span + 1),
            ));
        }
        if self.year_start.checked_add(span).is_none()
            || self.year_start.checked_add(self.age_retire).is_none()
        {
            return Err(invalid(
                "year_start",
                format!("{} leaves no room for the run's final year", self.year_start),
            ));
        }
        for (name, rate) in [
            ("inflation_rate", self.inflation_rate),
            ("income_tax_rate", self.income_tax_rate),
            ("capital_gains_tax_rate", self.capital_gains_tax_rate),
            ("retirement_cost_of_living", self.retirement_cost_of_living),
        ] {
            if !rate.is_finite() {
                return Err(invalid(name, format!("{rate} is not a finite number")));
            }
        }
        if !(0.0..=1.0).contains(&self.income_tax_rate) {
            return Err(invalid(
                "income_tax_rate",
                format!("{} is outside [0, 1]", self.income_tax_rate),
            ));
        }
        if self.retirement_cost_of_living < 0.0 {
            return Err(invalid(
                "retirement_cost_of_living",
                format!("{} is negative", self.retirement_cost_of_living),
            ));
        }
        Ok(())
    }

    /// Calendar year retirement starts
    pub fn year_retire(&self) -> u32 {
        self.year_start
            .saturating_add(self.age_retire)
            .saturating_sub(self.age_now)
    }

    /// Calendar year of the final simulated year
    pub fn year_die(&self) -> u32 {
        self.year_start
            .saturating_add(self.age_die.saturating_sub(self.age_now))
    }

    /// Number of simulated years, both ends inclusive
    pub fn num_years(&self) -> usize {
        self.age_die.saturating_sub(self.age_now) as usize + 1
    }

    /// Calendar years covered by the run
    pub fn years(&self) -> impl Iterator<Item = u32> {
        self.year_start..=self.year_die()
    }

    /// Calendar year for a year index
    pub fn year_at(&self, year_index: usize) -> u32 {
        self.year_start + year_index as u32
    }

    /// Year index for a calendar year inside the run
    pub fn year_index(&self, year: u32) -> Option<usize> {
        (self.year_start..=self.year_die())
            .contains(&year)
            .then(|| (year - self.year_start) as usize)
    }

    pub fn is_retired(&self, year: u32) -> bool {
        year >= self.year_retire()
    }

    /// Growth of a today's-dollars amount after `year_index` years
    pub fn inflation_factor(&self, year_index: usize) -> f64 {
        (1.0 + self.inflation_rate).powi(year_index as i32)
    }
}

fn current_year() -> u32 {
    chrono::Local::now().year() as u32
}

fn whole(name: &str, value: f64) -> Result<u32, ConfigError> {
    if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(ConfigError::InvalidAssumption {
            name: name.to_string(),
            reason: format!("{value} is not a whole number of years"),
        });
    }
    Ok(value as u32)
}
