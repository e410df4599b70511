//! Error and diagnostic types shared by the loaders and the projection engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Malformed inputs detected before the simulation starts
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown assumption '{0}'")]
    UnknownAssumption(String),

    #[error("missing required assumption '{0}'")]
    MissingAssumption(String),

    #[error("invalid assumption '{name}': {reason}")]
    InvalidAssumption { name: String, reason: String },

    #[error("account '{account}': unknown account type '{code}'")]
    UnknownAccountType { account: String, code: String },

    #[error("account '{account}': unsupported {field} '{code}'")]
    UnsupportedPolicyKind {
        account: String,
        field: &'static str,
        code: String,
    },

    #[error("account '{account}': unsupported tax status {code}")]
    UnsupportedTaxStatus { account: String, code: u8 },

    #[error("account '{account}': missing field '{field}'")]
    MissingField { account: String, field: &'static str },

    #[error("account '{account}': {field} must be non-negative, got {value}")]
    NegativeValue {
        account: String,
        field: &'static str,
        value: f64,
    },

    #[error("duplicate account name '{0}'")]
    DuplicateAccount(String),

    #[error("account '{account}': link to unknown account '{link}'")]
    UnknownLink { account: String, link: String },

    #[error("account '{account}': linked account '{link}' is not a {expected} account")]
    InvalidLinkTarget {
        account: String,
        link: String,
        expected: &'static str,
    },

    #[error("account '{0}': employer match defined without an income link")]
    MatchWithoutIncomeLink(String),

    #[error(
        "account '{account}': employer match needs one or two tiers, \
         got {rates} rates and {limits} limits"
    )]
    InvalidMatchTiers {
        account: String,
        rates: usize,
        limits: usize,
    },

    #[error("account '{account}': year window {window} is empty or out of range")]
    InvalidWindow { account: String, window: String },

    #[error("account '{account}': debt balance must be zero or negative, got {balance}")]
    InvalidDebtBalance { account: String, balance: f64 },

    #[error("account '{0}': HSA link on an expense that is not healthcare")]
    HsaLinkWithoutHealthcare(String),
}

/// Failures that stop a projection run
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProjectionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(
        "account '{account}' year {year}: \
         cost-of-living withdrawal needs two prior years of history"
    )]
    InsufficientHistory { account: String, year: u32 },
}

/// How serious a recorded diagnostic is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Value was clamped and the run continued
    Warning,
    /// The year's computation for this account was undefined and treated as zero
    Error,
}

/// What went wrong for one account in one year
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    NegativeContribution(f64),
    NegativePayment(f64),
    NegativeWithdrawal(f64),
    NegativeExpense(f64),
    InsufficientHistory,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::NegativeContribution(v) => {
                write!(f, "negative contribution {v:.2} clamped to zero")
            }
            DiagnosticKind::NegativePayment(v) => {
                write!(f, "negative payment {v:.2} clamped to zero")
            }
            DiagnosticKind::NegativeWithdrawal(v) => {
                write!(f, "negative withdrawal {v:.2} clamped to zero")
            }
            DiagnosticKind::NegativeExpense(v) => {
                write!(f, "negative expense {v:.2} clamped to zero")
            }
            DiagnosticKind::InsufficientHistory => {
                write!(f, "cost-of-living withdrawal needs two prior years of history")
            }
        }
    }
}

/// An anomaly attached to a specific account and calendar year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub account: String,
    pub year: u32,
    pub severity: Severity,
    pub kind: DiagnosticKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{label}: account '{}' year {}: {}", self.account, self.year, self.kind)
    }
}
