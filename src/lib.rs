//! Financial Projection - year-by-year personal finance simulation
//!
//! This library provides:
//! - Typed account definitions (income, savings, retirement, college, HSA,
//!   expense, loan, mortgage) with JSON loading
//! - Economic assumptions loaded from CSV
//! - A deterministic yearly projection of balances, income, taxes and net worth
//! - CSV export and parallel what-if scenarios

pub mod accounts;
pub mod assumptions;
pub mod error;
pub mod export;
pub mod projection;
pub mod scenario;

// Re-export commonly used types
pub use accounts::{AccountDefinition, AccountId, AccountKind, AccountType};
pub use assumptions::Assumptions;
pub use error::{ConfigError, Diagnostic, ProjectionError};
pub use projection::{ProjectionConfig, ProjectionEngine, ProjectionResult};
pub use scenario::ScenarioRunner;
