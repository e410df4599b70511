//! Account processing order within a simulated year

use crate::accounts::{AccountDefinition, AccountId, AccountType};

/// Order accounts by type priority, keeping definition order within a type
///
/// Income posts first so expenses and contributions can read it; savings
/// accounts come last so cost-of-living withdrawals see the year's expenses.
pub fn processing_order(definitions: &[AccountDefinition]) -> Vec<AccountId> {
    AccountType::PROCESSING_ORDER
        .iter()
        .flat_map(|&account_type| {
            definitions
                .iter()
                .enumerate()
                .filter(move |(_, d)| d.account_type() == account_type)
                .map(|(index, _)| AccountId(index))
        })
        .collect()
}
