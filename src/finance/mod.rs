//! Finance service boundary
//!
//! The built-in tools do not persist anything themselves. They hand typed
//! drafts to a [`FinanceService`], the repository-style collaborator that owns
//! expenses, incomes, budgets and wallets.

pub mod category;
pub mod in_memory;

pub use category::Category;
pub use in_memory::InMemoryFinanceService;

use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Wallet used when a message does not name one
pub const DEFAULT_WALLET: &str = "cash";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Expense,
    Income,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Weekly,
    #[default]
    Monthly,
}

impl BudgetPeriod {
    pub const IDS: &'static [&'static str] = &["weekly", "monthly"];
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BudgetPeriod::Weekly => "weekly",
            BudgetPeriod::Monthly => "monthly",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Drafts (tool → service) =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub kind: TransactionKind,
    /// Whole currency units
    pub amount: i64,
    pub description: String,
    pub category: Category,
    pub wallet: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetDraft {
    pub category: Category,
    pub amount: i64,
    pub period: BudgetPeriod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceTopUp {
    pub amount: i64,
    pub wallet: Option<String>,
    pub note: Option<String>,
}

//
// ================= Records (service → tool) =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: Uuid,
    pub caller_id: String,
    pub kind: TransactionKind,
    pub amount: i64,
    pub description: String,
    pub category: Category,
    pub wallet: String,
    pub wallet_balance: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetRecord {
    pub caller_id: String,
    pub category: Category,
    pub amount: i64,
    pub period: BudgetPeriod,
    /// Expenses already recorded in this category for the current period
    pub spent: i64,
    pub remaining: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    pub caller_id: String,
    pub wallet: String,
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}

/// Repository-style collaborator behind the financial tools.
/// Implementations serialize mutations per account.
#[async_trait::async_trait]
pub trait FinanceService: Send + Sync {
    async fn record_transaction(
        &self,
        caller_id: &str,
        draft: TransactionDraft,
    ) -> Result<TransactionRecord>;

    async fn set_budget(&self, caller_id: &str, draft: BudgetDraft) -> Result<BudgetRecord>;

    async fn add_balance(&self, caller_id: &str, top_up: BalanceTopUp) -> Result<WalletRecord>;
}
