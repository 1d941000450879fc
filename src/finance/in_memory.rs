//! In-memory finance service
//!
//! Development and test backing for the financial tools. Everything lives in
//! process memory and disappears on restart.

use super::{
    BalanceTopUp, BudgetDraft, BudgetPeriod, BudgetRecord, Category, FinanceService,
    TransactionDraft, TransactionKind, TransactionRecord, WalletRecord, DEFAULT_WALLET,
};
use crate::error::AgentError;
use crate::Result;
use chrono::{DateTime, Datelike, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredBudget {
    amount: i64,
    period: BudgetPeriod,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Account {
    transactions: Vec<TransactionRecord>,
    budgets: HashMap<Category, StoredBudget>,
    wallets: HashMap<String, i64>,
}

impl Account {
    fn spent_in_period(&self, category: Category, period: BudgetPeriod, now: DateTime<Utc>) -> i64 {
        self.transactions
            .iter()
            .filter(|t| t.kind == TransactionKind::Expense && t.category == category)
            .filter(|t| same_period(t.created_at, now, period))
            .fold(0i64, |acc, t| acc.saturating_add(t.amount))
    }
}

fn same_period(a: DateTime<Utc>, b: DateTime<Utc>, period: BudgetPeriod) -> bool {
    match period {
        BudgetPeriod::Monthly => a.year() == b.year() && a.month() == b.month(),
        BudgetPeriod::Weekly => a.iso_week() == b.iso_week(),
    }
}

fn wallet_name(wallet: Option<String>) -> String {
    wallet
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .unwrap_or_else(|| DEFAULT_WALLET.to_string())
}

/// One write lock over all accounts keeps each mutation atomic
pub struct InMemoryFinanceService {
    accounts: Arc<RwLock<HashMap<String, Account>>>,
}

impl InMemoryFinanceService {
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn transactions(&self, caller_id: &str) -> Vec<TransactionRecord> {
        let accounts = self.accounts.read().await;
        accounts
            .get(caller_id)
            .map(|a| a.transactions.clone())
            .unwrap_or_default()
    }

    pub async fn wallet_balance(&self, caller_id: &str, wallet: &str) -> i64 {
        let accounts = self.accounts.read().await;
        accounts
            .get(caller_id)
            .and_then(|a| a.wallets.get(wallet).copied())
            .unwrap_or(0)
    }
}

impl Default for InMemoryFinanceService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl FinanceService for InMemoryFinanceService {
    async fn record_transaction(
        &self,
        caller_id: &str,
        draft: TransactionDraft,
    ) -> Result<TransactionRecord> {
        if draft.amount <= 0 {
            return Err(AgentError::StorageError(format!(
                "transaction amount must be positive, got {}",
                draft.amount
            )));
        }

        let wallet = wallet_name(draft.wallet);
        let mut accounts = self.accounts.write().await;
        let account = accounts.entry(caller_id.to_string()).or_default();

        let balance = account.wallets.entry(wallet.clone()).or_insert(0);
        let delta = match draft.kind {
            TransactionKind::Expense => -draft.amount,
            TransactionKind::Income => draft.amount,
        };
        *balance = balance
            .checked_add(delta)
            .ok_or_else(|| AgentError::StorageError("wallet balance overflow".to_string()))?;

        let record = TransactionRecord {
            transaction_id: Uuid::new_v4(),
            caller_id: caller_id.to_string(),
            kind: draft.kind,
            amount: draft.amount,
            description: draft.description,
            category: draft.category,
            wallet,
            wallet_balance: *balance,
            created_at: Utc::now(),
        };

        debug!(
            caller_id,
            transaction_id = %record.transaction_id,
            amount = record.amount,
            "transaction recorded"
        );

        account.transactions.push(record.clone());
        Ok(record)
    }

    async fn set_budget(&self, caller_id: &str, draft: BudgetDraft) -> Result<BudgetRecord> {
        if draft.amount <= 0 {
            return Err(AgentError::StorageError(format!(
                "budget amount must be positive, got {}",
                draft.amount
            )));
        }

        let now = Utc::now();
        let mut accounts = self.accounts.write().await;
        let account = accounts.entry(caller_id.to_string()).or_default();

        // Replaces any previous budget for the category
        account.budgets.insert(
            draft.category,
            StoredBudget {
                amount: draft.amount,
                period: draft.period,
                updated_at: now,
            },
        );

        let spent = account.spent_in_period(draft.category, draft.period, now);

        Ok(BudgetRecord {
            caller_id: caller_id.to_string(),
            category: draft.category,
            amount: draft.amount,
            period: draft.period,
            spent,
            remaining: draft.amount.saturating_sub(spent),
            updated_at: now,
        })
    }

    async fn add_balance(&self, caller_id: &str, top_up: BalanceTopUp) -> Result<WalletRecord> {
        if top_up.amount <= 0 {
            return Err(AgentError::StorageError(format!(
                "top-up amount must be positive, got {}",
                top_up.amount
            )));
        }

        let wallet = wallet_name(top_up.wallet);
        let mut accounts = self.accounts.write().await;
        let account = accounts.entry(caller_id.to_string()).or_default();

        let balance = account.wallets.entry(wallet.clone()).or_insert(0);
        *balance = balance
            .checked_add(top_up.amount)
            .ok_or_else(|| AgentError::StorageError("wallet balance overflow".to_string()))?;

        Ok(WalletRecord {
            caller_id: caller_id.to_string(),
            wallet,
            balance: *balance,
            updated_at: Utc::now(),
        })
    }
}
