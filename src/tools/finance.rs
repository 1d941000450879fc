//! Built-in financial tools
//!
//! Each tool owns a typed argument struct and hands a draft to the
//! [`FinanceService`]. `calculate` is pure and needs no service.

use super::{FieldSpec, FieldType, ParameterSpec, Tool, ToolRegistry, ToolSchema};
use crate::calculator;
use crate::finance::{
    BalanceTopUp, BudgetDraft, BudgetPeriod, Category, FinanceService, TransactionDraft,
    TransactionKind,
};
use crate::models::ToolOutput;
use crate::Result;
use serde::Deserialize;
use std::sync::Arc;

/// Upper bound accepted for any single amount
const MAX_AMOUNT: f64 = 1_000_000_000_000.0;

fn category_values(kind: TransactionKind) -> FieldType {
    FieldType::Enum {
        values: Category::ALL
            .iter()
            .filter(|c| c.applies_to(kind))
            .map(|c| c.as_str().to_string())
            .collect(),
    }
}

fn amount_field(description: &str) -> FieldSpec {
    FieldSpec::required("amount", FieldType::Amount, description)
        .min(1.0)
        .max(MAX_AMOUNT)
}

fn wallet_field() -> FieldSpec {
    FieldSpec::optional("wallet", FieldType::String, "Wallet name, e.g. cash, gopay, bca")
        .min_length(1)
        .max_length(50)
}

//
// ================= Expense / Income =================
//

#[derive(Debug, Deserialize)]
pub struct TransactionArgs {
    pub amount: i64,
    pub description: String,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub wallet: Option<String>,
}

/// `create_expense` and `create_income`
pub struct TransactionTool {
    kind: TransactionKind,
    service: Arc<dyn FinanceService>,
}

impl TransactionTool {
    pub fn expense(service: Arc<dyn FinanceService>) -> Self {
        Self {
            kind: TransactionKind::Expense,
            service,
        }
    }

    pub fn income(service: Arc<dyn FinanceService>) -> Self {
        Self {
            kind: TransactionKind::Income,
            service,
        }
    }

    pub fn schema(kind: TransactionKind) -> ToolSchema {
        let (name, description) = match kind {
            TransactionKind::Expense => (
                "create_expense",
                "Record money spent. Use for purchases and payments, e.g. 'beli kopi 25rb'.",
            ),
            TransactionKind::Income => (
                "create_income",
                "Record money received, e.g. salary, sales or gifts ('gaji 5jt').",
            ),
        };

        ToolSchema::new(
            name,
            description,
            ParameterSpec::new()
                .field(amount_field("Amount in rupiah; vernacular like '25rb' is accepted"))
                .field(
                    FieldSpec::required("description", FieldType::String, "Short label for the transaction")
                        .min_length(1)
                        .max_length(200),
                )
                .field(FieldSpec::optional(
                    "category",
                    category_values(kind),
                    "Category; inferred from the description when omitted",
                ))
                .field(wallet_field()),
        )
    }
}

#[async_trait::async_trait]
impl Tool for TransactionTool {
    type Args = TransactionArgs;

    async fn execute(&self, args: TransactionArgs, caller_id: &str) -> Result<ToolOutput> {
        let (category, source) = match args.category {
            Some(category) => (category, "provided"),
            None => match Category::infer(&args.description, self.kind) {
                Some(category) => (category, "inferred"),
                None => (Category::Others, "default"),
            },
        };

        let record = self
            .service
            .record_transaction(
                caller_id,
                TransactionDraft {
                    kind: self.kind,
                    amount: args.amount,
                    description: args.description,
                    category,
                    wallet: args.wallet,
                },
            )
            .await?;

        let label = match self.kind {
            TransactionKind::Expense => "Expense",
            TransactionKind::Income => "Income",
        };
        let message = format!("{} of {} recorded under {}", label, record.amount, category);

        Ok(ToolOutput::new(serde_json::to_value(&record)?, message)
            .with_metadata("category", category.as_str())
            .with_metadata("category_source", source))
    }
}

//
// ================= Budget =================
//

#[derive(Debug, Deserialize)]
pub struct BudgetArgs {
    pub amount: i64,
    pub category: Category,
    #[serde(default)]
    pub period: Option<BudgetPeriod>,
}

pub struct SetBudgetTool {
    service: Arc<dyn FinanceService>,
}

impl SetBudgetTool {
    pub fn new(service: Arc<dyn FinanceService>) -> Self {
        Self { service }
    }

    pub fn schema() -> ToolSchema {
        ToolSchema::new(
            "set_budget",
            "Set a spending limit for a category, e.g. 'budget makanan 1 juta'.",
            ParameterSpec::new()
                .field(amount_field("Budget limit in rupiah"))
                .field(FieldSpec::required(
                    "category",
                    category_values(TransactionKind::Expense),
                    "Spending category the budget applies to",
                ))
                .field(FieldSpec::optional(
                    "period",
                    FieldType::Enum {
                        values: BudgetPeriod::IDS.iter().map(|s| s.to_string()).collect(),
                    },
                    "Budget period, monthly when omitted",
                )),
        )
    }
}

#[async_trait::async_trait]
impl Tool for SetBudgetTool {
    type Args = BudgetArgs;

    async fn execute(&self, args: BudgetArgs, caller_id: &str) -> Result<ToolOutput> {
        let record = self
            .service
            .set_budget(
                caller_id,
                BudgetDraft {
                    category: args.category,
                    amount: args.amount,
                    period: args.period.unwrap_or_default(),
                },
            )
            .await?;

        let message = format!(
            "{} budget for {} set to {}",
            record.period, record.category, record.amount
        );

        Ok(ToolOutput::new(serde_json::to_value(&record)?, message)
            .with_metadata("category", record.category.as_str()))
    }
}

//
// ================= Balance =================
//

#[derive(Debug, Deserialize)]
pub struct TopUpArgs {
    pub amount: i64,
    #[serde(default)]
    pub wallet: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

pub struct AddBalanceTool {
    service: Arc<dyn FinanceService>,
}

impl AddBalanceTool {
    pub fn new(service: Arc<dyn FinanceService>) -> Self {
        Self { service }
    }

    pub fn schema() -> ToolSchema {
        ToolSchema::new(
            "add_balance",
            "Top up a wallet balance, e.g. 'isi saldo gopay 100k'.",
            ParameterSpec::new()
                .field(amount_field("Top-up amount in rupiah"))
                .field(wallet_field())
                .field(FieldSpec::optional("note", FieldType::String, "Free-form note").max_length(200)),
        )
    }
}

#[async_trait::async_trait]
impl Tool for AddBalanceTool {
    type Args = TopUpArgs;

    async fn execute(&self, args: TopUpArgs, caller_id: &str) -> Result<ToolOutput> {
        let wallet = self
            .service
            .add_balance(
                caller_id,
                BalanceTopUp {
                    amount: args.amount,
                    wallet: args.wallet,
                    note: args.note,
                },
            )
            .await?;

        let message = format!("Wallet {} balance is now {}", wallet.wallet, wallet.balance);
        Ok(ToolOutput::new(serde_json::to_value(&wallet)?, message))
    }
}

//
// ================= Calculator =================
//

#[derive(Debug, Deserialize)]
pub struct CalculateArgs {
    pub expression: String,
}

pub struct CalculateTool;

impl CalculateTool {
    pub fn schema() -> ToolSchema {
        ToolSchema::new(
            "calculate",
            "Evaluate a shopping calculation such as '5kg @ 10rb' or '2 @ 5000 + 3 @ 3000'.",
            ParameterSpec::new().field(
                FieldSpec::required("expression", FieldType::String, "Expression to evaluate")
                    .min_length(1)
                    .max_length(500),
            ),
        )
    }
}

#[async_trait::async_trait]
impl Tool for CalculateTool {
    type Args = CalculateArgs;

    async fn execute(&self, args: CalculateArgs, _caller_id: &str) -> Result<ToolOutput> {
        let result = calculator::calculate(&args.expression)?;
        let message = format!("Total {}", result.total.normalize());

        Ok(ToolOutput::new(serde_json::to_value(&result)?, message)
            .with_metadata("item_count", result.items.len()))
    }
}

/// Registry with every built-in tool wired to `service`
pub fn create_default_registry(service: Arc<dyn FinanceService>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(
        TransactionTool::schema(TransactionKind::Expense),
        TransactionTool::expense(service.clone()),
    );
    registry.register(
        TransactionTool::schema(TransactionKind::Income),
        TransactionTool::income(service.clone()),
    );
    registry.register(SetBudgetTool::schema(), SetBudgetTool::new(service.clone()));
    registry.register(AddBalanceTool::schema(), AddBalanceTool::new(service));
    registry.register(CalculateTool::schema(), CalculateTool);

    registry
}
