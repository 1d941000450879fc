//! One-shot interpreter
//!
//! Usage:
//!   interpret beli kopi 25rb
//!   interpret /calc 2 x 15rb + 5000

use finance_command_router::{
    calculator, finance::InMemoryFinanceService, tools::create_default_registry, AppConfig,
    CommandRouter, RouteContext,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let input = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let input = input.trim();

    if input.is_empty() {
        eprintln!("usage: interpret <message>  |  interpret /calc <expression>");
        std::process::exit(2);
    }

    if let Some(expression) = input.strip_prefix("/calc") {
        let expression = expression.trim();
        if !calculator::is_valid_expression(expression) {
            eprintln!("not a calculator expression: '{}'", expression);
            std::process::exit(2);
        }
        let result = calculator::calculate(expression)?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let config = AppConfig::from_env()?;
    let registry = Arc::new(create_default_registry(Arc::new(
        InMemoryFinanceService::new(),
    )));
    let router = CommandRouter::new(
        registry,
        config.completion_service()?,
        config.router_config(),
    );

    info!(ai_enabled = router.ai_enabled(), "Routing message");

    let outcome = router.route(input, "cli", &RouteContext::new()).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(())
}
