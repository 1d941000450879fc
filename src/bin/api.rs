use finance_command_router::{
    api::{start_server, ApiState},
    finance::InMemoryFinanceService,
    memory::SessionStore,
    tools::create_default_registry,
    AppConfig, CommandRouter,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    info!("Finance Command Router - API Server");
    info!("Port: {}", config.port);

    // Create components
    let registry = Arc::new(create_default_registry(Arc::new(
        InMemoryFinanceService::new(),
    )));
    let completion = config.completion_service()?;
    let router = Arc::new(CommandRouter::new(
        registry,
        completion,
        config.router_config(),
    ));

    info!(
        ai_enabled = router.ai_enabled(),
        tools = router.registry().len(),
        "Router initialized"
    );

    let state = ApiState {
        router,
        sessions: Arc::new(SessionStore::new(config.context_max_messages)),
        context_max_messages: config.context_max_messages,
    };

    start_server(state, config.port).await?;

    Ok(())
}
