use clap::Parser;
use nutrition_lookup::utils::logger;
use nutrition_lookup::{
    CliConfig, Command, InMemoryProductStore, LookupConfig, LookupOrchestrator,
    OpenFoodFactsClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting nutrition-lookup CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = match &cli.config {
        Some(path) => LookupConfig::from_file(path)?,
        None => LookupConfig::from_env()?,
    };

    let store = match &cli.local_store {
        Some(path) => InMemoryProductStore::load_json_file(path).await?,
        None => InMemoryProductStore::new(),
    };
    let secondary = OpenFoodFactsClient::new(&config.fallback)?;

    let orchestrator = match LookupOrchestrator::new(&config, store, secondary) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {} ({:?})", e, e.category());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    let output = match cli.command {
        Command::Search { query, limit } => {
            let products = orchestrator.search_products(&query, limit).await;
            serde_json::to_string_pretty(&products)?
        }
        Command::Barcode { code } => {
            let product = orchestrator.get_product_by_barcode(&code).await;
            serde_json::to_string_pretty(&product)?
        }
    };
    println!("{}", output);

    for event in orchestrator.fallback_events().await {
        tracing::debug!(
            tier = event.tier.as_str(),
            reason = event.reason.as_str(),
            source = %event.source,
            "fallback recorded"
        );
    }

    Ok(())
}
