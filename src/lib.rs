pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use adapters::{InMemoryProductStore, OpenFoodFactsClient};
pub use config::LookupConfig;
pub use core::{
    orchestrator::LookupOrchestrator, primary_client::PrimarySourceClient,
    search_cache::SearchCache, token_manager::TokenManager,
};
pub use domain::model::{NormalizedProduct, NutrientAmounts, ProductSource};
pub use utils::error::{LookupError, Result};
