pub mod fallback;
pub mod normalizer;
pub mod orchestrator;
pub mod primary_client;
pub mod retry;
pub mod search_cache;
pub mod token_manager;

pub use crate::domain::model::{NormalizedProduct, ProductSource, ProviderFood};
pub use crate::domain::ports::{FallbackSource, LocalProductStore};
pub use crate::utils::error::Result;
