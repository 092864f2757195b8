// Concrete implementations of the domain ports.

pub mod memory_store;
pub mod open_food_facts;

pub use memory_store::{InMemoryProductStore, StoredProduct};
pub use open_food_facts::OpenFoodFactsClient;
