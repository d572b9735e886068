pub mod traits;
pub mod evolution;
pub mod defaults;
pub mod server;
pub mod manager;

pub use manager::{AppConfig, ConfigManager};
pub use evolution::{GaConfig, SelectionMethod, MAX_GENERATIONS, MAX_POPULATION_SIZE};
pub use defaults::DefaultsConfig;
pub use server::ServerConfig;
