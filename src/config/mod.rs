pub mod schema;

pub use schema::{AccessConfig, Config, GatewayConfig, StorageBackend, StorageConfig};
