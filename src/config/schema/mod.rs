mod access;
mod core;
mod gateway;
mod storage;

pub use access::AccessConfig;
pub use self::core::Config;
pub use gateway::GatewayConfig;
pub use storage::{StorageBackend, StorageConfig};
