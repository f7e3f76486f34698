pub mod commands;

pub use commands::{Cli, ClientCommands, Commands, ConfigCommands};
