mod commands;
pub mod targets;

pub use commands::{Cli, Commands};
