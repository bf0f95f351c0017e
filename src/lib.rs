pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod fetcher;
pub mod output;
pub mod server;
pub mod services;
pub mod sources;
pub mod util;
