pub mod cli_main;
pub mod logger;
pub mod service;

pub use cli_main::{build_cli, CliCommand};
pub use logger::setup_logging_and_tracing;
