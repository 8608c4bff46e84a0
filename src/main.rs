//! Provides the main entry point to the fabplan program.
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    fabplan::cli::run_cli().await
}
