mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Logging starts once the config is loaded; see `run_from_args`.
    match CliCommand::run_from_args().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("rba error: {:#}", err);
            std::process::exit(1);
        }
    }
}
