use anyhow::Result;
use clap::Parser;
use selfheal::cli::{self, runtime::init_logging, CliArgs};
use selfheal::config::load_config;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    init_logging(&args.log_level, args.debug)?;
    info!("Starting selfheal v{}", env!("CARGO_PKG_VERSION"));

    let loaded = load_config(args.config.as_ref()).await?;

    match cli::dispatch(args, &loaded).await {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}
