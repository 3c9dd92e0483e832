pub mod commands;
pub mod config;
pub mod env;
pub mod output;
pub mod runtime;
pub mod similarity;
pub mod visual;

pub use commands::Commands;
pub use env::CliArgs;

use anyhow::Result;

use crate::config::LoadedConfig;

pub async fn dispatch(args: CliArgs, loaded: &LoadedConfig) -> Result<()> {
    let output = args.output;
    match args.command {
        Commands::Config(cmd) => config::cmd_config(cmd, loaded, output).await,
        Commands::Phash(cmd) => visual::cmd_phash(cmd, output).await,
        Commands::Compare(cmd) => visual::cmd_compare(cmd, output).await,
        Commands::Locate(cmd) => visual::cmd_locate(cmd, loaded, output).await,
        Commands::TextSim(cmd) => similarity::cmd_text_sim(cmd, output),
    }
}
