use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;

use super::output::OutputFormat;
use crate::config::LoadedConfig;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Validate the effective configuration
    Check,
}

pub async fn cmd_config(args: ConfigArgs, loaded: &LoadedConfig, output: OutputFormat) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let yaml = loaded.config.to_yaml_string()?;
            output.print(&loaded.config, || {
                format!("# Effective configuration ({})\n{}", loaded.source(), yaml)
            })?;
        }
        ConfigAction::Check => {
            loaded.config.validate()?;
            let order: Vec<&str> = loaded
                .config
                .strategy_order()
                .iter()
                .map(|kind| kind.name())
                .collect();
            let report = json!({
                "source": loaded.source(),
                "valid": true,
                "strategies": order,
            });
            output.print(&report, || {
                format!(
                    "Configuration from {} is valid (strategies: {})",
                    loaded.source(),
                    order.join(", ")
                )
            })?;
        }
    }
    Ok(())
}
