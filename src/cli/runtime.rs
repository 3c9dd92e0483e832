use anyhow::{Context, Result};

/// Install the global subscriber. `RUST_LOG` still wins over `level`.
pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };
    heal_observe::init_tracing(&heal_observe::LogSettings {
        level,
        verbose: debug,
    });
    Ok(())
}
