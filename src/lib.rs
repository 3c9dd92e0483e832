//! SelfHeal library
//!
//! Façade over the workspace crates plus the configuration loader and CLI
//! used by the `selfheal` binary.

pub mod cli;
pub mod config;

pub use heal_locator::*;
pub use heal_observe;
pub use selfheal_core_types as types;
pub use visual_match;

pub use config::{load_config, LoadedConfig};
