//! Shared primitives for the SelfHeal locator workspace.
//!
//! Everything here is a plain value object: selectors, element snapshots,
//! healing results and audit records. None of these types hold a live page
//! handle, so they can be cached, serialized and replayed across runs.

pub mod escape;
pub mod location;
pub mod rank;
pub mod record;
pub mod selector;

pub use location::*;
pub use rank::*;
pub use record::*;
pub use selector::*;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while building model values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("selector value is empty")]
    EmptySelector,

    #[error("confidence {0} is not a finite number")]
    InvalidConfidence(f64),
}

/// Identifier shared by every record emitted during one healing run.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}
