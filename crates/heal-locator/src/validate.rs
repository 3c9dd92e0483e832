//! Live validation of candidate selectors

use std::time::Duration;

use selfheal_core_types::ElementSelector;
use tracing::debug;

use crate::errors::HealError;
use crate::page::PagePort;

/// Bounded "does this resolve?" check shared by every strategy
#[derive(Debug, Clone, Copy)]
pub struct LiveValidator {
    timeout: Duration,
}

impl LiveValidator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// True when `selector` resolves to at least one live element in time.
    ///
    /// Rejected selectors and slow queries count as misses; only a lost
    /// page is an error.
    pub async fn resolves(
        &self,
        page: &dyn PagePort,
        selector: &ElementSelector,
    ) -> Result<bool, HealError> {
        match tokio::time::timeout(self.timeout, page.count(selector)).await {
            Ok(Ok(count)) => {
                debug!("Candidate {} resolves to {} element(s)", selector, count);
                Ok(count >= 1)
            }
            Ok(Err(err)) if err.is_fatal() => Err(err.into()),
            Ok(Err(err)) => {
                debug!("Candidate {} rejected by page: {}", selector, err);
                Ok(false)
            }
            Err(_) => {
                debug!(
                    "Validation of {} exceeded {}ms",
                    selector,
                    self.timeout.as_millis()
                );
                Ok(false)
            }
        }
    }
}
