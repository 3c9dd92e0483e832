//! Page query port
//!
//! The engine never drives a browser itself. Everything it needs from the
//! live page goes through this narrow trait, so any automation library can
//! sit behind it.

use async_trait::async_trait;
use selfheal_core_types::{BoundingBox, ElementLocation, ElementSelector};

use crate::errors::PageError;

/// Read-only queries against one live page
#[async_trait]
pub trait PagePort: Send + Sync {
    /// Number of live elements `selector` resolves to
    async fn count(&self, selector: &ElementSelector) -> Result<usize, PageError>;

    /// Describe the first element `selector` resolves to
    async fn describe(
        &self,
        selector: &ElementSelector,
    ) -> Result<Option<ElementLocation>, PageError>;

    /// Describe every element with the given tag, in document order
    async fn query_all(&self, tag: &str) -> Result<Vec<ElementLocation>, PageError>;

    /// Encoded (PNG/JPEG) screenshot of the full page, or of `clip` only
    async fn screenshot(&self, clip: Option<BoundingBox>) -> Result<Vec<u8>, PageError>;

    async fn bounding_box(
        &self,
        selector: &ElementSelector,
    ) -> Result<Option<BoundingBox>, PageError>;

    /// Topmost element under a page coordinate
    async fn element_at_point(&self, x: f64, y: f64)
        -> Result<Option<ElementLocation>, PageError>;
}

/// Treat non-fatal page failures as "nothing found"
pub(crate) fn soften<T: Default>(result: Result<T, PageError>, what: &str) -> Result<T, PageError> {
    match result {
        Ok(value) => Ok(value),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            tracing::debug!("{} failed, continuing without it: {}", what, err);
            Ok(T::default())
        }
    }
}
