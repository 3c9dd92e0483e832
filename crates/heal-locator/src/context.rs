//! Per-invocation healing input

use std::fmt;
use std::sync::Arc;

use selfheal_core_types::{ElementLocation, ElementSelector};

use crate::page::PagePort;

/// Everything one healing run needs. Built once per call and only read.
#[derive(Clone)]
pub struct HealingContext {
    pub page: Arc<dyn PagePort>,

    /// The selector that stopped resolving
    pub original_selector: ElementSelector,

    /// Caller hint such as `button` or `input`, used for reporting
    pub element_type: Option<String>,

    /// Snapshot taken while the original selector still worked
    pub last_known: Option<ElementLocation>,

    /// Encoded image of the element as it looked before
    pub reference_screenshot: Option<Vec<u8>>,

    /// Serialized DOM captured alongside the failure, kept for diagnostics
    pub dom_snapshot: Option<String>,
}

impl HealingContext {
    pub fn new(page: Arc<dyn PagePort>, original_selector: ElementSelector) -> Self {
        Self {
            page,
            original_selector,
            element_type: None,
            last_known: None,
            reference_screenshot: None,
            dom_snapshot: None,
        }
    }

    pub fn with_element_type(mut self, element_type: impl Into<String>) -> Self {
        self.element_type = Some(element_type.into());
        self
    }

    pub fn with_last_known(mut self, location: ElementLocation) -> Self {
        self.last_known = Some(location);
        self
    }

    pub fn with_reference_screenshot(mut self, image: Vec<u8>) -> Self {
        self.reference_screenshot = Some(image);
        self
    }

    pub fn with_dom_snapshot(mut self, snapshot: impl Into<String>) -> Self {
        self.dom_snapshot = Some(snapshot.into());
        self
    }

    /// Cache key for the element this run is healing
    pub fn cache_key(&self) -> String {
        self.original_selector.to_string()
    }
}

impl fmt::Debug for HealingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealingContext")
            .field("original_selector", &self.original_selector)
            .field("element_type", &self.element_type)
            .field("last_known", &self.last_known.is_some())
            .field(
                "reference_screenshot",
                &self.reference_screenshot.as_ref().map(Vec::len),
            )
            .field("dom_snapshot", &self.dom_snapshot.as_ref().map(String::len))
            .finish()
    }
}
