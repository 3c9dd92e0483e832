//! Self-healing element locator
//!
//! When a stored selector stops resolving, [`HealingEngine::heal`] walks a
//! chain of strategies (CSS, XPath, text, structural, visual), ranks the
//! candidates each one proposes and returns the first one that resolves on
//! the live page. Every run is recorded in an in-memory history and in
//! per-strategy metrics.
//!
//! The browser is reached only through [`PagePort`], which any automation
//! backend can implement.

pub mod config;
pub mod context;
pub mod engine;
pub mod errors;
pub mod page;
pub mod similarity;
pub mod strategies;
pub mod validate;

pub use config::{
    ConfigError, CssSettings, HealingConfig, StrategySettings, StructuralSettings, TextSettings,
    VisualSettings, XpathSettings,
};
pub use context::HealingContext;
pub use engine::{HealingEngine, HealingEngineBuilder, LocationSource};
pub use errors::{HealError, PageError};
pub use page::PagePort;
pub use similarity::{text_similarity, TextMeasures};
pub use strategies::{
    build_strategies, CssGenerator, CssStrategy, HealingStrategy, StructuralAnalyzer,
    StructuralInfo, TextMatcher, VisualRecognizer, XpathGenerator, XpathStrategy,
};
pub use validate::LiveValidator;

pub use heal_observe::{HealingLog, HealingObserver, HistoryFilter, MetricsCollector, SuccessSummary};
pub use selfheal_core_types::{
    BoundingBox, ElementLocation, ElementSelector, HealingAttempt, HealingEvent, HealingResult,
    SelectorKind, StrategyKind,
};
