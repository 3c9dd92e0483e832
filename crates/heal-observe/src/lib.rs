//! Observability for healing runs
//!
//! - [`HealingLog`]: bounded in-memory history with filtered queries
//! - [`MetricsCollector`]: per-strategy and per-element-type success rates
//! - [`init_tracing`]: one-shot subscriber bootstrap
//!
//! Both collectors implement [`HealingObserver`], the sink the engine
//! reports every attempt and run to.

pub mod log;
pub mod metrics;
pub mod observer;
pub mod tracing;

pub use log::{HealingLog, HistoryFilter, DEFAULT_HISTORY_CAPACITY};
pub use metrics::{MetricsCollector, SuccessSummary};
pub use observer::{HealingObserver, NoopObserver, ObserverSet};
pub use self::tracing::{heal_span, init_tracing, record_outcome, LogSettings};
