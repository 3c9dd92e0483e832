//! Healing orchestrator
//!
//! Runs the configured strategies one after another against a single
//! element, validating each strategy's candidates on the live page and
//! stopping at the first selector that resolves. A strategy is never
//! retried, only advanced past.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use heal_observe::{
    heal_span, record_outcome, HealingLog, HealingObserver, MetricsCollector, ObserverSet,
};
use selfheal_core_types::{
    rank_selectors, ElementLocation, ElementSelector, HealingAttempt, HealingEvent,
    HealingResult, RunId, StrategyKind,
};
use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};

use crate::config::{ConfigError, HealingConfig};
use crate::context::HealingContext;
use crate::errors::HealError;
use crate::page::soften;
use crate::strategies::{build_strategies, HealingStrategy};
use crate::validate::LiveValidator;

/// Where the element description for a run came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationSource {
    /// `last_known` on the context
    Context,
    /// Remembered from an earlier run
    Cache,
    /// Described live through the original selector
    Page,
    Unavailable,
}

impl LocationSource {
    pub fn name(&self) -> &'static str {
        match self {
            LocationSource::Context => "context",
            LocationSource::Cache => "cache",
            LocationSource::Page => "page",
            LocationSource::Unavailable => "unavailable",
        }
    }
}

/// What one strategy produced
#[derive(Debug, Clone, Default)]
struct StrategyOutcome {
    /// Ranked, including those below the confidence threshold
    candidates: Vec<ElementSelector>,
    validated: usize,
    selected: Option<ElementSelector>,
    error: Option<HealError>,
}

impl StrategyOutcome {
    fn failed(error: HealError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }
}

/// Builder for [`HealingEngine`]
pub struct HealingEngineBuilder {
    config: HealingConfig,
    custom: Vec<Arc<dyn HealingStrategy>>,
    observers: Vec<Arc<dyn HealingObserver>>,
}

impl HealingEngineBuilder {
    /// Register an extra strategy, run after the configured ones
    pub fn with_strategy(mut self, strategy: Arc<dyn HealingStrategy>) -> Self {
        self.custom.push(strategy);
        self
    }

    /// Register an extra sink for attempts and runs
    pub fn with_observer(mut self, observer: Arc<dyn HealingObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn build(self) -> Result<HealingEngine, ConfigError> {
        self.config.validate()?;

        let mut strategies = build_strategies(&self.config);
        strategies.extend(self.custom);

        let log = Arc::new(HealingLog::new(self.config.history_capacity));
        let metrics = Arc::new(MetricsCollector::new());
        let mut observers = ObserverSet::new();
        observers.push(log.clone());
        observers.push(metrics.clone());
        for observer in self.observers {
            observers.push(observer);
        }

        Ok(HealingEngine {
            validator: LiveValidator::new(Duration::from_millis(
                self.config.validation_timeout_ms,
            )),
            config: self.config,
            strategies,
            observers,
            log,
            metrics,
            locations: DashMap::new(),
        })
    }
}

/// Self-healing selector engine.
///
/// Owns the strategy registry, the audit sinks and a cache of element
/// descriptions keyed by original selector. Safe to share between tasks;
/// independent runs do not block each other.
pub struct HealingEngine {
    config: HealingConfig,
    strategies: Vec<Arc<dyn HealingStrategy>>,
    validator: LiveValidator,
    observers: ObserverSet,
    log: Arc<HealingLog>,
    metrics: Arc<MetricsCollector>,
    locations: DashMap<String, ElementLocation>,
}

impl HealingEngine {
    pub fn builder(config: HealingConfig) -> HealingEngineBuilder {
        HealingEngineBuilder {
            config,
            custom: Vec::new(),
            observers: Vec::new(),
        }
    }

    pub fn new(config: HealingConfig) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &HealingConfig {
        &self.config
    }

    pub fn log(&self) -> &Arc<HealingLog> {
        &self.log
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Registered strategies in execution order
    pub fn strategy_order(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    pub fn cached_location(&self, original: &ElementSelector) -> Option<ElementLocation> {
        self.locations.get(&original.to_string()).map(|l| l.clone())
    }

    /// Seed the cache ahead of time, e.g. right after a successful lookup
    pub fn remember_location(&self, original: &ElementSelector, location: ElementLocation) {
        self.locations.insert(original.to_string(), location);
    }

    pub fn forget_location(&self, original: &ElementSelector) {
        self.locations.remove(&original.to_string());
    }

    /// Heal one broken selector.
    ///
    /// Expected failures come back as an unsuccessful [`HealingResult`];
    /// `Err` means the page could not be reached at all.
    pub async fn heal(&self, ctx: &HealingContext) -> Result<HealingResult, HealError> {
        let run_id = RunId::new();
        let span = heal_span(&ctx.original_selector.value, &run_id.to_string());
        let started = Instant::now();

        let outcome = self
            .run(ctx, &run_id, started)
            .instrument(span.clone())
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let (result, fatal) = match outcome {
            Ok(result) => (result, None),
            Err(err) => {
                let result = HealingResult::failed(None, err.to_string(), Vec::new(), 0)
                    .with_metadata("run_id", run_id.to_string());
                (result, Some(err))
            }
        };
        let result = result.with_duration_ms(elapsed_ms);
        record_outcome(&span, result.success, elapsed_ms);

        self.observers.on_event(&HealingEvent::from_result(
            run_id,
            ctx.original_selector.value.clone(),
            ctx.element_type.clone(),
            &result,
        ));

        match fatal {
            Some(err) => {
                warn!("Healing aborted for {}: {}", ctx.original_selector, err);
                Err(err)
            }
            None => Ok(result),
        }
    }

    async fn run(
        &self,
        ctx: &HealingContext,
        run_id: &RunId,
        started: Instant,
    ) -> Result<HealingResult, HealError> {
        let deadline = started + Duration::from_millis(self.config.timeout_ms);
        let (location, source) = self.seed_location(ctx).await?;
        info!(
            "Healing {} with {} strategies (location from {})",
            ctx.original_selector,
            self.strategies.len(),
            source.name()
        );

        let mut alternatives: Vec<ElementSelector> = Vec::new();
        let mut tried: Vec<StrategyKind> = Vec::new();
        let mut failures: Vec<(StrategyKind, String)> = Vec::new();

        for strategy in &self.strategies {
            let kind = strategy.kind();
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                let err = timeout_error(kind, started);
                warn!("{}; skipping remaining strategies", err);
                failures.push((kind, err.to_string()));
                break;
            }

            tried.push(kind);
            let attempt_started = Instant::now();
            let (outcome, timed_out) = match tokio::time::timeout(
                remaining,
                self.run_strategy(strategy.as_ref(), ctx, location.as_ref()),
            )
            .await
            {
                Ok(Ok(outcome)) => (outcome, false),
                Ok(Err(fatal)) => {
                    let outcome = StrategyOutcome::failed(fatal.clone());
                    self.emit_attempt(run_id, ctx, kind, &outcome, attempt_started);
                    return Err(fatal);
                }
                Err(_) => (
                    StrategyOutcome::failed(timeout_error(kind, started)),
                    true,
                ),
            };
            self.emit_attempt(run_id, ctx, kind, &outcome, attempt_started);
            alternatives.extend(outcome.candidates.iter().cloned());

            if let Some(selected) = outcome.selected {
                info!(
                    "Healed {} -> {} via {} (confidence {:.2})",
                    ctx.original_selector, selected, kind, selected.confidence
                );
                self.remember_healed(ctx, &selected, location).await;
                return Ok(HealingResult::healed(
                    kind,
                    selected,
                    alternatives,
                    self.config.max_alternatives,
                )
                .with_strategies_tried(tried)
                .with_metadata("run_id", run_id.to_string())
                .with_metadata("location_source", source.name()));
            }

            if let Some(err) = &outcome.error {
                warn!("Strategy {} failed: {}", kind, err);
                failures.push((kind, err.to_string()));
            }
            if timed_out {
                break;
            }
        }

        let summary = if failures.is_empty() {
            "no strategy was run".to_string()
        } else {
            let parts: Vec<String> = failures
                .iter()
                .map(|(kind, err)| format!("{}: {}", kind, err))
                .collect();
            format!("all strategies exhausted ({})", parts.join("; "))
        };
        let errors: Map<String, Value> = failures
            .into_iter()
            .map(|(kind, err)| (kind.name().to_string(), Value::from(err)))
            .collect();
        warn!("Healing failed for {}: {}", ctx.original_selector, summary);

        Ok(HealingResult::failed(
            None,
            summary,
            rank_selectors(alternatives),
            self.config.max_alternatives,
        )
        .with_strategies_tried(tried)
        .with_metadata("run_id", run_id.to_string())
        .with_metadata("location_source", source.name())
        .with_metadata("strategy_errors", Value::Object(errors)))
    }

    async fn run_strategy(
        &self,
        strategy: &dyn HealingStrategy,
        ctx: &HealingContext,
        location: Option<&ElementLocation>,
    ) -> Result<StrategyOutcome, HealError> {
        let candidates = match strategy.candidates(ctx, location).await {
            Ok(candidates) => rank_selectors(candidates),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => return Ok(StrategyOutcome::failed(err)),
        };
        if candidates.is_empty() {
            return Ok(StrategyOutcome::failed(HealError::NoCandidatesGenerated(
                format!("{} strategy produced no candidates", strategy.name()),
            )));
        }

        let threshold = self.config.confidence_threshold;
        let mut validated = 0;
        let mut selected = None;
        for candidate in candidates
            .iter()
            .filter(|c| c.meets(threshold) && !c.value.trim().is_empty())
            .take(self.config.max_attempts)
        {
            validated += 1;
            debug!(
                "Validating {} candidate {} ({:.2})",
                strategy.name(),
                candidate,
                candidate.confidence
            );
            if self.validator.resolves(ctx.page.as_ref(), candidate).await? {
                selected = Some(candidate.clone());
                break;
            }
        }

        let error = match (&selected, validated) {
            (Some(_), _) => None,
            (None, 0) => Some(HealError::NoCandidatesGenerated(format!(
                "no candidate reached confidence {:.2}",
                threshold
            ))),
            (None, tried) => Some(strategy.unmatched_error(candidates.len(), tried)),
        };

        Ok(StrategyOutcome {
            candidates,
            validated,
            selected,
            error,
        })
    }

    /// `last_known` on the context, else the cache, else a live description
    /// of the original selector
    async fn seed_location(
        &self,
        ctx: &HealingContext,
    ) -> Result<(Option<ElementLocation>, LocationSource), HealError> {
        let key = ctx.cache_key();
        if let Some(location) = &ctx.last_known {
            self.locations.insert(key, location.clone());
            return Ok((Some(location.clone()), LocationSource::Context));
        }
        if let Some(location) = self.locations.get(&key) {
            return Ok((Some(location.clone()), LocationSource::Cache));
        }
        if self.config.enable_dom_snapshots {
            let described = match tokio::time::timeout(
                self.validator.timeout(),
                ctx.page.describe(&ctx.original_selector),
            )
            .await
            {
                Ok(result) => soften(result, "describe")?,
                Err(_) => None,
            };
            if let Some(location) = described {
                self.locations.insert(key, location.clone());
                return Ok((Some(location), LocationSource::Page));
            }
        }
        Ok((None, LocationSource::Unavailable))
    }

    /// Refresh the cached description from the healed element
    async fn remember_healed(
        &self,
        ctx: &HealingContext,
        selected: &ElementSelector,
        previous: Option<ElementLocation>,
    ) {
        let hash = selected
            .metadata
            .get("perceptual_hash")
            .and_then(Value::as_u64);

        let mut fresh = None;
        if self.config.enable_dom_snapshots {
            match tokio::time::timeout(self.validator.timeout(), ctx.page.describe(selected)).await
            {
                Ok(Ok(location)) => fresh = location,
                Ok(Err(err)) => debug!("Could not describe healed element: {}", err),
                Err(_) => debug!("Describing healed element timed out"),
            }
        }

        if let Some(mut location) = fresh.or(previous) {
            if let Some(hash) = hash {
                location.perceptual_hash = Some(hash);
            }
            self.locations.insert(ctx.cache_key(), location);
        }
    }

    fn emit_attempt(
        &self,
        run_id: &RunId,
        ctx: &HealingContext,
        strategy: StrategyKind,
        outcome: &StrategyOutcome,
        started: Instant,
    ) {
        let attempt = HealingAttempt {
            run_id: run_id.clone(),
            timestamp: Utc::now(),
            strategy,
            original_selector: ctx.original_selector.value.clone(),
            element_type: ctx.element_type.clone(),
            candidates_generated: outcome.candidates.len(),
            candidates_validated: outcome.validated,
            selected: outcome.selected.clone(),
            success: outcome.selected.is_some(),
            confidence: outcome
                .selected
                .as_ref()
                .map(|s| s.confidence)
                .unwrap_or(0.0),
            duration_ms: started.elapsed().as_millis() as u64,
            error: outcome.error.as_ref().map(|e| e.to_string()),
        };
        self.observers.on_attempt(&attempt);
    }
}

fn timeout_error(kind: StrategyKind, started: Instant) -> HealError {
    HealError::StrategyTimeout {
        strategy: kind.name().to_string(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}

impl std::fmt::Debug for HealingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealingEngine")
            .field("strategies", &self.strategy_order())
            .field("cached_locations", &self.locations.len())
            .finish()
    }
}
