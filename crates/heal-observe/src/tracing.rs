use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing::{span, Level, Span};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

static INIT: OnceCell<()> = OnceCell::new();

/// How the healing log lines are rendered
#[derive(Debug, Clone, Copy)]
pub struct LogSettings {
    /// Floor used when `RUST_LOG` is unset
    pub level: Level,

    /// Adds targets and source locations to every line
    pub verbose: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            verbose: false,
        }
    }
}

/// Install the global stderr subscriber. Returns false when one was
/// already installed by an earlier call.
pub fn init_tracing(settings: &LogSettings) -> bool {
    let mut installed = false;
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::default().add_directive(LevelFilter::from_level(settings.level).into())
        });
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_target(settings.verbose)
            .with_file(settings.verbose)
            .with_line_number(settings.verbose);
        let subscriber = Registry::default().with(filter).with(fmt_layer);
        installed = tracing::subscriber::set_global_default(subscriber).is_ok();
    });
    installed
}

/// Span covering one healing run; outcome fields are filled by
/// [`record_outcome`]
pub fn heal_span(original_selector: &str, run_id: &str) -> Span {
    span!(
        Level::INFO,
        "heal",
        selector = %original_selector,
        run_id = %run_id,
        healed = tracing::field::Empty,
        latency_ms = tracing::field::Empty
    )
}

pub fn record_outcome(span: &Span, healed: bool, latency_ms: u64) {
    span.record("healed", healed);
    span.record("latency_ms", latency_ms);
}
