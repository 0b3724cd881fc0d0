mod logging;
mod metrics;

pub use logging::{LogRecord, RecentLogLayer, RecentLogs};
pub use metrics::{MetricType, MetricsRecorder, MetricsSnapshot};

use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by RUST_LOG env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "rostrum_session" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// How many warn+ records to keep in memory for the health endpoint.
    pub recent_log_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            json: false,
            recent_log_capacity: 64,
        }
    }
}

/// Handles to the in-process telemetry state. Keep it alive for the
/// lifetime of the process.
#[derive(Clone)]
pub struct TelemetryGuard {
    recent_logs: Arc<RecentLogs>,
    metrics: Arc<MetricsRecorder>,
}

impl TelemetryGuard {
    /// Telemetry that is not wired into a global subscriber. Used by tests
    /// and by embedders that install their own subscriber.
    pub fn detached(config: &TelemetryConfig) -> Self {
        Self {
            recent_logs: Arc::new(RecentLogs::new(config.recent_log_capacity)),
            metrics: Arc::new(MetricsRecorder::new()),
        }
    }

    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        Arc::clone(&self.metrics)
    }

    pub fn recent_logs(&self) -> Arc<RecentLogs> {
        Arc::clone(&self.recent_logs)
    }
}

/// Build the filter directive string from config, e.g. `info,rostrum_server=debug`.
pub fn filter_directive(config: &TelemetryConfig) -> String {
    let mut filter_str = config.log_level.to_string().to_lowercase();
    for (module, level) in &config.module_levels {
        filter_str.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
    }
    filter_str
}

/// Initialize the telemetry subsystem. Call once at startup.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    let guard = TelemetryGuard::detached(&config);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(&config)));

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    let recent_layer = RecentLogLayer::new(guard.recent_logs());

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .with(recent_layer)
        .init();

    guard
}
