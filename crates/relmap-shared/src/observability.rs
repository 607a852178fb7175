//! Observability bootstrap: structured logging and the metrics recorder

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::{info, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::config::{LoggingConfig, ObservabilityConfig};

/// Global observability system
static OBSERVABILITY: OnceCell<ObservabilitySystem> = OnceCell::new();

/// Process-wide logging and metrics state
pub struct ObservabilitySystem {
    prometheus: Option<PrometheusHandle>,
}

impl ObservabilitySystem {
    /// Initialize the observability system; a second call fails
    pub fn init(config: &ObservabilityConfig) -> anyhow::Result<()> {
        if OBSERVABILITY.get().is_some() {
            anyhow::bail!("Observability system already initialized");
        }

        Self::init_logging(&config.logging)?;

        let prometheus = if config.metrics.enabled {
            Some(Self::init_metrics()?)
        } else {
            None
        };

        OBSERVABILITY
            .set(Self { prometheus })
            .map_err(|_| anyhow::anyhow!("Observability system already initialized"))?;

        info!(metrics = config.metrics.enabled, "Observability system initialized");
        Ok(())
    }

    fn parse_level(level: &str) -> Level {
        match level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    /// Initialize structured logging
    fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
        let env_filter = EnvFilter::builder()
            .with_default_directive(Self::parse_level(&config.level).into())
            .from_env_lossy();

        let registry = tracing_subscriber::registry().with(env_filter);

        let installed = match config.format.to_lowercase().as_str() {
            "pretty" => {
                let pretty_layer = tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_span_events(FmtSpan::CLOSE);
                registry.with(pretty_layer).try_init()
            }
            _ => {
                let json_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_span_events(FmtSpan::CLOSE);
                registry.with(json_layer).try_init()
            }
        };
        installed.context("failed to install tracing subscriber")
    }

    /// Install the Prometheus recorder behind the `metrics` facade
    fn init_metrics() -> anyhow::Result<PrometheusHandle> {
        PrometheusBuilder::new()
            .install_recorder()
            .context("failed to install Prometheus recorder")
    }

    /// Get the global observability system
    pub fn get() -> Option<&'static ObservabilitySystem> {
        OBSERVABILITY.get()
    }

    /// Prometheus text exposition of everything recorded so far
    pub fn render_metrics() -> Option<String> {
        Self::get()
            .and_then(|system| system.prometheus.as_ref())
            .map(PrometheusHandle::render)
    }
}
