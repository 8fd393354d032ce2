//! Subscriber installation for binaries and tests.
//!
//! Library code only emits `tracing` events. Whoever owns `main` (or a test
//! harness) calls [`init_tracing`] once.

use crate::{PlatformError, env};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output settings.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Recorded on the first event after installation
    pub service_name: String,
    /// `EnvFilter` directive used when `RUST_LOG` is absent
    pub log_level: String,
    /// Emit newline-delimited JSON instead of the human format
    pub json_output: bool,
}

impl Default for TracingConfig {
    /// Reads `SUBHUB_LOG_LEVEL` (default `info`) and `SUBHUB_LOG_JSON`.
    fn default() -> Self {
        let json_output = matches!(env::var("SUBHUB_LOG_JSON").as_deref(), Some("1" | "true"));
        Self {
            service_name: "subhub-infra".to_string(),
            log_level: env::var_or("SUBHUB_LOG_LEVEL", "info"),
            json_output,
        }
    }
}

impl TracingConfig {
    /// Override the service name.
    #[must_use]
    pub fn with_service_name(self, service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into(), ..self }
    }

    /// Override the fallback filter directive.
    #[must_use]
    pub fn with_log_level(self, log_level: impl Into<String>) -> Self {
        Self { log_level: log_level.into(), ..self }
    }

    /// Switch to JSON lines.
    #[must_use]
    pub const fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_level))
    }
}

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// [`PlatformError::Subscriber`] when one is already installed. Test
/// helpers that may run more than once can ignore it.
pub fn init_tracing(config: &TracingConfig) -> Result<(), PlatformError> {
    let registry = tracing_subscriber::registry().with(config.filter());
    let installed = if config.json_output {
        registry.with(fmt::layer().json().with_current_span(false)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };
    installed.map_err(|e| PlatformError::Subscriber(e.to_string()))?;

    tracing::debug!(service = %config.service_name, json = config.json_output, "subscriber installed");
    Ok(())
}
