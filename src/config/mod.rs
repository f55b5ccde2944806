//! # Configuration Management
//!
//! Layered configuration: built-in defaults, an optional YAML/TOML/JSON file,
//! then `VIGIL__`-prefixed environment variables
//! (e.g. `VIGIL__DATABASE__URL`, `VIGIL__SERVER__PORT`).

pub mod settings;

pub use settings::{
    AppConfig, CacheConfig, DatabaseConfig, GateMode, GlobalMiddlewareConfig,
    ObservabilityConfig, SecretTypeConfig, ServerConfig,
};

use std::path::Path;
use std::time::Duration;

use crate::errors::{Result, VigilError};

/// Environment prefix for configuration overrides
pub const ENV_PREFIX: &str = "VIGIL";

impl AppConfig {
    /// Load configuration from an optional file plus environment overrides, then validate it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(VigilError::config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX).prefix_separator("__").separator("__"),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!(
            types = config.types.len(),
            gate_types = ?config.global_middleware.types,
            purge_stale_after = ?config.purge_stale_after,
            "Loaded configuration"
        );

        Ok(config)
    }
}

/// Parse a human duration such as `"90 days"`, `"36h"` or `"500ms"`.
///
/// A bare number is read as seconds.
pub fn parse_duration(field: &str, raw: &str) -> Result<Duration> {
    let invalid = || VigilError::config(format!("Invalid duration '{}' for {}", raw, field));

    let s = raw.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (amount, unit) = s.split_at(split);
    let amount: u64 = amount.parse().map_err(|_| invalid())?;

    let seconds_per_unit = match unit.trim() {
        "ms" | "millis" => return Ok(Duration::from_millis(amount)),
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600,
        "d" | "day" | "days" => 86_400,
        "w" | "week" | "weeks" => 604_800,
        _ => return Err(invalid()),
    };
    amount.checked_mul(seconds_per_unit).map(Duration::from_secs).ok_or_else(invalid)
}

/// Render a duration in the largest whole unit that [`parse_duration`] reads back.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if duration.subsec_millis() != 0 || (secs == 0 && !duration.is_zero()) {
        return format!("{}ms", duration.as_millis());
    }
    match secs {
        0 => "0s".to_string(),
        s if s % 86_400 == 0 => format!("{} days", s / 86_400),
        s if s % 3_600 == 0 => format!("{}h", s / 3_600),
        s if s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{}s", s),
    }
}
