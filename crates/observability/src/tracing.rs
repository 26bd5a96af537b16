//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

use crate::LogSettings;

/// Build the filter: `RUST_LOG` wins, then the configured directives, then `info`.
pub fn filter(settings: &LogSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(settings: &LogSettings) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(settings))
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    let _ = if settings.json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_a_no_op() {
        let settings = LogSettings {
            filter: "debug".to_string(),
            json: false,
        };
        init(&settings);
        init(&settings);
    }

    #[test]
    fn malformed_directives_fall_back_to_info() {
        let settings = LogSettings {
            filter: "[[not a filter".to_string(),
            json: true,
        };
        let f = filter(&settings);
        assert!(!f.to_string().is_empty());
    }
}
