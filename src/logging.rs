//! Tracing subscriber setup.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LEVEL: &str = "info";

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Records emitted through the `log`
/// facade (actix's request logger among them) are forwarded as well.
pub fn init_logging(level: Option<&str>) {
    let default_filter = format!(
        "lifeline_server={level},actix_web={level}",
        level = level.unwrap_or(DEFAULT_LEVEL)
    );

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true));

    // Ignore the error if a subscriber is already installed.
    let _ = subscriber.try_init();
}

#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_does_not_panic() {
        init_logging(Some("debug"));
        init_logging(None);
        init_test_logging();
    }
}
