//! Tracing subscriber setup

use crate::config::{Environment, LogFormat};
use crate::error::{NotifyError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level comes from the
/// `CAREHUB_ENV` profile. Fails if a global subscriber is already set.
pub fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = default_filter(&Environment::current());
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
    };

    result.map_err(|e| NotifyError::config(format!("tracing already initialized: {}", e)))
}

fn default_filter(env: &Environment) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,carehub_notify={}", env.default_log_level()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_fails() {
        let _ = init_tracing(LogFormat::Compact);
        assert!(matches!(
            init_tracing(LogFormat::Pretty),
            Err(NotifyError::Config(_))
        ));
    }
}
