use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variable holding an `EnvFilter` directive for the bounding
/// stack. Takes precedence over `RUST_LOG`.
pub const LOG_ENV: &str = "SPIRAL_BOUNDING_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

static INITIALISED: OnceLock<()> = OnceLock::new();

/// Configures the global tracing subscriber with the `info` default.
pub fn init_tracing() -> Result<(), InitError> {
    init_tracing_with(DEFAULT_DIRECTIVE)
}

/// Configures the global tracing subscriber, falling back to `default_directive`
/// when neither `SPIRAL_BOUNDING_LOG` nor `RUST_LOG` is set.
pub fn init_tracing_with(default_directive: &str) -> Result<(), InitError> {
    let filter = env_filter(default_directive)?;
    INITIALISED
        .set(())
        .map_err(|_| InitError::AlreadyInitialised)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(std::io::stdout().is_terminal());
    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| InitError::Subscriber(err.to_string()))
}

fn env_filter(default_directive: &str) -> Result<EnvFilter, InitError> {
    let directive = match std::env::var(LOG_ENV) {
        Ok(raw) if !raw.trim().is_empty() => raw,
        Ok(_) | Err(std::env::VarError::NotPresent) => {
            return Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive)));
        }
        Err(err) => return Err(InitError::Env(err)),
    };
    EnvFilter::try_new(&directive).map_err(|err| InitError::Directive {
        directive,
        message: err.to_string(),
    })
}

/// Errors emitted when configuring the tracing subscriber.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("tracing has already been initialised")]
    AlreadyInitialised,
    #[error("failed to read SPIRAL_BOUNDING_LOG: {0}")]
    Env(std::env::VarError),
    #[error("invalid log directive `{directive}`: {message}")]
    Directive { directive: String, message: String },
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    #[test]
    fn second_initialisation_is_rejected() {
        let _lock = ENV_GUARD.lock().unwrap();
        let first = init_tracing_with("debug");
        assert!(first.is_ok() || matches!(first, Err(InitError::Subscriber(_))));
        assert!(matches!(
            init_tracing(),
            Err(InitError::AlreadyInitialised)
        ));
    }

    #[test]
    fn malformed_directives_are_reported() {
        let _lock = ENV_GUARD.lock().unwrap();
        std::env::set_var(LOG_ENV, "st_bounding=notalevel");
        let result = env_filter(DEFAULT_DIRECTIVE);
        std::env::remove_var(LOG_ENV);
        assert!(matches!(result, Err(InitError::Directive { .. })));
    }
}
