//! Diagnostic output on standard error.

use tracing_subscriber::EnvFilter;

/// Environment variable consulted when no `log=` option is given.
pub const LOG_ENV: &str = "JNI_CRITICAL_REPORTER_LOG";

/// Filter used when neither the option nor the environment variable is set.
pub const DEFAULT_FILTER: &str = "warn";

/// Resolves the diagnostic filter: the `log=` directive, else [`LOG_ENV`], else
/// [`DEFAULT_FILTER`].
#[must_use]
pub fn filter(directive: Option<&str>) -> EnvFilter {
    let configured = match directive {
        Some(directive) => EnvFilter::try_new(directive).ok(),
        None => EnvFilter::try_from_env(LOG_ENV).ok(),
    };
    configured.unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global `fmt` subscriber writing to standard error.
///
/// Does nothing if the host process already installed a global subscriber, or if
/// this is the second entry point of the agent to run.
pub fn init(directive: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(directive))
        .with_writer(std::io::stderr)
        .try_init();
}
