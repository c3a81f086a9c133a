use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "ASKGUARD_LOG";

/// Install the stderr subscriber; stdout is reserved for JSON envelopes.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
