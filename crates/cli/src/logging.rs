//! Logging backend for the CLI.
//!
//! The engine logs through the `log` facade; the subscriber installed here
//! picks those records up and writes them to stderr so stdout stays clean
//! for `--json`.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over `level`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{level},migcheck={level},migcheck_recon={level},migcheck_cli={level}"
        ))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Effective level: `-v` forces debug, otherwise the configured level.
pub fn effective_level(verbose: bool, configured: &str) -> String {
    if verbose {
        "debug".to_string()
    } else {
        configured.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_overrides_config() {
        assert_eq!(effective_level(true, "warn"), "debug");
        assert_eq!(effective_level(false, "WARN"), "warn");
    }
}
