use std::env;

use tracing_subscriber::EnvFilter;

/// Console diagnostics. `RUST_LOG` wins over the verbose switch.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if verbose {
        tracing::debug!("verbose logging enabled");
    }
}

pub fn stage(stage: &str, message: impl AsRef<str>) {
    eprintln!("[danki::{}] {}", stage, message.as_ref());
}

pub fn env_flag() -> bool {
    env::var("DANKI_VERBOSE")
        .map(|value| parse_bool(value.trim()))
        .unwrap_or(false)
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
