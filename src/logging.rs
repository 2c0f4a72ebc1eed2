use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Installs the stdout subscriber. Must run before the first fork so every
/// process in the tree logs the same way. `RUST_LOG` wins over `level`.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .with_ansi(std::io::stdout().is_terminal())
        .with_target(false)
        .init();
}
