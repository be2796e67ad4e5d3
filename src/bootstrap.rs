// src/bootstrap.rs
// Process setup for binaries embedding the pipeline.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Load `.env` (no-op when absent) and install a compact fmt subscriber
/// honoring `RUST_LOG`. Call once at startup, before building a
/// `PolishGate` so provider credentials from `.env` are visible.
/// Safe to call again; later calls keep the first subscriber.
pub fn init() {
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("policywatch_ingest=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_safe_to_call_repeatedly() {
        init();
        init();
    }
}
