//! Tracing setup for processes embedding the stock engine.

use tracing_subscriber::EnvFilter;

/// Default directives: quiet overall, verbose for the quantity-bearing
/// crates so posted movements, transfer outcomes and count reconciliations
/// show up without drowning in the host application's noise.
const DEFAULT_DIRECTIVES: &str = "info,stockforge_ledger=debug,stockforge_transfer=debug,\
                                  stockforge_counting=debug";

/// Install the process-wide JSON subscriber with the stock-engine defaults.
///
/// `RUST_LOG` overrides the defaults; repeated calls are no-ops.
pub fn init() {
    init_with(DEFAULT_DIRECTIVES);
}

/// Install with explicit filter directives. Test harnesses and embedding
/// applications that want a different baseline pass their own.
pub fn init_with(directives: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_target(true)
        .with_current_span(false)
        .try_init();
}
