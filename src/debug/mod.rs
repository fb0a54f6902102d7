//! Debug utilities and helpers
//!
//! Invariant checks that only bite in debug builds, and a one-call tracing
//! setup for binaries and tests embedding the crate.

/// Debug mode feature flag
pub const DEBUG_MODE: bool = cfg!(debug_assertions);

/// Filter used when neither an explicit filter nor `RUST_LOG` is given
pub const DEFAULT_FILTER: &str = "xfcollab=info";

/// Validate state invariant
///
/// Checks a state invariant and logs an error if it fails.
/// Only active in debug builds.
pub fn validate_invariant(condition: bool, message: &str) {
    if DEBUG_MODE && !condition {
        tracing::error!("Invariant violation: {}", message);
        #[cfg(debug_assertions)]
        {
            panic!("Invariant violation: {}", message);
        }
    }
}

/// Install a fmt subscriber filtered by `filter`, `RUST_LOG`, or
/// [`DEFAULT_FILTER`], in that order
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing(filter: Option<&str>) -> bool {
    let filter = filter
        .map(str::to_string)
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string());

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&filter))
        .with_target(true)
        .try_init()
        .is_ok()
}
