//! Tracing setup for hosts embedding this crate (and for the demo binary).
//! Mirrors the teacher's `start_daemon` setup: an `EnvFilter` that honors
//! `RUST_LOG` when set, falling back to a caller-supplied default level.

use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber writing to stderr.
///
/// `default_level` is used only when `RUST_LOG` is unset; callers that
/// already initialize tracing themselves should not call this.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
