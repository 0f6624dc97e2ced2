//! Tracing initialization (§1, §9). Grounded on the teacher's
//! `observability::init_tracing`, trimmed to what a library embedded in
//! someone else's process needs: an `EnvFilter`-driven subscriber writing to
//! stderr. The teacher's daily file rotation and panic hook are concerns of
//! its desktop shell, not of a library a caller's own binary links in.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber honoring `RUST_LOG`, defaulting to
/// `info` for this crate's own spans if unset. A no-op if a subscriber is
/// already installed (e.g. by the embedding application).
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rediorm=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).with_target(true).try_init();
}
