//! Structured logging bootstrap for binaries and tests.
//!
//! The library itself never installs a global subscriber: every
//! [`crate::session::UploadSession`] just emits `tracing` events into
//! whatever subscriber the host process configured, favoring a per-session
//! span over a process-wide singleton. This module only exists for
//! consumers (demo binaries, integration tests) that want a ready-made
//! `EnvFilter` + `fmt` setup.

use crate::config::{AppConfig, LogFormat};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initializes a process-wide `tracing` subscriber from the given config.
/// Safe to call at most once per process; subsequent calls are no-ops if a
/// global subscriber is already set.
pub fn init(config: &AppConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tus_client={}", config.log_level)));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already initialized; skipping");
    }
}
