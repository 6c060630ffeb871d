//! Cross-device notification sync client.
//!
//! `beacon` keeps three sources of truth consistent: a locally persisted account
//! list, the remote platform's account registry, and each account's live
//! notification feed. On boot the two account caches are reconciled into a single
//! converged list; afterwards platform callbacks (token requests, registration
//! expiry, feed changes) arrive as typed [`types::PlatformEvent`]s on an inbound
//! channel and are dispatched by a single processing loop.

use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod beacon;
pub mod platform;
pub mod types;

pub use beacon::accounts::{Account, AccountIdentity, AccountType, Registration};
pub use beacon::notifications::types::{
    NotificationRecord, NotificationStatus, ReadState, UserActionState,
};
pub use beacon::error::{BeaconError, Result};
pub use beacon::{Beacon, BeaconConfig};

static TRACING_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs the global tracing subscriber: stderr plus a daily-rolling log file in
/// `logs_dir`, filtered via `RUST_LOG` (default `info`).
///
/// Safe to call multiple times; only the first call has an effect. Embedders that
/// install their own subscriber should simply not call this.
pub fn init_tracing(logs_dir: &Path) {
    if TRACING_GUARD.get().is_some() {
        return;
    }

    let file_appender = tracing_appender::rolling::daily(logs_dir, "beacon.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init();

    if result.is_ok() {
        let _ = TRACING_GUARD.set(guard);
    }
}
