//! CLI surface for the stoker scheduler: the `go` (Master) and `unit`
//! (DelayMaterializer / WorkerUnit) entrypoints named in §6.

pub mod cli;
pub mod dispatcher;
pub mod logging;

pub use cli::{Cli, Commands, UnitKindArg};
pub use dispatcher::LoggingDispatcher;
pub use logging::init_logging;

/// Resolves this host's identity once at startup, per the Design Notes'
/// resolution of the "host identity" open question. No crate in this
/// workspace's stack addresses hostname lookup, and reading one of the
/// platform's conventional environment variables is sufficient — falls back
/// to a fixed placeholder rather than failing startup.
pub fn local_host_identity() -> String {
    std::env::var("STOKER_HOST")
        .or_else(|_| std::env::var("HOSTNAME"))
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown-host".to_string())
}
