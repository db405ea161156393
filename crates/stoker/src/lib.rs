//! Stoker - distributed job queue with a master/worker scheduler over Redis.
//!
//! Producers submit named commands with payloads; consumers execute those
//! commands through a pluggable [`dispatch::Dispatcher`] that resolves a
//! command string to a handler, invokes it, and records success or failure.
//! Three delivery modes are supported: *realtime*, *delay* (fire after N
//! seconds), and *unique* (deduplicate on a logical id for N seconds).
//!
//! # Architecture
//!
//! ```text
//! Producer --(Store)--> Redis --(Store)--> Master
//!                                             │ spawns detached processes
//!                              ┌──────────────┴──────────────┐
//!                              ▼                              ▼
//!                     DelayMaterializer                  WorkerUnit
//!                (delay:* -> jobs:<group>)        (BRPOP jobs:<group> -> Dispatcher)
//!                                                           │
//!                                                  success / failed logs
//! ```
//!
//! Each Master, DelayMaterializer, and WorkerUnit is its own OS process; the
//! only shared state is Redis. See `SPEC_FULL.md` in the repository root for
//! the full component design.

pub mod admin;
pub mod config;
pub mod delay;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod keys;
pub mod master;
pub mod metrics;
pub mod process;
pub mod producer;
pub mod store;
pub mod worker;

pub use admin::{Admin, LogKind, LogPage};
pub use config::{RedisConfig, StokerConfig};
pub use delay::DelayMaterializer;
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use error::{StokerError, StokerResult};
pub use job::{DelayEnvelope, JobPayload, LogEntry, Mode};
pub use keys::KeyLayout;
pub use master::Master;
pub use metrics::{register_metrics, QueueMetrics};
pub use process::{ProcessLauncher, TokioProcessLauncher, UnitKind};
pub use producer::Producer;
pub use store::{create_pool, RedisStore, Store};
pub use worker::WorkerUnit;

/// Re-export of the traits and types most call sites need.
pub mod prelude {
    pub use crate::config::StokerConfig;
    pub use crate::dispatch::{DispatchOutcome, Dispatcher};
    pub use crate::error::{StokerError, StokerResult};
    pub use crate::job::{JobPayload, Mode};
    pub use crate::keys::KeyLayout;
    pub use crate::store::Store;
}
