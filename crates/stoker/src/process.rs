//! OS abstraction for background process spawn.
//!
//! Replaces shell `popen` with a single method, `spawn_detached`, per the
//! design notes on re-architecting process launch. The master never reads
//! child output.

use async_trait::async_trait;
use tracing::debug;

use crate::error::StokerResult;

/// The unit flavor a spawned process should run as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Delay,
    Realtime,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Delay => "delay",
            UnitKind::Realtime => "realtime",
        }
    }
}

#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    async fn spawn_detached(&self, kind: UnitKind, queue_name: &str) -> StokerResult<()>;
}

/// Re-invokes the current executable as `unit --type=<kind> --name=<queue>`,
/// fully detached: no stdio is inherited and the master never waits on it.
pub struct TokioProcessLauncher;

#[async_trait]
impl ProcessLauncher for TokioProcessLauncher {
    async fn spawn_detached(&self, kind: UnitKind, queue_name: &str) -> StokerResult<()> {
        let exe = std::env::current_exe()
            .map_err(|e| crate::error::StokerError::ProcessLaunch(e.to_string()))?;
        let mut command = tokio::process::Command::new(exe);
        command
            .arg("unit")
            .arg(format!("--type={}", kind.as_str()))
            .arg(format!("--name={queue_name}"))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(false);
        command
            .spawn()
            .map_err(|e| crate::error::StokerError::ProcessLaunch(e.to_string()))?;
        debug!(kind = kind.as_str(), queue_name, "spawned detached unit");
        Ok(())
    }
}
