//! Admin — operator-facing surfaces: enumerate queues/workers, roll back
//! failed jobs, trim logs, kill workers. A library API plus CLI subcommands;
//! never exposed over an untrusted channel (§4.7).

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::config::StokerConfig;
use crate::error::{StokerError, StokerResult};
use crate::job::{JobPayload, Mode};
use crate::keys::KeyLayout;
use crate::producer::Producer;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Success,
    Failed,
}

impl LogKind {
    fn as_str(&self) -> &'static str {
        match self {
            LogKind::Success => "success",
            LogKind::Failed => "failed",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogPage {
    pub key: String,
    pub len: i64,
    pub data: Vec<String>,
}

pub struct Admin {
    store: Arc<dyn Store>,
    keys: KeyLayout,
    config: StokerConfig,
}

impl Admin {
    pub fn new(store: Arc<dyn Store>, config: StokerConfig) -> Self {
        let keys = KeyLayout::new(&config.queue_name);
        Self { store, keys, config }
    }

    /// Returns a clone scoped to a different queue namespace; `self` is
    /// untouched.
    pub fn set_name(&self, name: &str) -> Self {
        let config = StokerConfig {
            queue_name: name.to_string(),
            ..self.config.clone()
        };
        Admin::new(self.store.clone(), config)
    }

    /// Deletes one worker string (or every worker on `host` when
    /// `proc_hash` is `None`) and compacts the matching watch-hash entries.
    pub async fn kill(&self, host: &str, proc_hash: Option<&str>) -> StokerResult<i64> {
        let watch_key = self.keys.watch(host);
        let targets: Vec<String> = match proc_hash {
            Some(id) => vec![self.keys.worker(id)],
            None => self.store.hgetall(&watch_key).await?.into_keys().collect(),
        };
        if targets.is_empty() {
            return Ok(0);
        }
        let deleted = self.store.del(&targets).await?;
        self.store.hdel(&watch_key, &targets).await?;
        info!(host, count = targets.len(), "admin killed workers");
        Ok(deleted)
    }

    /// Removes one entry from `failed` and re-enqueues it under the
    /// `"rollback"` group. Returns `0` when the entry was not found.
    pub async fn rollback(&self, job_json: &str) -> StokerResult<i64> {
        let removed = self.store.lrem(&self.keys.failed(), 1, job_json).await?;
        if removed == 0 {
            return Ok(0);
        }
        let entry: crate::job::LogEntry = serde_json::from_str(job_json)?;
        let cmd = entry.data.cmd().unwrap_or_default().to_string();
        let producer = Producer::new(self.store.clone(), &self.config);
        producer
            .add(&cmd, entry.data.into_map(), "rollback", Mode::Realtime, 0)
            .await?;
        Ok(removed)
    }

    pub async fn show_logs(&self, kind: LogKind, start: isize, stop: isize) -> StokerResult<LogPage> {
        let key = match kind {
            LogKind::Success => self.keys.success(),
            LogKind::Failed => self.keys.failed(),
        };
        let len = self.store.llen(&key).await?;
        let data = self.store.lrange(&key, start, stop).await?;
        Ok(LogPage { key, len, data })
    }

    /// Only `success` and `failed` are recognized log types.
    pub async fn del_logs(&self, kind: LogKind) -> StokerResult<()> {
        let key = match kind {
            LogKind::Success => self.keys.success(),
            LogKind::Failed => self.keys.failed(),
        };
        self.store.del(&[key]).await?;
        Ok(())
    }

    pub async fn show_length(&self, queue_key: &str) -> StokerResult<i64> {
        self.store.llen(queue_key).await
    }

    /// `SMEMBERS listen`: every group's job-list key currently registered.
    pub async fn show_queue(&self) -> StokerResult<Vec<String>> {
        self.store.smembers(&self.keys.listen()).await
    }

    /// Compacted watch hash for `host`: worker key → enrollment timestamp.
    /// A watch-hash entry whose `worker:<id>` string has already expired is
    /// garbage left behind by a unit that never reached `teardown`; it is
    /// dropped via `HDEL` here rather than returned.
    pub async fn show_process(&self, host: &str) -> StokerResult<HashMap<String, String>> {
        let watch_key = self.keys.watch(host);
        let watch = self.store.hgetall(&watch_key).await?;
        let mut live = HashMap::with_capacity(watch.len());
        let mut stale = Vec::new();
        for (worker_key, enrolled_at) in watch {
            if self.store.exists(&worker_key).await? {
                live.insert(worker_key, enrolled_at);
            } else {
                stale.push(worker_key);
            }
        }
        if !stale.is_empty() {
            self.store.hdel(&watch_key, &stale).await?;
        }
        Ok(live)
    }

    pub fn validate_log_kind(value: &str) -> StokerResult<LogKind> {
        match value {
            "success" => Ok(LogKind::Success),
            "failed" => Ok(LogKind::Failed),
            other => Err(StokerError::InvalidArgument(format!(
                "log type must be 'success' or 'failed', got '{other}'"
            ))),
        }
    }
}

impl LogKind {
    pub fn parse(value: &str) -> StokerResult<Self> {
        Admin::validate_log_kind(value)
    }
}
