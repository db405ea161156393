//! Master — per-host supervisor. Holds the `worker:<host>` lock, spawns unit
//! processes, and caps concurrency via the autoscaling formula in §4.6.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::StokerConfig;
use crate::error::{StokerError, StokerResult};
use crate::keys::KeyLayout;
use crate::metrics::QueueMetrics;
use crate::process::{ProcessLauncher, UnitKind};
use crate::store::Store;

pub struct Master {
    store: Arc<dyn Store>,
    launcher: Arc<dyn ProcessLauncher>,
    keys: KeyLayout,
    config: StokerConfig,
    host: String,
    master_hash: String,
}

impl Master {
    pub fn new(store: Arc<dyn Store>, launcher: Arc<dyn ProcessLauncher>, config: StokerConfig, host: String) -> Self {
        let keys = KeyLayout::new(&config.queue_name);
        Self {
            store,
            launcher,
            keys,
            config,
            host,
            master_hash: Uuid::new_v4().simple().to_string(),
        }
    }

    /// Acquires the host lock, runs the main loop until liveness fails, then
    /// unconditionally tears down every worker on this host.
    pub async fn run(&self) -> StokerResult<()> {
        self.startup().await?;
        let result = self.main_loop().await;
        if let Err(err) = self.kill_all().await {
            warn!(%err, "master teardown failed");
        }
        result
    }

    async fn startup(&self) -> StokerResult<()> {
        let master_key = self.keys.worker(&self.host);
        if !self.store.set_nx(&master_key, &self.master_hash, None).await? {
            return Err(StokerError::LockHeld);
        }
        self.store.expire(&master_key, self.config.wait_scan_secs).await?;
        self.store
            .hset(&self.keys.watch(&self.host), &master_key, &Utc::now().timestamp().to_string())
            .await?;
        QueueMetrics::update_leader_status(&self.config.queue_name, true);
        info!(host = %self.host, "master acquired lock");
        Ok(())
    }

    async fn main_loop(&self) -> StokerResult<()> {
        let master_key = self.keys.worker(&self.host);
        let idle_time = self.config.idle_time().as_secs();

        loop {
            self.launcher
                .spawn_detached(UnitKind::Delay, &self.config.queue_name)
                .await?;

            let valid = self.store.get(&master_key).await?.as_deref() == Some(self.master_hash.as_str());
            let running = self.store.expire(&master_key, self.config.wait_scan_secs).await?;
            if !valid || !running {
                debug!(host = %self.host, "master lost its lock, exiting loop");
                break;
            }

            let watch = self.store.hgetall(&self.keys.watch(&self.host)).await?;
            let Some(candidate) = self.store.srandmember(&self.keys.listen()).await? else {
                sleep(self.config.wait_idle()).await;
                continue;
            };
            if watch.len() > 1 {
                sleep(self.config.wait_idle()).await;
                continue;
            }

            let Some(raw) = self.get_job(&candidate, idle_time).await? else {
                sleep(self.config.wait_idle()).await;
                continue;
            };
            // Re-push to preserve at-least-once: this probe consumed the job
            // only to confirm work exists, not to process it here.
            self.store.lpush(&candidate, &raw).await?;

            self.spawn_realtime_units(watch.len() as u32).await?;
        }
        Ok(())
    }

    async fn get_job(&self, key: &str, idle_time: u64) -> StokerResult<Option<String>> {
        if self.store.llen(key).await? > 0 {
            if let Some((_, val)) = self.store.brpop(key, idle_time).await? {
                return Ok(Some(val));
            }
        }
        self.store.srem(&self.keys.listen(), key).await?;
        Ok(None)
    }

    /// `runs = liveWatchHashCount; left = maxFork - runs + 1; totalJobs = Σ
    /// LLEN over SMEMBERS listen; need = ceil(totalJobs / maxExec) - runs + 1;
    /// spawnCount = min(left, need)`.
    async fn spawn_realtime_units(&self, runs: u32) -> StokerResult<()> {
        let left = self.config.max_fork() as i64 - runs as i64 + 1;
        if left <= 0 {
            return Ok(());
        }

        let mut total_jobs: i64 = 0;
        for list_key in self.store.smembers(&self.keys.listen()).await? {
            total_jobs += self.store.llen(&list_key).await?;
        }
        let max_exec = self.config.max_exec() as i64;
        let need = div_ceil(total_jobs, max_exec) - runs as i64 + 1;
        let spawn_count = left.min(need).max(0);

        for _ in 0..spawn_count {
            self.launcher
                .spawn_detached(UnitKind::Realtime, &self.config.queue_name)
                .await?;
        }
        if spawn_count > 0 {
            debug!(spawn_count, total_jobs, runs, "spawned realtime units");
        }
        QueueMetrics::update_workers(&self.config.queue_name, runs as u64);
        Ok(())
    }

    async fn kill_all(&self) -> StokerResult<()> {
        let watch_key = self.keys.watch(&self.host);
        let worker_keys: Vec<String> = self.store.hgetall(&watch_key).await?.into_keys().collect();
        if worker_keys.is_empty() {
            return Ok(());
        }
        self.store.del(&worker_keys).await?;
        self.store.hdel(&watch_key, &worker_keys).await?;
        QueueMetrics::update_leader_status(&self.config.queue_name, false);
        info!(host = %self.host, count = worker_keys.len(), "master killed all workers");
        Ok(())
    }
}

fn div_ceil(a: i64, b: i64) -> i64 {
    if b <= 0 {
        0
    } else {
        (a + b - 1) / b
    }
}
