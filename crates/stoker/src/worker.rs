//! WorkerUnit — the "realtime" unit flavor: a single short-lived consumer
//! process that pops and executes a bounded batch of jobs.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::StokerConfig;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::error::StokerResult;
use crate::job::{JobPayload, LogEntry};
use crate::keys::KeyLayout;
use crate::metrics::QueueMetrics;
use crate::store::Store;

pub struct WorkerUnit {
    store: Arc<dyn Store>,
    dispatcher: Arc<dyn Dispatcher>,
    keys: KeyLayout,
    config: StokerConfig,
    host: String,
    unit_id: String,
}

impl WorkerUnit {
    pub fn new(store: Arc<dyn Store>, dispatcher: Arc<dyn Dispatcher>, config: StokerConfig, host: String) -> Self {
        let keys = KeyLayout::new(&config.queue_name);
        Self {
            store,
            dispatcher,
            keys,
            config,
            host,
            unit_id: Uuid::new_v4().simple().to_string(),
        }
    }

    /// Enrolls, runs the bounded batch loop, and tears down unconditionally.
    pub async fn run(&self) -> StokerResult<()> {
        self.enroll().await?;
        let result = self.work_loop().await;
        if let Err(err) = self.teardown().await {
            warn!(%err, unit_id = %self.unit_id, "worker teardown failed");
        }
        result
    }

    async fn enroll(&self) -> StokerResult<()> {
        let worker_key = self.keys.worker(&self.unit_id);
        self.store
            .set_ex(&worker_key, "", self.config.wait_scan_secs)
            .await?;
        self.store
            .hset(&self.keys.watch(&self.host), &worker_key, &Utc::now().timestamp().to_string())
            .await?;
        info!(unit_id = %self.unit_id, "worker enrolled");
        Ok(())
    }

    async fn teardown(&self) -> StokerResult<()> {
        let worker_key = self.keys.worker(&self.unit_id);
        self.store.del(&[worker_key.clone()]).await?;
        self.store.hdel(&self.keys.watch(&self.host), &[worker_key]).await?;
        info!(unit_id = %self.unit_id, "worker torn down");
        Ok(())
    }

    async fn work_loop(&self) -> StokerResult<()> {
        let worker_key = self.keys.worker(&self.unit_id);
        let idle_time = self.config.idle_time().as_secs();

        for _ in 0..self.config.max_exec() {
            if !self.store.exists(&worker_key).await? {
                debug!(unit_id = %self.unit_id, "worker string gone, exiting");
                break;
            }
            if !self.store.expire(&worker_key, self.config.wait_scan_secs).await? {
                debug!(unit_id = %self.unit_id, "liveness refresh failed, exiting");
                break;
            }

            let Some(candidate) = self.store.srandmember(&self.keys.listen()).await? else {
                break;
            };

            let Some(raw) = self.get_job(&candidate, idle_time).await? else {
                continue;
            };

            self.execute(&candidate, &raw).await?;
        }
        Ok(())
    }

    /// `GetJob(key, idleTime)`: BRPOP if the list is non-empty, otherwise
    /// compact `listen` for this key and return nothing.
    async fn get_job(&self, key: &str, idle_time: u64) -> StokerResult<Option<String>> {
        if self.store.llen(key).await? > 0 {
            if let Some((_, val)) = self.store.brpop(key, idle_time).await? {
                return Ok(Some(val));
            }
        }
        self.store.srem(&self.keys.listen(), key).await?;
        Ok(None)
    }

    async fn execute(&self, group_key: &str, raw: &str) -> StokerResult<()> {
        let group = group_key
            .rsplit(':')
            .next()
            .unwrap_or_default()
            .to_string();
        let payload = JobPayload::from_json(raw)?;
        QueueMetrics::dispatched(&self.config.queue_name, &group);

        let outcome = self.dispatch_with_panic_guard(payload.clone()).await;

        let entry = LogEntry {
            data: payload,
            time: Utc::now().timestamp(),
            result: match &outcome {
                DispatchOutcome::Success => serde_json::Value::Null,
                DispatchOutcome::Failure(v) => v.clone(),
            },
        };
        let entry_json = serde_json::to_string(&entry)?;

        match outcome {
            DispatchOutcome::Success => {
                self.store.lpush(&self.keys.success(), &entry_json).await?;
                self.store
                    .ltrim(&self.keys.success(), 0, self.config.max_hist() as isize - 1)
                    .await?;
                QueueMetrics::succeeded(&self.config.queue_name, &group);
            }
            DispatchOutcome::Failure(_) => {
                self.store.lpush(&self.keys.failed(), &entry_json).await?;
                QueueMetrics::failed(&self.config.queue_name, &group);
            }
        }
        Ok(())
    }

    /// Runs the dispatcher on a separate task so a handler panic is caught as
    /// a failure (`JoinError::is_panic`) instead of unwinding the worker loop.
    async fn dispatch_with_panic_guard(&self, payload: JobPayload) -> DispatchOutcome {
        let dispatcher = self.dispatcher.clone();
        let handle = tokio::spawn(async move { dispatcher.dispatch(&payload).await });
        match handle.await {
            Ok(result) => DispatchOutcome::classify(result),
            Err(join_err) => DispatchOutcome::classify(Err(if join_err.is_panic() {
                "handler panicked".to_string()
            } else {
                "handler task was cancelled".to_string()
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::Producer;
    use crate::store::fake::FakeStore;
    use async_trait::async_trait;
    use serde_json::Map;

    struct StubDispatcher {
        result: Result<serde_json::Value, String>,
    }

    #[async_trait]
    impl Dispatcher for StubDispatcher {
        async fn dispatch(&self, _payload: &JobPayload) -> Result<serde_json::Value, String> {
            self.result.clone()
        }
    }

    #[tokio::test]
    async fn processes_a_realtime_job_and_logs_success() {
        let store = Arc::new(FakeStore::new());
        let config = StokerConfig::default();
        let keys = KeyLayout::new(&config.queue_name);
        let producer = Producer::new(store.clone(), &config);
        let mut fields = Map::new();
        fields.insert("v".to_string(), json!(1));
        producer.add("a", fields, "g", crate::job::Mode::Realtime, 0).await.unwrap();

        let dispatcher = Arc::new(StubDispatcher { result: Ok(serde_json::Value::Bool(true)) });
        let unit = WorkerUnit::new(store.clone(), dispatcher, config, "host1".to_string());
        unit.run().await.unwrap();

        assert_eq!(store.llen(&keys.success()).await.unwrap(), 1);
        assert_eq!(store.llen(&keys.failed()).await.unwrap(), 0);
        // Teardown ran: worker string and watch-hash field are both gone.
        assert!(store.hgetall(&keys.watch("host1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_handler_is_logged_to_failed() {
        let store = Arc::new(FakeStore::new());
        let config = StokerConfig::default();
        let keys = KeyLayout::new(&config.queue_name);
        let producer = Producer::new(store.clone(), &config);
        producer.add("fail", Map::new(), "g", crate::job::Mode::Realtime, 0).await.unwrap();

        let dispatcher = Arc::new(StubDispatcher { result: Err("boom".to_string()) });
        let unit = WorkerUnit::new(store.clone(), dispatcher, config, "host1".to_string());
        unit.run().await.unwrap();

        assert_eq!(store.llen(&keys.failed()).await.unwrap(), 1);
        assert_eq!(store.llen(&keys.success()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_listen_set_exits_immediately() {
        let store = Arc::new(FakeStore::new());
        let config = StokerConfig::default();
        let dispatcher = Arc::new(StubDispatcher { result: Ok(serde_json::Value::Null) });
        let unit = WorkerUnit::new(store.clone(), dispatcher, config, "host1".to_string());
        unit.run().await.unwrap();
        let keys = KeyLayout::new("main");
        assert!(store.hgetall(&keys.watch("host1")).await.unwrap().is_empty());
    }
}
