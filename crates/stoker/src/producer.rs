//! `Add` API: route a new job to the realtime / delay / unique lane.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Map;
use tracing::debug;

use crate::config::StokerConfig;
use crate::error::StokerResult;
use crate::job::{DelayEnvelope, JobPayload, Mode};
use crate::keys::KeyLayout;
use crate::metrics::QueueMetrics;
use crate::store::Store;

/// Sentinel returned by `Producer::add` when unique-mode deduplication
/// rejected the submission. Not an error.
pub const DEDUP_REJECTED: i64 = -1;

pub struct Producer {
    store: Arc<dyn Store>,
    keys: KeyLayout,
    queue_name: String,
}

impl Producer {
    pub fn new(store: Arc<dyn Store>, config: &StokerConfig) -> Self {
        Self {
            store,
            keys: KeyLayout::new(&config.queue_name),
            queue_name: config.queue_name.clone(),
        }
    }

    /// `Add(cmd, payload, group, mode, time)`.
    ///
    /// Returns `-1` if unique deduplication rejected the submission, otherwise
    /// the new length of the target list (>= 1). Storage failures propagate as
    /// `Err` rather than the `0` sentinel the source used, since idiomatic
    /// Rust surfaces I/O failure through `Result` instead of overloading the
    /// success type's range.
    pub async fn add(
        &self,
        cmd: &str,
        fields: Map<String, serde_json::Value>,
        group: &str,
        mode: Mode,
        time: u64,
    ) -> StokerResult<i64> {
        let group = StokerConfig::normalize_group(group);
        // Normalization rule: time == 0 forces realtime, regardless of the
        // mode requested, to avoid a permanent unique marker or a zero-delay
        // bucket colliding with the realtime lane.
        let mode = if time == 0 { Mode::Realtime } else { mode };
        let payload = JobPayload::new(cmd, fields);

        let len = match mode {
            Mode::Realtime => self.push_realtime(&group, &payload).await?,
            Mode::Unique => {
                let uid = match payload.unique_id() {
                    Some(id) => format!("{cmd}:{id}"),
                    None => cmd.to_string(),
                };
                let unique_key = self.keys.unique(&uid);
                let now = Utc::now().timestamp().to_string();
                if !self.store.set_nx(&unique_key, &now, None).await? {
                    QueueMetrics::dedup_rejected(&self.queue_name);
                    debug!(uid, "unique submission rejected by dedup");
                    return Ok(DEDUP_REJECTED);
                }
                self.store.expire(&unique_key, time).await?;
                self.push_realtime(&group, &payload).await?
            }
            Mode::Delay => self.push_delay(&group, &payload, time).await?,
        };

        QueueMetrics::job_enqueued(&self.queue_name, &group, mode.as_str());
        Ok(len)
    }

    async fn push_realtime(&self, group: &str, payload: &JobPayload) -> StokerResult<i64> {
        let jobs_key = self.keys.jobs(group);
        // SADD must precede the first LPUSH on a freshly-empty list so a
        // concurrent master does not wake before the push lands (harmless
        // even if it did, since BRPOP just blocks).
        self.store.sadd(&self.keys.listen(), &jobs_key).await?;
        let len = self.store.lpush(&jobs_key, &payload.to_json()?).await?;
        Ok(len)
    }

    async fn push_delay(&self, group: &str, payload: &JobPayload, time: u64) -> StokerResult<i64> {
        let fire_at = Utc::now().timestamp() + time as i64;
        let is_new = self
            .store
            .hsetnx(&self.keys.delay_lock(), &fire_at.to_string(), &fire_at.to_string())
            .await?;
        if is_new {
            self.store
                .zadd(&self.keys.delay_time(), &fire_at.to_string(), fire_at as f64)
                .await?;
        }
        let envelope = DelayEnvelope {
            group: group.to_string(),
            job: payload.clone(),
        };
        let bucket_key = self.keys.delay_jobs(fire_at);
        let len = self.store.lpush(&bucket_key, &serde_json::to_string(&envelope)?).await?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fake::FakeStore;

    fn producer() -> (Producer, Arc<FakeStore>, KeyLayout) {
        let store = Arc::new(FakeStore::new());
        let config = StokerConfig::default();
        let keys = KeyLayout::new(&config.queue_name);
        let producer = Producer::new(store.clone(), &config);
        (producer, store, keys)
    }

    #[tokio::test]
    async fn realtime_adds_to_listen_and_pushes_job() {
        let (producer, store, keys) = producer();
        let mut fields = Map::new();
        fields.insert("v".to_string(), serde_json::json!(1));
        let len = producer.add("a", fields, "g", Mode::Realtime, 0).await.unwrap();
        assert_eq!(len, 1);
        assert!(store.smembers(&keys.listen()).await.unwrap().contains(&keys.jobs("g")));
    }

    #[tokio::test]
    async fn empty_group_normalizes_to_main() {
        let (producer, store, keys) = producer();
        producer.add("a", Map::new(), "", Mode::Realtime, 0).await.unwrap();
        assert_eq!(store.llen(&keys.jobs("main")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn zero_time_unique_is_coerced_to_realtime() {
        let (producer, store, keys) = producer();
        let len = producer.add("c", Map::new(), "g", Mode::Unique, 0).await.unwrap();
        assert_eq!(len, 1);
        // No unique marker should have been created for a zero-TTL submission.
        assert!(store.keys("{Q}:main:unique:*").await.unwrap().is_empty());
        assert_eq!(store.llen(&keys.jobs("g")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unique_mode_deduplicates_within_ttl() {
        let (producer, _store, _keys) = producer();
        let mut first_fields = Map::new();
        first_fields.insert("unique_id".to_string(), serde_json::json!("x"));
        let first = producer
            .add("c", first_fields.clone(), "g", Mode::Unique, 10)
            .await
            .unwrap();
        assert!(first >= 1);

        let second = producer.add("c", first_fields.clone(), "g", Mode::Unique, 10).await.unwrap();
        assert_eq!(second, DEDUP_REJECTED);

        let third = producer.add("c", first_fields, "g", Mode::Unique, 10).await.unwrap();
        assert_eq!(third, DEDUP_REJECTED);
    }

    #[tokio::test]
    async fn delay_mode_creates_bucket_and_lock() {
        let (producer, store, keys) = producer();
        let len = producer.add("b", Map::new(), "main", Mode::Delay, 2).await.unwrap();
        assert_eq!(len, 1);
        let members = store.zrangebyscore(&keys.delay_time(), 0.0, f64::MAX).await.unwrap();
        assert_eq!(members.len(), 1);
        let lock = store.hgetall(&keys.delay_lock()).await.unwrap();
        assert_eq!(lock.len(), 1);
    }
}
