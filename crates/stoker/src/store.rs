//! Thin contract over the Redis primitives the scheduler needs.
//!
//! Each operation maps 1:1 to a Redis command. Implementations may batch via
//! pipelining internally but must preserve the ordering contracts described
//! on `Producer`, `DelayMaterializer`, and `Master`.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::error::StokerResult;

#[async_trait]
pub trait Store: Send + Sync {
    async fn set_nx(&self, key: &str, val: &str, ttl: Option<u64>) -> StokerResult<bool>;
    async fn set_ex(&self, key: &str, val: &str, ttl: u64) -> StokerResult<()>;
    async fn get(&self, key: &str) -> StokerResult<Option<String>>;
    async fn expire(&self, key: &str, ttl: u64) -> StokerResult<bool>;
    async fn exists(&self, key: &str) -> StokerResult<bool>;
    async fn del(&self, keys: &[String]) -> StokerResult<i64>;

    async fn hset(&self, key: &str, field: &str, val: &str) -> StokerResult<()>;
    async fn hdel(&self, key: &str, fields: &[String]) -> StokerResult<i64>;
    async fn hgetall(&self, key: &str) -> StokerResult<HashMap<String, String>>;
    async fn hsetnx(&self, key: &str, field: &str, val: &str) -> StokerResult<bool>;

    async fn sadd(&self, key: &str, member: &str) -> StokerResult<i64>;
    async fn srem(&self, key: &str, member: &str) -> StokerResult<i64>;
    async fn srandmember(&self, key: &str) -> StokerResult<Option<String>>;
    async fn smembers(&self, key: &str) -> StokerResult<Vec<String>>;

    async fn lpush(&self, key: &str, val: &str) -> StokerResult<i64>;
    async fn rpop(&self, key: &str) -> StokerResult<Option<String>>;
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> StokerResult<Vec<String>>;
    async fn llen(&self, key: &str) -> StokerResult<i64>;
    async fn lrem(&self, key: &str, count: i64, val: &str) -> StokerResult<i64>;
    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> StokerResult<()>;
    async fn brpop(&self, key: &str, timeout_secs: u64) -> StokerResult<Option<(String, String)>>;

    async fn zadd(&self, key: &str, member: &str, score: f64) -> StokerResult<i64>;
    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> StokerResult<Vec<String>>;
    async fn zrem(&self, key: &str, member: &str) -> StokerResult<i64>;

    /// The watch-hash keys found for `pattern` (Admin's cross-host `KEYS watch:*`).
    async fn keys(&self, pattern: &str) -> StokerResult<Vec<String>>;

    async fn ping(&self) -> StokerResult<()>;
}

/// Production `Store` backed by a pooled Redis connection.
pub struct RedisStore {
    pool: deadpool_redis::Pool,
}

impl RedisStore {
    pub fn new(pool: deadpool_redis::Pool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> StokerResult<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn set_nx(&self, key: &str, val: &str, ttl: Option<u64>) -> StokerResult<bool> {
        let mut conn = self.conn().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(val).arg("NX");
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl);
        }
        let reply: Option<String> = cmd.query_async(&mut conn).await?;
        debug!(key, acquired = reply.is_some(), "set_nx");
        Ok(reply.is_some())
    }

    async fn set_ex(&self, key: &str, val: &str, ttl: u64) -> StokerResult<()> {
        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(key, val, ttl).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StokerResult<Option<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.get(key).await?)
    }

    async fn expire(&self, key: &str, ttl: u64) -> StokerResult<bool> {
        let mut conn = self.conn().await?;
        let ok: bool = conn.expire(key, ttl as i64).await?;
        if !ok {
            warn!(key, "expire refresh failed, key is gone");
        }
        Ok(ok)
    }

    async fn exists(&self, key: &str) -> StokerResult<bool> {
        let mut conn = self.conn().await?;
        Ok(conn.exists(key).await?)
    }

    async fn del(&self, keys: &[String]) -> StokerResult<i64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        Ok(conn.del(keys).await?)
    }

    async fn hset(&self, key: &str, field: &str, val: &str) -> StokerResult<()> {
        let mut conn = self.conn().await?;
        conn.hset::<_, _, _, ()>(key, field, val).await?;
        Ok(())
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> StokerResult<i64> {
        if fields.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        Ok(conn.hdel(key, fields).await?)
    }

    async fn hgetall(&self, key: &str) -> StokerResult<HashMap<String, String>> {
        let mut conn = self.conn().await?;
        Ok(conn.hgetall(key).await?)
    }

    async fn hsetnx(&self, key: &str, field: &str, val: &str) -> StokerResult<bool> {
        let mut conn = self.conn().await?;
        Ok(conn.hset_nx(key, field, val).await?)
    }

    async fn sadd(&self, key: &str, member: &str) -> StokerResult<i64> {
        let mut conn = self.conn().await?;
        Ok(conn.sadd(key, member).await?)
    }

    async fn srem(&self, key: &str, member: &str) -> StokerResult<i64> {
        let mut conn = self.conn().await?;
        Ok(conn.srem(key, member).await?)
    }

    async fn srandmember(&self, key: &str) -> StokerResult<Option<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.srandmember(key).await?)
    }

    async fn smembers(&self, key: &str) -> StokerResult<Vec<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.smembers(key).await?)
    }

    async fn lpush(&self, key: &str, val: &str) -> StokerResult<i64> {
        let mut conn = self.conn().await?;
        Ok(conn.lpush(key, val).await?)
    }

    async fn rpop(&self, key: &str) -> StokerResult<Option<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.rpop(key, None).await?)
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> StokerResult<Vec<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.lrange(key, start as isize, stop as isize).await?)
    }

    async fn llen(&self, key: &str) -> StokerResult<i64> {
        let mut conn = self.conn().await?;
        Ok(conn.llen(key).await?)
    }

    async fn lrem(&self, key: &str, count: i64, val: &str) -> StokerResult<i64> {
        let mut conn = self.conn().await?;
        Ok(conn.lrem(key, count as isize, val).await?)
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> StokerResult<()> {
        let mut conn = self.conn().await?;
        conn.ltrim::<_, ()>(key, start as isize, stop as isize).await?;
        Ok(())
    }

    async fn brpop(&self, key: &str, timeout_secs: u64) -> StokerResult<Option<(String, String)>> {
        let mut conn = self.conn().await?;
        let reply: Option<(String, String)> = conn.brpop(key, timeout_secs as f64).await?;
        Ok(reply)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> StokerResult<i64> {
        let mut conn = self.conn().await?;
        Ok(conn.zadd(key, member, score).await?)
    }

    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> StokerResult<Vec<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.zrangebyscore(key, min, max).await?)
    }

    async fn zrem(&self, key: &str, member: &str) -> StokerResult<i64> {
        let mut conn = self.conn().await?;
        Ok(conn.zrem(key, member).await?)
    }

    async fn keys(&self, pattern: &str) -> StokerResult<Vec<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.keys(pattern).await?)
    }

    async fn ping(&self) -> StokerResult<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Builds a deadpool-redis pool for a `RedisConfig`, pinging once to fail
/// fast on a bad URL.
pub async fn create_pool(config: &crate::config::RedisConfig) -> StokerResult<deadpool_redis::Pool> {
    let cfg = deadpool_redis::Config::from_url(&config.url);
    let pool = cfg
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .map_err(|e| crate::error::StokerError::Internal(e.to_string()))?;
    let store = RedisStore::new(pool.clone());
    store.ping().await?;
    Ok(pool)
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::collections::{BTreeMap, HashSet, VecDeque};
    use std::time::{Duration, Instant};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Inner {
        strings: HashMap<String, (String, Option<Instant>)>,
        hashes: HashMap<String, HashMap<String, String>>,
        sets: HashMap<String, HashSet<String>>,
        lists: HashMap<String, VecDeque<String>>,
        zsets: HashMap<String, BTreeMap<String, f64>>,
    }

    impl Inner {
        fn is_live(&self, key: &str) -> bool {
            match self.strings.get(key) {
                None => false,
                Some((_, None)) => true,
                Some((_, Some(deadline))) => Instant::now() < *deadline,
            }
        }
    }

    /// In-memory `Store` double for unit tests. Not a Redis reimplementation —
    /// just enough fidelity to exercise Producer/DelayMaterializer/Master
    /// logic without a live Redis instance.
    #[derive(Default)]
    pub struct FakeStore {
        inner: Mutex<Inner>,
    }

    impl FakeStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl Store for FakeStore {
        async fn set_nx(&self, key: &str, val: &str, ttl: Option<u64>) -> StokerResult<bool> {
            let mut inner = self.inner.lock().await;
            if inner.is_live(key) {
                return Ok(false);
            }
            let deadline = ttl.map(|t| Instant::now() + Duration::from_secs(t));
            inner.strings.insert(key.to_string(), (val.to_string(), deadline));
            Ok(true)
        }

        async fn set_ex(&self, key: &str, val: &str, ttl: u64) -> StokerResult<()> {
            let mut inner = self.inner.lock().await;
            inner.strings.insert(
                key.to_string(),
                (val.to_string(), Some(Instant::now() + Duration::from_secs(ttl))),
            );
            Ok(())
        }

        async fn get(&self, key: &str) -> StokerResult<Option<String>> {
            let inner = self.inner.lock().await;
            if !inner.is_live(key) {
                return Ok(None);
            }
            Ok(inner.strings.get(key).map(|(v, _)| v.clone()))
        }

        async fn expire(&self, key: &str, ttl: u64) -> StokerResult<bool> {
            let mut inner = self.inner.lock().await;
            if !inner.is_live(key) {
                return Ok(false);
            }
            let val = inner.strings.get(key).unwrap().0.clone();
            inner
                .strings
                .insert(key.to_string(), (val, Some(Instant::now() + Duration::from_secs(ttl))));
            Ok(true)
        }

        async fn exists(&self, key: &str) -> StokerResult<bool> {
            let inner = self.inner.lock().await;
            Ok(inner.is_live(key))
        }

        async fn del(&self, keys: &[String]) -> StokerResult<i64> {
            let mut inner = self.inner.lock().await;
            let mut n = 0;
            for key in keys {
                if inner.strings.remove(key).is_some() {
                    n += 1;
                }
                inner.hashes.remove(key);
                inner.sets.remove(key);
                inner.lists.remove(key);
                inner.zsets.remove(key);
            }
            Ok(n)
        }

        async fn hset(&self, key: &str, field: &str, val: &str) -> StokerResult<()> {
            let mut inner = self.inner.lock().await;
            inner
                .hashes
                .entry(key.to_string())
                .or_default()
                .insert(field.to_string(), val.to_string());
            Ok(())
        }

        async fn hdel(&self, key: &str, fields: &[String]) -> StokerResult<i64> {
            let mut inner = self.inner.lock().await;
            let mut n = 0;
            if let Some(h) = inner.hashes.get_mut(key) {
                for f in fields {
                    if h.remove(f).is_some() {
                        n += 1;
                    }
                }
            }
            Ok(n)
        }

        async fn hgetall(&self, key: &str) -> StokerResult<HashMap<String, String>> {
            let inner = self.inner.lock().await;
            Ok(inner.hashes.get(key).cloned().unwrap_or_default())
        }

        async fn hsetnx(&self, key: &str, field: &str, val: &str) -> StokerResult<bool> {
            let mut inner = self.inner.lock().await;
            let h = inner.hashes.entry(key.to_string()).or_default();
            if h.contains_key(field) {
                Ok(false)
            } else {
                h.insert(field.to_string(), val.to_string());
                Ok(true)
            }
        }

        async fn sadd(&self, key: &str, member: &str) -> StokerResult<i64> {
            let mut inner = self.inner.lock().await;
            let s = inner.sets.entry(key.to_string()).or_default();
            Ok(if s.insert(member.to_string()) { 1 } else { 0 })
        }

        async fn srem(&self, key: &str, member: &str) -> StokerResult<i64> {
            let mut inner = self.inner.lock().await;
            if let Some(s) = inner.sets.get_mut(key) {
                Ok(if s.remove(member) { 1 } else { 0 })
            } else {
                Ok(0)
            }
        }

        async fn srandmember(&self, key: &str) -> StokerResult<Option<String>> {
            let inner = self.inner.lock().await;
            Ok(inner.sets.get(key).and_then(|s| s.iter().next().cloned()))
        }

        async fn smembers(&self, key: &str) -> StokerResult<Vec<String>> {
            let inner = self.inner.lock().await;
            Ok(inner.sets.get(key).map(|s| s.iter().cloned().collect()).unwrap_or_default())
        }

        async fn lpush(&self, key: &str, val: &str) -> StokerResult<i64> {
            let mut inner = self.inner.lock().await;
            let l = inner.lists.entry(key.to_string()).or_default();
            l.push_front(val.to_string());
            Ok(l.len() as i64)
        }

        async fn rpop(&self, key: &str) -> StokerResult<Option<String>> {
            let mut inner = self.inner.lock().await;
            Ok(inner.lists.get_mut(key).and_then(|l| l.pop_back()))
        }

        async fn lrange(&self, key: &str, start: isize, stop: isize) -> StokerResult<Vec<String>> {
            let inner = self.inner.lock().await;
            let Some(l) = inner.lists.get(key) else {
                return Ok(vec![]);
            };
            let len = l.len() as isize;
            let norm = |i: isize| -> isize {
                if i < 0 {
                    (len + i).max(0)
                } else {
                    i.min(len)
                }
            };
            let (s, e) = (norm(start), norm(stop));
            if s > e || s >= len {
                return Ok(vec![]);
            }
            Ok(l.iter().skip(s as usize).take((e - s + 1) as usize).cloned().collect())
        }

        async fn llen(&self, key: &str) -> StokerResult<i64> {
            let inner = self.inner.lock().await;
            Ok(inner.lists.get(key).map(|l| l.len() as i64).unwrap_or(0))
        }

        async fn lrem(&self, key: &str, _count: i64, val: &str) -> StokerResult<i64> {
            let mut inner = self.inner.lock().await;
            let Some(l) = inner.lists.get_mut(key) else {
                return Ok(0);
            };
            let before = l.len();
            let mut removed_one = false;
            l.retain(|v| {
                if !removed_one && v == val {
                    removed_one = true;
                    false
                } else {
                    true
                }
            });
            Ok((before - l.len()) as i64)
        }

        async fn ltrim(&self, key: &str, start: isize, stop: isize) -> StokerResult<()> {
            let mut inner = self.inner.lock().await;
            if let Some(l) = inner.lists.get_mut(key) {
                let len = l.len() as isize;
                let s = if start < 0 { (len + start).max(0) } else { start.min(len) };
                let e = if stop < 0 { (len + stop).max(-1) } else { stop.min(len - 1) };
                *l = l
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i as isize >= s && *i as isize <= e)
                    .map(|(_, v)| v.clone())
                    .collect();
            }
            Ok(())
        }

        async fn brpop(&self, key: &str, _timeout_secs: u64) -> StokerResult<Option<(String, String)>> {
            let mut inner = self.inner.lock().await;
            Ok(inner
                .lists
                .get_mut(key)
                .and_then(|l| l.pop_back())
                .map(|v| (key.to_string(), v)))
        }

        async fn zadd(&self, key: &str, member: &str, score: f64) -> StokerResult<i64> {
            let mut inner = self.inner.lock().await;
            let z = inner.zsets.entry(key.to_string()).or_default();
            Ok(if z.insert(member.to_string(), score).is_none() { 1 } else { 0 })
        }

        async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> StokerResult<Vec<String>> {
            let inner = self.inner.lock().await;
            let Some(z) = inner.zsets.get(key) else {
                return Ok(vec![]);
            };
            let mut members: Vec<(String, f64)> =
                z.iter().filter(|(_, &s)| s >= min && s <= max).map(|(m, s)| (m.clone(), *s)).collect();
            members.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
            Ok(members.into_iter().map(|(m, _)| m).collect())
        }

        async fn zrem(&self, key: &str, member: &str) -> StokerResult<i64> {
            let mut inner = self.inner.lock().await;
            if let Some(z) = inner.zsets.get_mut(key) {
                Ok(if z.remove(member).is_some() { 1 } else { 0 })
            } else {
                Ok(0)
            }
        }

        async fn keys(&self, pattern: &str) -> StokerResult<Vec<String>> {
            let prefix = pattern.trim_end_matches('*');
            let inner = self.inner.lock().await;
            let matches = |k: &&String| k.starts_with(prefix);
            let mut found: Vec<String> = inner.hashes.keys().filter(matches).cloned().collect();
            found.extend(inner.strings.keys().filter(matches).cloned());
            found.sort();
            found.dedup();
            Ok(found)
        }

        async fn ping(&self) -> StokerResult<()> {
            Ok(())
        }
    }
}
