//! Default `Dispatcher`. The command router and reflection layer are out of
//! scope for this crate (§1); this is a placeholder that logs and succeeds so
//! the binary is runnable standalone. Embedding applications supply their own
//! `Dispatcher` and construct `Master`/`WorkerUnit` with it directly instead
//! of going through this CLI's wiring.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use stoker::{Dispatcher, JobPayload};

pub struct LoggingDispatcher;

#[async_trait]
impl Dispatcher for LoggingDispatcher {
    async fn dispatch(&self, payload: &JobPayload) -> Result<Value, String> {
        info!(cmd = payload.cmd().unwrap_or("<missing>"), "dispatching job (logging dispatcher)");
        Ok(Value::Null)
    }
}
