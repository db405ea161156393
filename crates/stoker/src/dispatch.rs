//! The Dispatcher interface (external). The scheduler is agnostic to how
//! commands are resolved — routing, argument binding, and visibility checks
//! all live on the other side of this trait.

use async_trait::async_trait;
use serde_json::Value;

use crate::job::JobPayload;

/// Resolves `payload.cmd` to a handler, invokes it, and returns its result.
///
/// `Err` and the result-classification rules in `DispatchOutcome::classify`
/// are both captured by the caller into the failure log; neither aborts the
/// worker loop.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, payload: &JobPayload) -> Result<Value, String>;
}

/// How a dispatch result maps onto the success/failure logs (§4.5).
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Success,
    Failure(Value),
}

impl DispatchOutcome {
    /// `null` or literal `true` is success; anything else, or an `Err`, is
    /// failure with the value (or error message) recorded as `return`.
    pub fn classify(result: Result<Value, String>) -> Self {
        match result {
            Ok(Value::Null) | Ok(Value::Bool(true)) => DispatchOutcome::Success,
            Ok(other) => DispatchOutcome::Failure(other),
            Err(message) => DispatchOutcome::Failure(Value::String(message)),
        }
    }
}
