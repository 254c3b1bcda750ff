use async_trait::async_trait;
use serde_json::{Map, Value};
use shared::error::ApiError;

/// The process boundary to the vault backend.
///
/// One call per command, no batching. Implementations resolve exactly once
/// with either the command's payload or the backend's error.
#[async_trait]
pub trait RemoteCommands: Send + Sync {
    async fn invoke(&self, command: &str, args: Map<String, Value>) -> Result<Value, ApiError>;
}
