//! JSON-RPC 2.0 HTTP client
//!
//! One POST per call against a service's `/api/rpc` endpoint. Transport and
//! envelope failures surface as `AppError::Rpc`; application errors keep the
//! server's message.

use ripple_common::AppError;
use ripple_proto::rpc::{RpcRequest, RpcResponse, RPC_APP_ERROR};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Default per-call deadline
pub const RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// JSON-RPC client bound to one service endpoint
pub struct RpcClient {
    endpoint: String,
    http: reqwest::Client,
    id_counter: AtomicU64,
}

impl RpcClient {
    /// Create a client for `<base_url>/api/rpc` with the default deadline
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, RPC_TIMEOUT)
    }

    /// Create a client with an explicit per-call deadline
    #[must_use]
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            endpoint: format!("{}/api/rpc", base_url.trim_end_matches('/')),
            http,
            id_counter: AtomicU64::new(0),
        }
    }

    /// Call a remote method and decode its result
    ///
    /// # Errors
    /// `AppError::Rpc` for transport, envelope, or application failures.
    pub async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, AppError>
    where
        P: Serialize + Sync,
        R: DeserializeOwned,
    {
        let id = self.id_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let request = RpcRequest::new(method, params, id.to_string())
            .map_err(|e| AppError::Rpc(format!("encode params: {e}")))?;

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Rpc(format!("{method}: {e}")))?;

        let rpc: RpcResponse = response
            .json()
            .await
            .map_err(|e| AppError::Rpc(format!("{method}: decode response: {e}")))?;

        if let Some(error) = rpc.error {
            tracing::debug!(method = %method, code = error.code, message = %error.message, "rpc call failed");
            if error.code == RPC_APP_ERROR {
                return Err(AppError::Rpc(error.message));
            }
            return Err(AppError::Rpc(error.to_string()));
        }

        let result = rpc.result.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(result)
            .map_err(|e| AppError::Rpc(format!("{method}: decode result: {e}")))
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
