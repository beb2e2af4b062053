use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::{RpcRequest, RpcResponse};
use crate::{Result, RpcError};

/// Minimal JSON-RPC 2.0 client over HTTP.
pub struct JsonRpcClient {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue a request and decode its `result`.
    ///
    /// A `null` result decodes into `R` as-is, so `Option<T>` targets see
    /// `None` for "not found".
    pub async fn request<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);

        debug!(method, id, url = %self.url, "JSON-RPC request");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            warn!(method, %status, "JSON-RPC endpoint unavailable");
            return Err(RpcError::Transport(format!(
                "Request failed with status: {}",
                status
            )));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| RpcError::Decode(e.to_string()))?;

        if let Some(error) = body.error {
            debug!(method, code = error.code, message = %error.message, "JSON-RPC error");
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        serde_json::from_value(body.result.unwrap_or(Value::Null))
            .map_err(|e| RpcError::Decode(format!("{}: {}", method, e)))
    }
}
