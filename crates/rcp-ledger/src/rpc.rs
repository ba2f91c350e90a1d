use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Failure of a single JSON-RPC exchange.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RpcError {
    /// The request never produced a JSON-RPC response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The node returned a JSON-RPC error object.
    #[error("node error {code}: {message}")]
    Node {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    /// The response was not valid JSON-RPC.
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Transport interface to a ledger node.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Send one JSON-RPC request and return its `result` member.
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError>;
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// JSON-RPC 2.0 over HTTP POST.
pub struct HttpTransport {
    url: String,
    http_client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpTransport {
    /// Fails when the HTTP client cannot be built, e.g. no TLS backend.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(format!("building http client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http_client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        debug!(method, id, "json-rpc request");

        let response = self
            .http_client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        // Some nodes pair a JSON-RPC error body with a non-2xx status; prefer
        // the body when it parses.
        match serde_json::from_str::<RpcResponse>(&body) {
            Ok(parsed) => into_result(parsed),
            Err(_) if !status.is_success() => {
                Err(RpcError::Transport(format!("HTTP {status} from {}", self.url)))
            }
            Err(e) => Err(RpcError::Decode(e.to_string())),
        }
    }
}

fn into_result(response: RpcResponse) -> Result<Value, RpcError> {
    if let Some(error) = response.error {
        return Err(RpcError::Node {
            code: error.code,
            message: error.message,
            data: error.data,
        });
    }
    Ok(response.result.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_envelope_shape() {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 7,
            method: "net_version",
            params: serde_json::json!([]),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 7);
        assert_eq!(json["method"], "net_version");
        assert!(json["params"].as_array().unwrap().is_empty());
    }

    #[test]
    fn result_is_extracted() {
        let response: RpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":"0x539"}"#).unwrap();
        assert_eq!(into_result(response).unwrap(), "0x539");
    }

    #[test]
    fn null_result_is_kept() {
        let response: RpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap();
        assert_eq!(into_result(response).unwrap(), Value::Null);
    }

    #[test]
    fn error_object_becomes_node_error() {
        let response: RpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":3,"message":"execution reverted","data":"0x08c379a0"}}"#,
        )
        .unwrap();
        match into_result(response).unwrap_err() {
            RpcError::Node { code, message, data } => {
                assert_eq!(code, 3);
                assert_eq!(message, "execution reverted");
                assert_eq!(data, Some(Value::String("0x08c379a0".into())));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_node_is_transport_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let transport = HttpTransport::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = transport
            .call("net_version", serde_json::json!([]))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }
}
