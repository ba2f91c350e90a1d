use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::rpc::{RpcError, RpcTransport};

/// A JSON-RPC call observed by [`ScriptedTransport`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub params: Value,
}

/// Scripted JSON-RPC node for tests and offline demos.
///
/// Responses are looked up by method name: one-shot responses are consumed
/// first, then the sticky response. Methods with no script answer with
/// JSON-RPC error `-32601`. Every call is recorded.
#[derive(Default)]
pub struct ScriptedTransport {
    inner: Mutex<ScriptState>,
}

#[derive(Default)]
struct ScriptState {
    sticky: HashMap<String, Result<Value, RpcError>>,
    queued: HashMap<String, VecDeque<Result<Value, RpcError>>>,
    delays: HashMap<String, Duration>,
    calls: Vec<RecordedCall>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ScriptState) -> R) -> R {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Always answer `method` with `value`.
    pub fn respond(&self, method: &str, value: Value) -> &Self {
        self.with_state(|s| s.sticky.insert(method.to_string(), Ok(value)));
        self
    }

    /// Answer the next call to `method` with `value`.
    pub fn respond_once(&self, method: &str, value: Value) -> &Self {
        self.with_state(|s| {
            s.queued
                .entry(method.to_string())
                .or_default()
                .push_back(Ok(value))
        });
        self
    }

    /// Always fail `method` with `error`.
    pub fn fail(&self, method: &str, error: RpcError) -> &Self {
        self.with_state(|s| s.sticky.insert(method.to_string(), Err(error)));
        self
    }

    /// Fail the next call to `method` with `error`.
    pub fn fail_once(&self, method: &str, error: RpcError) -> &Self {
        self.with_state(|s| {
            s.queued
                .entry(method.to_string())
                .or_default()
                .push_back(Err(error))
        });
        self
    }

    /// Hold every answer to `method` for `delay`.
    pub fn delay(&self, method: &str, delay: Duration) -> &Self {
        self.with_state(|s| s.delays.insert(method.to_string(), delay));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.with_state(|s| s.calls.clone())
    }

    /// Number of calls made to `method`.
    pub fn count(&self, method: &str) -> usize {
        self.with_state(|s| s.calls.iter().filter(|c| c.method == method).count())
    }

    pub fn total_calls(&self) -> usize {
        self.with_state(|s| s.calls.len())
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let (response, delay) = self.with_state(|s| {
            s.calls.push(RecordedCall {
                method: method.to_string(),
                params,
            });
            let queued = s.queued.get_mut(method).and_then(VecDeque::pop_front);
            let response = queued
                .or_else(|| s.sticky.get(method).cloned())
                .unwrap_or_else(|| {
                    Err(RpcError::Node {
                        code: -32601,
                        message: format!("method {method} not scripted"),
                        data: None,
                    })
                });
            (response, s.delays.get(method).copied())
        });

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        response
    }
}
