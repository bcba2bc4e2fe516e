//! 内存中的脚本化传输层
//!
//! 按 (方法, 路径) 预置响应并记录所有请求。同一路由的响应按顺序消费，
//! 最后一个响应会被重复返回；未预置的路由返回 404。

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};

use crate::error::{OvmError, Result};
use crate::transport::Transport;

/// 一次被记录的请求
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
enum MockResponse {
    Json(Value),
    Status(u16, String),
}

#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<MockResponse>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为路由追加一个 JSON 响应
    pub fn on(&self, method: Method, path: &str, response: Value) {
        self.push(method, path, MockResponse::Json(response));
    }

    /// 为路由追加一个错误状态响应
    pub fn on_error(&self, method: Method, path: &str, status: u16, body: &str) {
        self.push(method, path, MockResponse::Status(status, body.to_string()));
    }

    fn push(&self, method: Method, path: &str, response: MockResponse) {
        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        routes
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
    }

    /// 全部请求记录
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 某路由被请求的次数
    pub fn count(&self, method: &Method, path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| &c.method == method && c.path == path)
            .count()
    }

    /// 某路由最后一次请求
    pub fn last_call(&self, method: &Method, path: &str) -> Option<RecordedCall> {
        self.calls()
            .into_iter()
            .rev()
            .find(|c| &c.method == method && c.path == path)
    }

    /// 除作业轮询外的请求序列，格式为 `METHOD path`
    pub fn request_log(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter(|c| !c.path.starts_with("Job/"))
            .map(|c| format!("{} {}", c.method, c.path))
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                method: method.clone(),
                path: path.to_string(),
                body,
            });

        let response = {
            let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
            let queue = routes.get_mut(&(method.clone(), path.to_string()));
            match queue {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match response {
            Some(MockResponse::Json(value)) => Ok(value),
            Some(MockResponse::Status(status, body)) => Err(OvmError::ApiError(status, body)),
            None => Err(OvmError::ApiError(
                404,
                format!("no mock response for {} {}", method, path),
            )),
        }
    }
}

/// 构造作业 JSON
pub fn job_json(id: &str, state: &str, summary_done: bool) -> Value {
    json!({
        "id": { "value": id, "type": "com.oracle.ovm.mgr.ws.model.Job" },
        "jobRunState": state,
        "summaryDone": summary_done,
        "resultId": null,
        "error": null
    })
}
