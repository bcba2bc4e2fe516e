//! 传输层抽象接口

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::error::Result;

/// REST 传输 trait
///
/// `path` 为相对于 `/ovm/core/wsapi/rest` 的资源路径，如 `Vm/id`。
/// 实现方负责认证、状态码检查和 JSON 解析，不做重试。
#[async_trait]
pub trait Transport: Send + Sync {
    /// 发送请求并返回解析后的 JSON（空响应体为 `Value::Null`）
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value>;
}
