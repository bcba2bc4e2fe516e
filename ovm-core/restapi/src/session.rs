//! HTTP 会话：基本认证 + JSON 内容协商

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{OvmError, Result};
use crate::transport::Transport;

/// REST 接口在管理器上的基础路径
pub const REST_BASE_PATH: &str = "/ovm/core/wsapi/rest";

/// 默认管理器地址
pub const DEFAULT_OVM_HOST: &str = "https://127.0.0.1:7002";

/// 管理器登录凭据
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// HTTP 会话配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// 连接超时（秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// 请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// 是否验证 SSL 证书
    #[serde(default)]
    pub verify_ssl: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            verify_ssl: false,
        }
    }
}

impl SessionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    60
}

/// 已认证的 HTTP 会话
///
/// 构造时不发起任何网络请求，凭据随每个请求以 HTTP Basic 方式发送。
pub struct Session {
    /// REST 基础 URL
    base_url: String,

    /// HTTP 客户端
    http_client: Client,

    credentials: Credentials,
}

impl Session {
    /// 创建新的会话
    ///
    /// # Arguments
    /// * `ovm_host` - 管理器地址，如 `https://ovm-manager:7002`
    pub fn new(ovm_host: &str, credentials: Credentials, config: &SessionConfig) -> Result<Self> {
        url::Url::parse(ovm_host)
            .map_err(|e| OvmError::ConfigError(format!("无效的管理器地址 {}: {}", ovm_host, e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if !config.verify_ssl {
            warn!("已禁用 SSL 证书验证: {}", ovm_host);
        }

        let http_client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| OvmError::HttpError(e.to_string()))?;

        Ok(Self {
            base_url: format!("{}{}", ovm_host.trim_end_matches('/'), REST_BASE_PATH),
            http_client,
            credentials,
        })
    }

    /// 获取 REST 基础 URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 当前登录用户
    pub fn username(&self) -> &str {
        &self.credentials.username
    }
}

#[async_trait]
impl Transport for Session {
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("OVM API 请求: {} {}", method, url);

        let mut request = self
            .http_client
            .request(method, &url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password));

        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| OvmError::HttpError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取错误响应".to_string());
            warn!("API 请求失败: {} - {}", status, error_text);
            return Err(OvmError::ApiError(status.as_u16(), error_text));
        }

        let text = response
            .text()
            .await
            .map_err(|e| OvmError::HttpError(e.to_string()))?;

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| OvmError::ParseError(e.to_string()))
    }
}
