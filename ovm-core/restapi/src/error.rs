//! OVM 客户端错误定义

use thiserror::Error;

/// OVM 客户端错误类型
#[derive(Error, Debug)]
pub enum OvmError {
    #[error("HTTP 错误: {0}")]
    HttpError(String),

    #[error("API 错误 [{0}]: {1}")]
    ApiError(u16, String),

    #[error("解析错误: {0}")]
    ParseError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("作业 {job_id} 轮询超时: {reason}")]
    Timeout { job_id: String, reason: String },

    #[error("作业 {0} 轮询已取消")]
    Cancelled(String),
}

impl From<serde_json::Error> for OvmError {
    fn from(e: serde_json::Error) -> Self {
        OvmError::ParseError(e.to_string())
    }
}

/// OVM 客户端结果类型
pub type Result<T> = std::result::Result<T, OvmError>;
