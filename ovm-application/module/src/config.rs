//! 模块配置管理
//!
//! **数据存储方式**: TOML 文件 (~/.config/ovm/config.toml)，可选
//!
//! 文件只提供会话和作业轮询的默认值，模块参数中的同名设置优先。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ovm_restapi::{PollPolicy, SessionConfig};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::params::ModuleParams;

/// 作业轮询的最小间隔（毫秒）
pub const MIN_POLL_INTERVAL_MS: u64 = 100;

/// 模块配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// HTTP 会话
    #[serde(default)]
    pub session: SessionConfig,

    /// 作业轮询
    #[serde(default)]
    pub poll: PollPolicy,
}

impl ModuleConfig {
    /// 获取默认配置文件路径
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("无法获取用户主目录")?;
        Ok(home.join(".config").join("ovm").join("config.toml"))
    }

    /// 加载配置
    ///
    /// 显式指定的文件必须存在；默认路径不存在时使用内置默认值。
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::config_path() {
                Ok(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("读取配置文件失败: {:?}", path))?;

        toml::from_str(&content).with_context(|| format!("解析配置文件失败: {:?}", path))
    }

    /// 用模块参数覆盖配置
    ///
    /// 轮询间隔不低于 `MIN_POLL_INTERVAL_MS`，无论来自文件还是参数。
    pub fn apply_params(&mut self, params: &ModuleParams) {
        if let Some(validate_certs) = params.validate_certs {
            self.session.verify_ssl = validate_certs;
        }
        if let Some(interval) = params.poll_interval {
            self.poll.interval_ms = interval.saturating_mul(1000);
        }
        if let Some(timeout) = params.poll_timeout {
            self.poll.timeout = Some(timeout);
        }
        if let Some(max_attempts) = params.poll_max_attempts {
            self.poll.max_attempts = Some(max_attempts);
        }
        if self.poll.interval_ms < MIN_POLL_INTERVAL_MS {
            warn!(
                "轮询间隔 {}ms 过小，使用 {}ms",
                self.poll.interval_ms, MIN_POLL_INTERVAL_MS
            );
            self.poll.interval_ms = MIN_POLL_INTERVAL_MS;
        }
    }
}
