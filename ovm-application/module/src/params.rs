//! 模块参数
//!
//! Ansible 以 JSON 文件形式传入参数。除 `_ansible_check_mode` 外，
//! `_ansible_*` 等内部键被忽略。数值约束在建立任何网络连接之前校验。
//!
//! 与 Ansible 的类型转换一致，整数参数也接受数字字符串（`"4096"`），
//! 布尔参数也接受 `yes`/`no`、`on`/`off`、`1`/`0` 等写法。

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use ovm_restapi::{DomainType, SimpleId, VmSpec, DEFAULT_OVM_HOST};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 内存必须对齐的粒度 (MB)
pub const MEMORY_ALIGNMENT: u64 = 1024;

const MOUSE_TYPES: &[&str] = &["USB_TABLET"];
const KEYMAP_NAMES: &[&str] = &["en-us"];

/// 参数校验错误
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParamError {
    #[error("memory must be a multitude of 1024")]
    MemoryAlignment,

    #[error("memory_limit < memory")]
    MemoryLimitBelowMemory,

    #[error("memory_limit must be a multitude of 1024")]
    MemoryLimitAlignment,

    #[error("value of {field} must be one of: {choices}, got: {value}")]
    InvalidChoice {
        field: &'static str,
        value: String,
        choices: String,
    },
}

/// 目标状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Present,
    Absent,
    Start,
    Stop,
    Restart,
}

/// 不写入日志的口令
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"********\"")
    }
}

/// 虚拟网卡参数
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VirtualNicParam {
    pub network: String,
    pub mac_address: String,
}

/// 磁盘映射参数
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiskMappingParam {
    #[serde(deserialize_with = "lenient_int")]
    pub slot: u32,
    pub virtual_disk: String,
}

/// 模块参数
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleParams {
    #[serde(default)]
    pub state: State,

    pub name: String,
    pub ovm_user: String,
    pub ovm_pass: Secret,

    #[serde(default = "default_ovm_host")]
    pub ovm_host: String,

    pub server_pool: String,
    pub repository: String,

    #[serde(default)]
    pub domain_type: DomainType,

    #[serde(default = "default_memory", deserialize_with = "lenient_int")]
    pub memory: u64,

    #[serde(default, deserialize_with = "lenient_opt_int")]
    pub memory_limit: Option<u64>,

    #[serde(default = "default_cpu_count", deserialize_with = "lenient_int")]
    pub cpu_count: u32,

    #[serde(default, deserialize_with = "lenient_opt_int")]
    pub cpu_count_limit: Option<u32>,

    #[serde(default = "default_cpu_priority", deserialize_with = "lenient_int")]
    pub cpu_priority: u32,

    #[serde(default = "default_cpu_utilization_cap", deserialize_with = "lenient_int")]
    pub cpu_utilization_cap: u32,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub high_availability: bool,

    #[serde(default = "default_mouse_type")]
    pub mouse_type: String,

    #[serde(default = "default_keymap_name")]
    pub keymap_name: String,

    #[serde(default)]
    pub boot_order: Option<Vec<String>>,

    #[serde(default)]
    pub os_type: Option<String>,

    #[serde(default)]
    pub network_install_path: Option<String>,

    #[serde(default)]
    pub start_policy: Option<String>,

    /// 兼容参数，本模块不管理网络
    #[serde(default)]
    pub networks: Option<Vec<serde_json::Value>>,

    /// 兼容参数，本模块不管理磁盘
    #[serde(default)]
    pub disks: Option<Vec<serde_json::Value>>,

    #[serde(default)]
    pub virtual_nics: Option<Vec<VirtualNicParam>>,

    #[serde(default)]
    pub disk_mappings: Option<Vec<DiskMappingParam>>,

    /// 是否验证管理器证书，覆盖配置文件
    #[serde(default, deserialize_with = "lenient_opt_bool")]
    pub validate_certs: Option<bool>,

    /// 作业轮询间隔（秒），覆盖配置文件
    #[serde(default, deserialize_with = "lenient_opt_int")]
    pub poll_interval: Option<u64>,

    /// 作业等待上限（秒），覆盖配置文件
    #[serde(default, deserialize_with = "lenient_opt_int")]
    pub poll_timeout: Option<u64>,

    /// 作业最大轮询次数，覆盖配置文件
    #[serde(default, deserialize_with = "lenient_opt_int")]
    pub poll_max_attempts: Option<u32>,

    /// Ansible 检查模式；本模块不支持，检查模式下不做任何操作
    #[serde(rename = "_ansible_check_mode", default, deserialize_with = "lenient_bool")]
    pub check_mode: bool,
}

/// 数字或数字字符串
#[derive(Deserialize)]
#[serde(untagged)]
enum IntParam {
    Number(u64),
    Text(String),
}

/// 布尔、0/1 或 Ansible 布尔字符串
#[derive(Deserialize)]
#[serde(untagged)]
enum BoolParam {
    Bool(bool),
    Number(u64),
    Text(String),
}

fn parse_int<T, E>(raw: IntParam) -> std::result::Result<T, E>
where
    T: TryFrom<u64> + FromStr,
    E: de::Error,
{
    let parsed = match &raw {
        IntParam::Number(n) => T::try_from(*n).ok(),
        IntParam::Text(s) => s.trim().parse().ok(),
    };
    parsed.ok_or_else(|| {
        let shown = match raw {
            IntParam::Number(n) => n.to_string(),
            IntParam::Text(s) => s,
        };
        E::custom(format!("invalid integer value: {}", shown))
    })
}

fn parse_bool<E: de::Error>(raw: BoolParam) -> std::result::Result<bool, E> {
    match raw {
        BoolParam::Bool(b) => Ok(b),
        BoolParam::Number(1) => Ok(true),
        BoolParam::Number(0) => Ok(false),
        BoolParam::Number(n) => Err(E::custom(format!("invalid boolean value: {}", n))),
        BoolParam::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "t" | "on" | "1" => Ok(true),
            "no" | "n" | "false" | "f" | "off" | "0" => Ok(false),
            _ => Err(E::custom(format!("invalid boolean value: {}", s))),
        },
    }
}

fn lenient_int<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64> + FromStr,
{
    parse_int(IntParam::deserialize(deserializer)?)
}

fn lenient_opt_int<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64> + FromStr,
{
    Option::<IntParam>::deserialize(deserializer)?
        .map(parse_int)
        .transpose()
}

fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    parse_bool(BoolParam::deserialize(deserializer)?)
}

fn lenient_opt_bool<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<BoolParam>::deserialize(deserializer)?
        .map(parse_bool)
        .transpose()
}

fn default_ovm_host() -> String {
    DEFAULT_OVM_HOST.to_string()
}

fn default_memory() -> u64 {
    4096
}

fn default_cpu_count() -> u32 {
    2
}

fn default_cpu_priority() -> u32 {
    100
}

fn default_cpu_utilization_cap() -> u32 {
    100
}

fn default_mouse_type() -> String {
    "USB_TABLET".to_string()
}

fn default_keymap_name() -> String {
    "en-us".to_string()
}

/// 校验后的资源上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    pub memory_limit: u64,
    pub cpu_count_limit: u32,
}

impl ModuleParams {
    /// 从 Ansible 参数文件加载
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("读取参数文件失败: {:?}", path))?;
        Self::from_json(&content).with_context(|| format!("解析参数文件失败: {:?}", path))
    }

    /// 从 JSON 文本解析
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// 校验数值约束并补全上限默认值
    pub fn validate(&self) -> std::result::Result<ResourceLimits, ParamError> {
        check_choice("mouse_type", &self.mouse_type, MOUSE_TYPES)?;
        check_choice("keymap_name", &self.keymap_name, KEYMAP_NAMES)?;

        if self.memory % MEMORY_ALIGNMENT != 0 {
            return Err(ParamError::MemoryAlignment);
        }

        let memory_limit = match self.memory_limit {
            None => self.memory,
            Some(limit) => {
                if limit < self.memory {
                    return Err(ParamError::MemoryLimitBelowMemory);
                }
                if limit % MEMORY_ALIGNMENT != 0 {
                    return Err(ParamError::MemoryLimitAlignment);
                }
                limit
            }
        };

        Ok(ResourceLimits {
            memory_limit,
            cpu_count_limit: self.cpu_count_limit.unwrap_or(self.cpu_count),
        })
    }

    /// 构造创建虚拟机请求
    pub fn vm_spec(
        &self,
        limits: &ResourceLimits,
        repository_id: Option<SimpleId>,
        server_pool_id: Option<SimpleId>,
    ) -> VmSpec {
        VmSpec {
            repository_id,
            server_pool_id,
            vm_domain_type: self.domain_type,
            name: self.name.clone(),
            cpu_count: self.cpu_count,
            cpu_count_limit: limits.cpu_count_limit,
            memory: self.memory,
            memory_limit: limits.memory_limit,
            cpu_priority: self.cpu_priority,
            cpu_utilization_cap: self.cpu_utilization_cap,
            high_availability: self.high_availability,
            vm_mouse_type: self.mouse_type.clone(),
            keymap_name: self.keymap_name.clone(),
            boot_order: self.boot_order.clone(),
            os_type: self.os_type.clone(),
            network_install_path: self.network_install_path.clone(),
            vm_start_policy: self.start_policy.clone(),
        }
    }

    pub fn virtual_nics(&self) -> &[VirtualNicParam] {
        self.virtual_nics.as_deref().unwrap_or_default()
    }

    pub fn disk_mappings(&self) -> &[DiskMappingParam] {
        self.disk_mappings.as_deref().unwrap_or_default()
    }
}

fn check_choice(
    field: &'static str,
    value: &str,
    choices: &[&str],
) -> std::result::Result<(), ParamError> {
    if choices.contains(&value) {
        return Ok(());
    }
    Err(ParamError::InvalidChoice {
        field,
        value: value.to_string(),
        choices: choices.join(", "),
    })
}
