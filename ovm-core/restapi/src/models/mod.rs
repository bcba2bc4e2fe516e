//! Oracle VM Manager 数据模型
//!
//! 管理器中的对象以 `SimpleId` 互相引用；所有变更类请求返回 `Job`，
//! 由作业轮询器跟踪到终态后再转换为 `OperationResult`。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 对象引用 (`{type}/id` 列表中的元素)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleId {
    /// 对象 ID
    pub value: String,

    /// 对象类型 (如 `com.oracle.ovm.mgr.ws.model.Vm`)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// 对象名称
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// 对象 URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl SimpleId {
    /// 仅包含 ID 值的引用
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: None,
            name: None,
            uri: None,
        }
    }

    /// 带名称的引用
    pub fn named(value: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(value)
        }
    }
}

impl fmt::Display for SimpleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// 作业运行状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobRunState {
    Running,
    Success,
    Failure,
    /// 管理器返回的其他状态，原样保留
    Other(String),
}

impl From<String> for JobRunState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "RUNNING" => JobRunState::Running,
            "SUCCESS" => JobRunState::Success,
            "FAILURE" => JobRunState::Failure,
            _ => JobRunState::Other(s),
        }
    }
}

impl From<JobRunState> for String {
    fn from(state: JobRunState) -> Self {
        state.to_string()
    }
}

impl fmt::Display for JobRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobRunState::Running => f.write_str("RUNNING"),
            JobRunState::Success => f.write_str("SUCCESS"),
            JobRunState::Failure => f.write_str("FAILURE"),
            JobRunState::Other(s) => f.write_str(s),
        }
    }
}

/// 管理器端的异步作业
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// 作业 ID
    pub id: SimpleId,

    /// 运行状态
    #[serde(default = "default_run_state")]
    pub job_run_state: JobRunState,

    /// 汇总是否完成
    #[serde(default)]
    pub summary_done: bool,

    /// 作业产生的对象
    #[serde(default)]
    pub result_id: Option<SimpleId>,

    /// 失败原因
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

fn default_run_state() -> JobRunState {
    JobRunState::Running
}

impl Job {
    /// 可读的失败原因
    pub fn error_text(&self) -> String {
        match &self.error {
            None | Some(serde_json::Value::Null) => "unknown error".to_string(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(value) => value["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string()),
        }
    }
}

/// 单次操作的结果记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub changed: bool,
    pub failed: bool,

    /// 模块未执行（如 Ansible 检查模式）
    #[serde(default, skip_serializing_if = "is_false")]
    pub skipped: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,

    #[serde(rename = "resultId", default, skip_serializing_if = "Option::is_none")]
    pub result_id: Option<SimpleId>,
}

impl OperationResult {
    /// 无变更的成功结果
    pub fn unchanged() -> Self {
        Self {
            changed: false,
            failed: false,
            skipped: false,
            msg: None,
            result_id: None,
        }
    }

    /// 作业成功
    pub fn succeeded(result_id: Option<SimpleId>) -> Self {
        Self {
            changed: true,
            failed: false,
            skipped: false,
            msg: None,
            result_id,
        }
    }

    /// 失败结果
    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            changed: false,
            failed: true,
            skipped: false,
            msg: Some(msg.into()),
            result_id: None,
        }
    }

    /// 未执行任何操作
    pub fn skipped(msg: impl Into<String>) -> Self {
        Self {
            changed: false,
            failed: false,
            skipped: true,
            msg: Some(msg.into()),
            result_id: None,
        }
    }

    /// 按名称查找对象失败
    ///
    /// `kind` 为消息中的资源称谓，如 `vm`、`network`、`virtual_disk`
    pub fn not_found(kind: &str, name: &str) -> Self {
        Self::failure(format!("Could not find a {} named {}.", kind, name))
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// 虚拟化模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainType {
    XenHvm,
    XenHvmPvDrivers,
    XenPvm,
    LdomsPvm,
    Unknown,
}

impl Default for DomainType {
    fn default() -> Self {
        DomainType::XenHvm
    }
}

/// 电源操作，对应 `Vm/{id}/{action}` 子资源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerAction {
    Start,
    Stop,
    Restart,
}

impl PowerAction {
    /// 子资源路径
    pub fn as_path(&self) -> &'static str {
        match self {
            PowerAction::Start => "start",
            PowerAction::Stop => "stop",
            PowerAction::Restart => "restart",
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path())
    }
}

/// 创建虚拟机请求，原样作为 `POST Vm` 的请求体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmSpec {
    pub repository_id: Option<SimpleId>,
    pub server_pool_id: Option<SimpleId>,
    pub vm_domain_type: DomainType,
    pub name: String,
    pub cpu_count: u32,
    pub cpu_count_limit: u32,

    /// 内存 (MB)
    pub memory: u64,

    /// 内存上限 (MB)
    pub memory_limit: u64,
    pub cpu_priority: u32,
    pub cpu_utilization_cap: u32,
    pub high_availability: bool,
    pub vm_mouse_type: String,
    pub keymap_name: String,
    pub boot_order: Option<Vec<String>>,
    pub os_type: Option<String>,
    pub network_install_path: Option<String>,
    pub vm_start_policy: Option<String>,
}

/// 虚拟网卡请求 (`Vm/{id}/VirtualNic`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNicRequest {
    pub name: String,
    pub mac_address: String,
    pub network_id: SimpleId,
}

impl VirtualNicRequest {
    /// 以 MAC 地址作为网卡名称
    pub fn new(mac_address: &str, network_id: SimpleId) -> Self {
        Self {
            name: mac_address.to_string(),
            mac_address: mac_address.to_string(),
            network_id,
        }
    }
}

/// 磁盘映射请求 (`Vm/{id}/VmDiskMapping`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskMappingRequest {
    pub disk_target: u32,
    pub virtual_disk_id: SimpleId,
}
