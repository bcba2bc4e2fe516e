//! OVM 资源 API 模块
//!
//! - 虚拟机管理 (VmApi)
//!
//! 以及管理器 REST 集合名称常量。

pub mod vm;

pub use vm::VmApi;

/// 虚拟机
pub const VM: &str = "Vm";

/// 网络
pub const NETWORK: &str = "Network";

/// 虚拟磁盘
pub const VIRTUAL_DISK: &str = "VirtualDisk";

/// 存储库
pub const REPOSITORY: &str = "Repository";

/// 服务器池
pub const SERVER_POOL: &str = "ServerPool";

/// 异步作业
pub const JOB: &str = "Job";

/// 虚拟网卡（虚拟机子资源）
pub const VIRTUAL_NIC: &str = "VirtualNic";

/// 磁盘映射（虚拟机子资源）
pub const VM_DISK_MAPPING: &str = "VmDiskMapping";
