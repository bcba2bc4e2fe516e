//! Oracle VM Manager REST 客户端
//!
//! 通过管理器的 `/ovm/core/wsapi/rest` 接口管理虚拟机。
//!
//! # 功能
//!
//! - **会话** (`Session`): HTTP Basic 认证、JSON 内容协商
//! - **通用资源访问** (`OvmClient`): 创建、查询、删除、子资源创建/更新、按名称解析 ID
//! - **作业轮询** (`JobPoller`): 按 `PollPolicy` 等待异步作业结束
//! - **虚拟机管理** (`VmApi`): 创建、删除、电源操作、网卡和磁盘映射
//!
//! # 示例
//!
//! ```ignore
//! use std::sync::Arc;
//! use ovm_restapi::{Credentials, OvmClient, Session, SessionConfig};
//!
//! let session = Session::new(
//!     "https://ovm-manager:7002",
//!     Credentials::new("admin", "password"),
//!     &SessionConfig::default(),
//! )?;
//! let client = OvmClient::new(Arc::new(session));
//!
//! let result = client.vm().start("host01").await?;
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod job;
pub mod lookup;
pub mod models;
pub mod session;
pub mod transport;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use client::OvmClient;
pub use error::{OvmError, Result};
pub use job::{job_outcome, JobPoller, PollPolicy};
pub use session::{Credentials, Session, SessionConfig, DEFAULT_OVM_HOST, REST_BASE_PATH};
pub use transport::Transport;

pub use api::VmApi;

// 导出数据模型
pub use models::{
    DiskMappingRequest, DomainType, Job, JobRunState, OperationResult, PowerAction, SimpleId,
    VirtualNicRequest, VmSpec,
};
