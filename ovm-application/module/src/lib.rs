//! ovm_vm 模块
//!
//! 以 Ansible 二进制模块的方式管理 Oracle VM 虚拟机：读取参数文件，
//! 校验参数，按目标状态协调虚拟机，并在 stdout 输出结果。

pub mod config;
pub mod output;
pub mod params;
pub mod reconcile;

pub use config::ModuleConfig;
pub use params::{ModuleParams, ParamError, ResourceLimits, State};
pub use reconcile::{reconcile, run};
