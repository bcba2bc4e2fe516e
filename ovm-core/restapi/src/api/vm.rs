//! 虚拟机管理 API
//!
//! 以名称为入口的虚拟机操作，包括：
//! - 创建、删除
//! - 启动、关闭、重启
//! - 添加虚拟网卡、磁盘映射
//!
//! 每个操作都会等待对应作业结束；按名称找不到对象时返回失败结果而不是错误。

use tracing::{info, warn};

use crate::api::{NETWORK, VIRTUAL_DISK, VIRTUAL_NIC, VM, VM_DISK_MAPPING};
use crate::client::OvmClient;
use crate::error::Result;
use crate::models::{
    DiskMappingRequest, OperationResult, PowerAction, SimpleId, VirtualNicRequest, VmSpec,
};

/// 虚拟机管理 API
pub struct VmApi<'a> {
    client: &'a OvmClient,
}

impl<'a> VmApi<'a> {
    /// 创建新的虚拟机 API 实例
    pub(crate) fn new(client: &'a OvmClient) -> Self {
        Self { client }
    }

    /// 按名称查找虚拟机
    pub async fn get_id_for_name(&self, name: &str) -> Result<Option<SimpleId>> {
        self.client.get_id_for_name(VM, name).await
    }

    /// 创建虚拟机
    pub async fn create(&self, spec: &VmSpec) -> Result<OperationResult> {
        info!("创建虚拟机: {}", spec.name);
        let job = self.client.create_job(VM, spec).await?;
        self.client.invalidate(VM).await;
        self.client.jobs().wait(&job.id).await
    }

    /// 删除虚拟机
    pub async fn delete(&self, name: &str) -> Result<OperationResult> {
        let Some(vm_id) = self.get_id_for_name(name).await? else {
            return Ok(OperationResult::not_found("vm", name));
        };

        info!("删除虚拟机: {} ({})", name, vm_id);
        let job = self.client.delete_job(VM, &vm_id.value).await?;
        self.client.invalidate(VM).await;
        self.client.jobs().wait(&job.id).await
    }

    /// 添加虚拟网卡
    ///
    /// # Arguments
    /// * `name` - 虚拟机名称
    /// * `network` - 网络名称
    /// * `mac_address` - MAC 地址，同时用作网卡名称
    pub async fn create_virtualnic(
        &self,
        name: &str,
        network: &str,
        mac_address: &str,
    ) -> Result<OperationResult> {
        let Some(vm_id) = self.get_id_for_name(name).await? else {
            return Ok(OperationResult::not_found("vm", name));
        };

        let Some(network_id) = self.client.get_id_for_name(NETWORK, network).await? else {
            warn!("网络不存在: {}", network);
            return Ok(OperationResult::not_found("network", network));
        };

        info!("添加虚拟网卡: {} -> {} ({})", name, network, mac_address);
        let req = VirtualNicRequest::new(mac_address, network_id);
        let job = self
            .client
            .create_child_job(VM, &vm_id.value, VIRTUAL_NIC, &req)
            .await?;
        self.client.jobs().wait(&job.id).await
    }

    /// 添加磁盘映射
    ///
    /// # Arguments
    /// * `name` - 虚拟机名称
    /// * `slot` - 磁盘槽位
    /// * `virtual_disk` - 虚拟磁盘名称
    pub async fn create_diskmapping(
        &self,
        name: &str,
        slot: u32,
        virtual_disk: &str,
    ) -> Result<OperationResult> {
        let Some(vm_id) = self.get_id_for_name(name).await? else {
            return Ok(OperationResult::not_found("vm", name));
        };

        let Some(virtual_disk_id) = self.client.get_id_for_name(VIRTUAL_DISK, virtual_disk).await?
        else {
            warn!("虚拟磁盘不存在: {}", virtual_disk);
            return Ok(OperationResult::not_found("virtual_disk", virtual_disk));
        };

        info!("添加磁盘映射: {} 槽位 {} -> {}", name, slot, virtual_disk);
        let req = DiskMappingRequest {
            disk_target: slot,
            virtual_disk_id,
        };
        let job = self
            .client
            .create_child_job(VM, &vm_id.value, VM_DISK_MAPPING, &req)
            .await?;
        self.client.jobs().wait(&job.id).await
    }

    /// 启动虚拟机
    pub async fn start(&self, name: &str) -> Result<OperationResult> {
        self.state(name, PowerAction::Start).await
    }

    /// 关闭虚拟机
    pub async fn stop(&self, name: &str) -> Result<OperationResult> {
        self.state(name, PowerAction::Stop).await
    }

    /// 重启虚拟机
    pub async fn restart(&self, name: &str) -> Result<OperationResult> {
        self.state(name, PowerAction::Restart).await
    }

    /// 切换电源状态: PUT `Vm/{id}/{action}`
    pub async fn state(&self, name: &str, action: PowerAction) -> Result<OperationResult> {
        let Some(vm_id) = self.get_id_for_name(name).await? else {
            return Ok(OperationResult::not_found("vm", name));
        };

        info!("虚拟机电源操作: {} {}", name, action);
        let job = self
            .client
            .update_child_job(VM, &vm_id.value, action.as_path(), None)
            .await?;
        self.client.jobs().wait(&job.id).await
    }
}
