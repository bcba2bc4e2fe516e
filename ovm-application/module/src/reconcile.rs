//! 目标状态协调
//!
//! | 虚拟机存在 | 目标状态 | 动作 |
//! |---|---|---|
//! | 是 | absent | 删除 |
//! | 是 | present | 无变更（不支持重新配置） |
//! | 是 | start/stop/restart | 电源操作 |
//! | 否 | present | 创建 → 逐个添加网卡 → 逐个添加磁盘映射 → 启动 |
//! | 否 | 其他 | 无变更 |
//!
//! 创建流程不是事务：任一步骤失败即停止并返回该步骤的结果，
//! 已创建的虚拟机保持原样，不做回滚，结果标记为 `changed`。
//!
//! 模块不支持检查模式，检查模式下直接跳过。

use anyhow::Result;
use ovm_restapi::api::{REPOSITORY, SERVER_POOL};
use ovm_restapi::{OperationResult, OvmClient, PowerAction};
use tracing::{info, warn};

use crate::params::{ModuleParams, ResourceLimits, State};

/// 检查模式下的跳过消息
pub const CHECK_MODE_UNSUPPORTED: &str = "remote module (ovm_vm) does not support check mode";

/// 校验参数、建立客户端并协调
///
/// 检查模式或参数校验失败时直接返回，`connect` 不会被调用。
pub async fn run<F>(params: &ModuleParams, connect: F) -> Result<OperationResult>
where
    F: FnOnce(&ModuleParams) -> Result<OvmClient>,
{
    if params.check_mode {
        info!("检查模式，跳过虚拟机 {}", params.name);
        return Ok(OperationResult::skipped(CHECK_MODE_UNSUPPORTED));
    }

    let limits = match params.validate() {
        Ok(limits) => limits,
        Err(e) => {
            warn!("参数校验失败: {}", e);
            return Ok(OperationResult::failure(e.to_string()));
        }
    };

    let client = connect(params)?;
    reconcile(&client, params, &limits).await
}

/// 根据虚拟机是否存在与目标状态执行对应操作
pub async fn reconcile(
    client: &OvmClient,
    params: &ModuleParams,
    limits: &ResourceLimits,
) -> Result<OperationResult> {
    let name = params.name.as_str();
    let vm = client.vm();
    let existing = vm.get_id_for_name(name).await?;

    info!(
        "协调虚拟机 {}: 目标 {:?}, 当前{}",
        name,
        params.state,
        if existing.is_some() { "存在" } else { "不存在" }
    );

    let result = match (existing.is_some(), params.state) {
        (true, State::Absent) => vm.delete(name).await?,
        (true, State::Present) => OperationResult::unchanged(),
        (true, State::Start) => vm.state(name, PowerAction::Start).await?,
        (true, State::Stop) => vm.state(name, PowerAction::Stop).await?,
        (true, State::Restart) => vm.state(name, PowerAction::Restart).await?,
        (false, State::Present) => provision(client, params, limits).await?,
        (false, state) => {
            info!("虚拟机 {} 不存在，{:?} 无需操作", name, state);
            OperationResult::unchanged()
        }
    };

    Ok(result)
}

/// 创建虚拟机并完成网卡、磁盘映射和启动
async fn provision(
    client: &OvmClient,
    params: &ModuleParams,
    limits: &ResourceLimits,
) -> Result<OperationResult> {
    let name = params.name.as_str();
    let vm = client.vm();

    let repository_id = client.get_id_for_name(REPOSITORY, &params.repository).await?;
    if repository_id.is_none() {
        warn!("存储库不存在: {}", params.repository);
    }

    let server_pool_id = client.get_id_for_name(SERVER_POOL, &params.server_pool).await?;
    if server_pool_id.is_none() {
        warn!("服务器池不存在: {}", params.server_pool);
    }

    if params.networks.as_ref().is_some_and(|n| !n.is_empty())
        || params.disks.as_ref().is_some_and(|d| !d.is_empty())
    {
        warn!("networks/disks 参数不由本模块管理，已忽略");
    }

    let spec = params.vm_spec(limits, repository_id, server_pool_id);
    let result = vm.create(&spec).await?;
    if result.failed {
        return Ok(result);
    }

    for nic in params.virtual_nics() {
        let result = vm
            .create_virtualnic(name, &nic.network, &nic.mac_address)
            .await?;
        if result.failed {
            warn!("虚拟机 {} 已创建，但添加网卡失败", name);
            return Ok(created(result));
        }
    }

    for mapping in params.disk_mappings() {
        let result = vm
            .create_diskmapping(name, mapping.slot, &mapping.virtual_disk)
            .await?;
        if result.failed {
            warn!("虚拟机 {} 已创建，但添加磁盘映射失败", name);
            return Ok(created(result));
        }
    }

    let result = vm.start(name).await?;
    if result.failed {
        warn!("虚拟机 {} 已创建，但启动失败", name);
    }
    Ok(created(result))
}

/// 虚拟机已创建，后续步骤的结果一律算作有变更
fn created(mut result: OperationResult) -> OperationResult {
    result.changed = true;
    result
}
