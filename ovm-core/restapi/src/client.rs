//! OVM REST 客户端核心实现
//!
//! 资源按 `{object_type}/{object_id}` 寻址，子资源为
//! `{object_type}/{object_id}/{child_type}`。客户端只做协议适配：
//! 传输错误原样返回，不重试也不解释响应内容。

use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::VmApi;
use crate::error::Result;
use crate::job::{JobPoller, PollPolicy};
use crate::lookup::LookupCache;
use crate::models::{Job, SimpleId};
use crate::transport::Transport;

/// OVM 客户端
pub struct OvmClient {
    /// 传输层
    transport: Arc<dyn Transport>,

    /// 名称查找缓存
    lookups: RwLock<LookupCache>,

    /// 作业轮询策略
    poll_policy: PollPolicy,

    /// 轮询取消令牌
    cancel: CancellationToken,
}

impl OvmClient {
    /// 创建新的客户端
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            lookups: RwLock::new(LookupCache::new()),
            poll_policy: PollPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// 设置作业轮询策略
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    /// 设置轮询取消令牌
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll_policy
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// 获取虚拟机管理 API
    pub fn vm(&self) -> VmApi<'_> {
        VmApi::new(self)
    }

    /// 获取作业轮询器
    pub fn jobs(&self) -> JobPoller<'_> {
        JobPoller::new(self)
    }

    // ============================================
    // 通用资源操作
    // ============================================

    /// 创建对象: POST `{type}`
    pub async fn create<T: Serialize + ?Sized>(&self, object_type: &str, data: &T) -> Result<Value> {
        info!("创建 {}", object_type);
        let body = serde_json::to_value(data)?;
        self.transport
            .send(Method::POST, object_type, Some(body))
            .await
    }

    /// 查询对象: GET `{type}/{id}`
    pub async fn get(&self, object_type: &str, object_id: &str) -> Result<Value> {
        debug!("查询 {}: {}", object_type, object_id);
        self.transport
            .send(Method::GET, &format!("{}/{}", object_type, object_id), None)
            .await
    }

    /// 删除对象: DELETE `{type}/{id}`
    pub async fn delete(&self, object_type: &str, object_id: &str) -> Result<Value> {
        info!("删除 {}: {}", object_type, object_id);
        self.transport
            .send(Method::DELETE, &format!("{}/{}", object_type, object_id), None)
            .await
    }

    /// 创建子对象: POST `{type}/{id}/{child_type}`
    pub async fn create_child<T: Serialize + ?Sized>(
        &self,
        object_type: &str,
        object_id: &str,
        child_type: &str,
        data: &T,
    ) -> Result<Value> {
        info!("创建 {}/{} 的 {}", object_type, object_id, child_type);
        let body = serde_json::to_value(data)?;
        self.transport
            .send(
                Method::POST,
                &format!("{}/{}/{}", object_type, object_id, child_type),
                Some(body),
            )
            .await
    }

    /// 更新子资源: PUT `{type}/{id}/{child_type}`
    ///
    /// `data` 为 `None` 时发送空对象 `{}`
    pub async fn update_child(
        &self,
        object_type: &str,
        object_id: &str,
        child_type: &str,
        data: Option<Value>,
    ) -> Result<Value> {
        info!("更新 {}/{} 的 {}", object_type, object_id, child_type);
        let body = data.unwrap_or_else(|| Value::Object(Default::default()));
        self.transport
            .send(
                Method::PUT,
                &format!("{}/{}/{}", object_type, object_id, child_type),
                Some(body),
            )
            .await
    }

    /// 按名称解析对象 ID
    ///
    /// 扫描 `{type}/id` 列表，返回第一个名称相同的元素；
    /// 列表在本客户端生命周期内按类型缓存。
    pub async fn get_id_for_name(&self, object_type: &str, name: &str) -> Result<Option<SimpleId>> {
        if let Some(hit) = self.lookups.read().await.get(object_type, name) {
            debug!("查找缓存命中: {} {}", object_type, name);
            return Ok(hit);
        }

        let listing = self.list_ids(object_type).await?;
        let mut lookups = self.lookups.write().await;
        lookups.load(object_type, listing);
        Ok(lookups.get(object_type, name).flatten())
    }

    /// 查询 `{type}/id` 轻量列表（不经过缓存）
    pub async fn list_ids(&self, object_type: &str) -> Result<Vec<SimpleId>> {
        debug!("查询 {} ID 列表", object_type);
        let value = self
            .transport
            .send(Method::GET, &format!("{}/id", object_type), None)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// 查询完整列表: GET `{type}`
    pub async fn get_ids(&self, object_type: &str) -> Result<Value> {
        debug!("查询 {} 列表", object_type);
        self.transport.send(Method::GET, object_type, None).await
    }

    /// 使某类型的查找缓存失效
    pub async fn invalidate(&self, object_type: &str) {
        self.lookups.write().await.invalidate(object_type);
    }

    // ============================================
    // 返回作业的变更操作
    // ============================================

    /// 创建对象并返回作业
    pub async fn create_job<T: Serialize + ?Sized>(&self, object_type: &str, data: &T) -> Result<Job> {
        let value = self.create(object_type, data).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// 删除对象并返回作业
    pub async fn delete_job(&self, object_type: &str, object_id: &str) -> Result<Job> {
        let value = self.delete(object_type, object_id).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// 创建子对象并返回作业
    pub async fn create_child_job<T: Serialize + ?Sized>(
        &self,
        object_type: &str,
        object_id: &str,
        child_type: &str,
        data: &T,
    ) -> Result<Job> {
        let value = self
            .create_child(object_type, object_id, child_type, data)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// 更新子资源并返回作业
    pub async fn update_child_job(
        &self,
        object_type: &str,
        object_id: &str,
        child_type: &str,
        data: Option<Value>,
    ) -> Result<Job> {
        let value = self
            .update_child(object_type, object_id, child_type, data)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// 查询作业状态: GET `Job/{id}`
    pub async fn get_job(&self, job_id: &str) -> Result<Job> {
        let value = self.get(crate::api::JOB, job_id).await?;
        Ok(serde_json::from_value(value)?)
    }
}
