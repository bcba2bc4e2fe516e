//! 作业轮询
//!
//! 所有变更类请求都返回作业引用。轮询器按 `PollPolicy` 反复查询
//! `Job/{id}`，直到作业汇总完成并进入终态：
//!
//! - `summaryDone = false`：无论 `jobRunState` 为何都视为运行中
//! - `SUCCESS`：`changed = true`，携带 `resultId`
//! - `FAILURE`：`failed = true`，消息包含管理器返回的错误
//! - `RUNNING`：继续轮询
//! - 其他状态：按失败处理

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::OvmClient;
use crate::error::{OvmError, Result};
use crate::models::{Job, JobRunState, OperationResult, SimpleId};

/// 作业轮询策略
///
/// 默认值为固定 1 秒间隔、无次数和时间上限。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// 首次查询前及两次查询之间的等待时间（毫秒）
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// 退避倍数，1.0 表示固定间隔
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// 退避后的最大间隔（毫秒）
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    /// 最大查询次数
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// 总等待时间上限（秒）
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_interval_ms: default_max_interval_ms(),
            max_attempts: None,
            timeout: None,
        }
    }
}

impl PollPolicy {
    /// 第 `attempt` 次查询前的等待时间（从 0 开始）
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.interval_ms as f64;
        let multiplier = self.backoff_multiplier.max(1.0);
        let delay = base * multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let capped = delay.min(self.max_interval_ms.max(self.interval_ms) as f64);
        Duration::from_millis(capped as u64)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_max_interval_ms() -> u64 {
    30_000
}

/// 将作业快照映射为结果，未到终态时返回 `None`
pub fn job_outcome(job: &Job) -> Option<OperationResult> {
    if !job.summary_done {
        return None;
    }

    match &job.job_run_state {
        JobRunState::Running => None,
        JobRunState::Success => Some(OperationResult::succeeded(job.result_id.clone())),
        JobRunState::Failure => Some(OperationResult::failure(format!(
            "Job {} failed with: {}.",
            job.id.value,
            job.error_text()
        ))),
        JobRunState::Other(state) => {
            warn!("作业 {} 以未知状态结束: {}", job.id.value, state);
            Some(OperationResult::failure(format!(
                "Job {} finished in unexpected state {}.",
                job.id.value, state
            )))
        }
    }
}

/// 作业轮询器
pub struct JobPoller<'a> {
    client: &'a OvmClient,
}

impl<'a> JobPoller<'a> {
    pub(crate) fn new(client: &'a OvmClient) -> Self {
        Self { client }
    }

    /// 等待作业进入终态
    pub async fn wait(&self, job_id: &SimpleId) -> Result<OperationResult> {
        let policy = self.client.poll_policy();
        let cancel = self.client.cancellation_token();
        let started = Instant::now();
        let mut attempt: u32 = 0;

        info!("等待作业完成: {}", job_id.value);

        loop {
            if let Some(max) = policy.max_attempts {
                if attempt >= max {
                    return Err(OvmError::Timeout {
                        job_id: job_id.value.clone(),
                        reason: format!("超过最大轮询次数 {}", max),
                    });
                }
            }

            // 等待时间不超过剩余时限
            let mut delay = policy.delay_for(attempt);
            if let Some(timeout) = policy.timeout() {
                let elapsed = started.elapsed();
                if attempt > 0 && elapsed >= timeout {
                    return Err(OvmError::Timeout {
                        job_id: job_id.value.clone(),
                        reason: format!("超过等待时间 {} 秒", timeout.as_secs()),
                    });
                }
                delay = delay.min(timeout.saturating_sub(elapsed));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("作业 {} 轮询被取消", job_id.value);
                    return Err(OvmError::Cancelled(job_id.value.clone()));
                }
                _ = tokio::time::sleep(delay) => {}
            }

            let job = self.client.get_job(&job_id.value).await?;
            attempt += 1;
            debug!(
                "作业 {} 第 {} 次查询: {} (summaryDone={})",
                job_id.value, attempt, job.job_run_state, job.summary_done
            );

            if let Some(outcome) = job_outcome(&job) {
                if outcome.failed {
                    warn!("作业失败: {}", job_id.value);
                } else {
                    info!("作业成功: {}", job_id.value);
                }
                return Ok(outcome);
            }
        }
    }
}
