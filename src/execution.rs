//! 异步执行：提交后立即返回 id，后台跑命令管线，调用方按 id 轮询
//!
//! 状态随推理事件推进：PENDING -> (LLM_END | TOOL_END)* -> SUCCESS | FAILURE。
//! 记录存在 moka 缓存中（条数上限 + 创建后过期），过期后查询返回 None。

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::agent::{AgentService, CommandRequest, CommandResponse};
use crate::core::AgentError;
use crate::react::{ReasoningStep, StepEvent, StepKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    LlmEnd,
    ToolEnd,
    Success,
    Failure,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub answer: String,
    pub files: Vec<String>,
}

/// 最近一步的展示信息；index 从 1 开始，跨恢复重试单调递增
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepInfo {
    pub index: usize,
    pub action: String,
    pub action_input: String,
    pub observation: String,
}

impl StepInfo {
    fn from_step(index: usize, step: &ReasoningStep) -> Self {
        Self {
            index,
            action: step.tool.clone().unwrap_or_default(),
            action_input: step.tool_input.clone().unwrap_or_default(),
            observation: step.observation.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionRecord {
    pub status: ExecutionStatus,
    pub result: Option<ExecutionResult>,
    pub info: Option<StepInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionRecord {
    fn pending() -> Self {
        Self {
            status: ExecutionStatus::Pending,
            result: None,
            info: None,
            error: None,
        }
    }
}

/// 执行记录表：id -> 最新状态
#[derive(Clone)]
pub struct ExecutionStore {
    cache: Cache<String, ExecutionRecord>,
}

impl ExecutionStore {
    pub fn new(max_entries: u64, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries.max(1))
            .time_to_live(Duration::from_secs(ttl_secs.max(1)))
            .build();
        Self { cache }
    }

    /// 新建 PENDING 记录，返回 uuid-v4 id
    pub fn create(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.cache.insert(id.clone(), ExecutionRecord::pending());
        id
    }

    pub fn get(&self, id: &str) -> Option<ExecutionRecord> {
        self.cache.get(id)
    }

    fn record_step(&self, id: &str, kind: StepKind, info: StepInfo) {
        let Some(mut record) = self.cache.get(id) else {
            return;
        };
        record.status = match kind {
            StepKind::LlmEnd => ExecutionStatus::LlmEnd,
            StepKind::ToolEnd => ExecutionStatus::ToolEnd,
        };
        record.info = Some(info);
        self.cache.insert(id.to_string(), record);
    }

    fn finish(&self, id: &str, result: Result<CommandResponse, AgentError>) {
        let mut record = self.cache.get(id).unwrap_or_else(ExecutionRecord::pending);
        match result {
            Ok(resp) => {
                record.status = ExecutionStatus::Success;
                record.result = Some(ExecutionResult {
                    answer: resp.response,
                    files: resp.files,
                });
            }
            Err(e) => {
                record.status = ExecutionStatus::Failure;
                record.error = Some(e.to_string());
            }
        }
        self.cache.insert(id.to_string(), record);
    }
}

/// 后台执行一条命令，立即返回执行 id
///
/// 事件消费任务先于终态写入结束，SUCCESS / FAILURE 之后不会再被步骤事件覆盖。
pub fn spawn_execution(service: Arc<AgentService>, store: ExecutionStore, req: CommandRequest) -> String {
    let id = store.create();
    tracing::info!(execution = %id, key = %req.key, "execution submitted");

    let task_id = id.clone();
    tokio::spawn(async move {
        let (tx, mut rx) = mpsc::unbounded_channel::<StepEvent>();

        let progress_store = store.clone();
        let progress_id = task_id.clone();
        let progress = tokio::spawn(async move {
            let mut index = 0;
            while let Some(ev) = rx.recv().await {
                if ev.kind == StepKind::LlmEnd {
                    index += 1;
                }
                progress_store.record_step(&progress_id, ev.kind, StepInfo::from_step(index, &ev.step));
            }
        });

        let result = service.handle_command_observed(&req, Some(&tx)).await;
        drop(tx);
        if let Err(e) = progress.await {
            tracing::warn!(execution = %task_id, error = %e, "progress task aborted");
        }

        match &result {
            Ok(_) => tracing::info!(execution = %task_id, "execution succeeded"),
            Err(e) => tracing::warn!(execution = %task_id, kind = e.kind(), error = %e, "execution failed"),
        }
        store.finish(&task_id, result);
    });

    id
}
