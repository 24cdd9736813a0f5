//! 工具执行器
//!
//! 持有 ToolRegistry 与单次调用超时；run(tool_name, input) 在超时内调用工具，
//! 未注册返回 UnknownTool，失败或超时返回 ToolExecution；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::AgentError;
use crate::tools::{Tool, ToolRegistry};

/// 工具执行结果：观察文本与该工具是否终止对话
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub observation: String,
    pub terminal: bool,
}

/// 工具执行器：对每次调用施加超时，并将结果映射为 AgentError
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub async fn run(&self, tool_name: &str, input: &str) -> Result<ToolOutcome, AgentError> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| AgentError::UnknownTool(tool_name.to_string()))?;

        let start = Instant::now();
        let result = timeout(self.timeout, tool.run(input)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "input_preview": preview(input),
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(Ok(observation)) => Ok(ToolOutcome {
                observation,
                terminal: tool.is_terminal(),
            }),
            Ok(Err(message)) => Err(AgentError::ToolExecution {
                tool: tool_name.to_string(),
                message,
            }),
            Err(_) => Err(AgentError::ToolExecution {
                tool: tool_name.to_string(),
                message: format!("timed out after {}s", self.timeout.as_secs()),
            }),
        }
    }

}

fn preview(input: &str) -> String {
    if input.chars().count() > 200 {
        format!("{}...", input.chars().take(200).collect::<String>())
    } else {
        input.to_string()
    }
}
