//! Agent 错误类型
//!
//! ReAct 循环内部不捕获错误：任一变体都会中止本轮推理，交由 recovery::run_with_recovery 决定是否重试。

use thiserror::Error;

/// 推理、工具、文件解析与上传过程中可能出现的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Failed to fetch file: {0}")]
    FileFetch(String),

    /// 模型选择了未注册的工具
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("Tool {tool} failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// 超过最大步数仍未得到 Final Answer
    #[error("Agent stopped after {0} steps without a final answer")]
    BudgetExhausted(usize),

    #[error("LLM error: {0}")]
    ModelCall(String),

    /// 模型输出含 JSON 但无法解析为 action 指令
    #[error("Could not parse LLM output: {0}")]
    OutputParse(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl AgentError {
    /// 不带类别前缀的错误信息，用于恢复提示词与返回给用户的文本
    pub fn message(&self) -> String {
        match self {
            AgentError::UnsupportedFileType(m)
            | AgentError::FileFetch(m)
            | AgentError::UnknownTool(m)
            | AgentError::DuplicateTool(m)
            | AgentError::ModelCall(m)
            | AgentError::OutputParse(m)
            | AgentError::Upload(m)
            | AgentError::Config(m) => m.clone(),
            AgentError::ToolExecution { message, .. } => message.clone(),
            AgentError::BudgetExhausted(_) => self.to_string(),
        }
    }

    /// 错误类别名（日志字段）
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::UnsupportedFileType(_) => "unsupported_file_type",
            AgentError::FileFetch(_) => "file_fetch",
            AgentError::UnknownTool(_) => "unknown_tool",
            AgentError::DuplicateTool(_) => "duplicate_tool",
            AgentError::ToolExecution { .. } => "tool_execution",
            AgentError::BudgetExhausted(_) => "budget_exhausted",
            AgentError::ModelCall(_) => "model_call",
            AgentError::OutputParse(_) => "output_parse",
            AgentError::Upload(_) => "upload",
            AgentError::Config(_) => "config",
        }
    }
}
