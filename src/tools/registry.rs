//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / run），由 ToolRegistry 按注册顺序保存；
//! 顺序决定提示词中工具菜单的顺序，须稳定。重名注册返回 DuplicateTool。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::AgentError;

/// 工具 trait：名称、描述（供 LLM 理解）、文本输入 -> 文本输出
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（action 指令中的 "action" 字段）
    fn name(&self) -> &str;

    /// 工具描述（拼入工具菜单，说明用途与输入格式）
    fn description(&self) -> &str;

    /// 调用后是否直接结束本轮推理（如 exit_conversation）
    fn is_terminal(&self) -> bool {
        false
    }

    /// 执行工具；Err 中的文本会被包装为 ToolExecution 错误
    async fn run(&self, input: &str) -> Result<String, String>;
}

/// 工具注册表：有序保存 Arc<dyn Tool>，按名索引
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), AgentError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), AgentError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(AgentError::DuplicateTool(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| self.tools[i].clone())
    }

    /// 按注册顺序返回全部工具
    pub fn all(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    /// 返回 (name, description) 列表，用于生成 prompt 中的工具菜单
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.tools
            .iter()
            .map(|t| (t.name().to_string(), t.description().to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
