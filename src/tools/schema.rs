//! action 指令 JSON Schema 生成（schemars）
//!
//! 将「合法 action 指令」的结构注入 system prompt，减少 LLM 输出格式错误。

use schemars::{schema_for, JsonSchema};

/// 与 planner::parse_llm_output 解析的 `{"action": "...", "action_input": "..."}` 一致（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ActionDirective {
    /// 工具名，或 "Final Answer" 表示直接回复用户
    pub action: String,
    /// 工具输入文本，或最终回复内容
    pub action_input: String,
}

/// 返回 action 指令的 JSON Schema 字符串，可拼入 system prompt
pub fn action_schema_json() -> String {
    let schema = schema_for!(ActionDirective);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lists_both_fields() {
        let schema = action_schema_json();
        assert!(schema.contains("\"action\""));
        assert!(schema.contains("\"action_input\""));
    }
}
