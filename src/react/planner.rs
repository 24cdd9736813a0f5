//! Planner：system prompt 拼装与 action 指令解析
//!
//! 调用 LLM 得到回复；parse_llm_output 从文本中提取 JSON 并解析为工具调用或最终回复。

use std::sync::Arc;

use serde::Deserialize;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::tools::{action_schema_json, ToolRegistry};

/// action 字段取此值时表示直接回复用户
pub const FINAL_ANSWER_ACTION: &str = "Final Answer";

/// LLM 输出的 action 指令（{"action": "terminal", "action_input": "ls"}）
#[derive(Debug, Clone, Deserialize)]
struct ActionDirective {
    #[serde(default)]
    action: String,
    #[serde(default)]
    action_input: serde_json::Value,
}

/// Planner 输出
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannerOutput {
    /// 调用工具
    Action { tool: String, input: String },
    /// 结束本轮推理，直接回复用户
    FinalAnswer(String),
}

fn input_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn directive(json_str: &str) -> Result<PlannerOutput, AgentError> {
    let parsed: ActionDirective = serde_json::from_str(json_str)
        .map_err(|e| AgentError::OutputParse(format!("{}: {}", e, json_str)))?;

    let action = parsed.action.trim();
    if action.is_empty() {
        return Err(AgentError::OutputParse(format!("missing \"action\": {}", json_str)));
    }
    let input = input_text(parsed.action_input);
    if action == FINAL_ANSWER_ACTION {
        Ok(PlannerOutput::FinalAnswer(input))
    } else {
        Ok(PlannerOutput::Action {
            tool: action.to_string(),
            input,
        })
    }
}

/// 解析 LLM 输出
///
/// - ```json 代码块：必须是合法指令，否则 OutputParse
/// - 首个 { 到末个 } 的片段含 "action" 键：按指令解析，JSON 不合法时 OutputParse
/// - 其余（包括含花括号的代码、集合记号）整段视为最终回复
pub fn parse_llm_output(output: &str) -> Result<PlannerOutput, AgentError> {
    let trimmed = output.trim();

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let block = rest.find("```").map(|end| &rest[..end]).unwrap_or(rest);
        return directive(block.trim());
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            let span = &trimmed[start..=end];
            match serde_json::from_str::<serde_json::Value>(span) {
                Ok(serde_json::Value::Object(map)) if map.contains_key("action") => {
                    return directive(span)
                }
                // 看起来是指令但 JSON 写坏了
                Err(_) if span.contains("\"action\"") => return directive(span),
                _ => {}
            }
        }
    }

    Ok(PlannerOutput::FinalAnswer(trimmed.to_string()))
}

/// 按注册顺序生成工具菜单与输出格式说明
pub fn build_system_prompt(bot_name: &str, registry: &ToolRegistry) -> String {
    let menu = registry
        .tool_descriptions()
        .into_iter()
        .map(|(name, desc)| format!("> {}: {}", name, desc))
        .collect::<Vec<_>>()
        .join("\n");
    let names = registry.tool_names().join(", ");

    format!(
        "You are {bot}, an assistant that answers questions and completes tasks, \
using tools when they help.\n\n\
TOOLS\n------\n{menu}\n\n\
RESPONSE FORMAT\n---------------\n\
To use a tool, reply with exactly one JSON object and nothing else:\n\
{{\"action\": \"<one of: {names}>\", \"action_input\": \"<tool input>\"}}\n\
To answer the user, reply with:\n\
{{\"action\": \"{final_answer}\", \"action_input\": \"<your answer>\"}}\n\n\
The directive must match this JSON schema:\n{schema}\n\n\
After each tool call you will receive \"Observation: <tool output>\". \
When a file such as image/xxx.png or dataframe/xxx.csv is produced, mention its path in the final answer.",
        bot = bot_name,
        menu = menu,
        names = names,
        final_answer = FINAL_ANSWER_ACTION,
        schema = action_schema_json(),
    )
}

/// Planner：持有 LLM 与 system prompt；plan 在消息前拼上 system 后调用 LLM
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: impl Into<String>) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    pub async fn plan(&self, messages: &[Message]) -> Result<String, AgentError> {
        let mut full_messages = Vec::with_capacity(messages.len() + 1);
        full_messages.push(Message::system(self.system_prompt.clone()));
        full_messages.extend_from_slice(messages);
        self.llm
            .complete(&full_messages)
            .await
            .map_err(AgentError::ModelCall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::tools::Tool;

    #[test]
    fn plain_text_is_final_answer() {
        assert_eq!(
            parse_llm_output("  It's a cat sitting on a mat.\n").unwrap(),
            PlannerOutput::FinalAnswer("It's a cat sitting on a mat.".to_string())
        );
    }

    #[test]
    fn parses_tool_action_in_code_block() {
        let out = "Thought: list files\n```json\n{\"action\": \"terminal\", \"action_input\": \"ls -la\"}\n```";
        assert_eq!(
            parse_llm_output(out).unwrap(),
            PlannerOutput::Action {
                tool: "terminal".to_string(),
                input: "ls -la".to_string()
            }
        );
    }

    #[test]
    fn final_answer_action_and_object_input() {
        assert_eq!(
            parse_llm_output(r#"{"action": "Final Answer", "action_input": "done"}"#).unwrap(),
            PlannerOutput::FinalAnswer("done".to_string())
        );
        assert_eq!(
            parse_llm_output(r#"{"action": "wine_db", "action_input": {"key": "merlot"}}"#).unwrap(),
            PlannerOutput::Action {
                tool: "wine_db".to_string(),
                input: r#"{"key":"merlot"}"#.to_string()
            }
        );
    }

    #[test]
    fn malformed_directive_is_output_parse_error() {
        assert!(matches!(
            parse_llm_output(r#"{"action": "terminal", "action_input": }"#),
            Err(AgentError::OutputParse(_))
        ));
        assert!(matches!(
            parse_llm_output("```json\n{\"action_input\": \"x\"}\n```"),
            Err(AgentError::OutputParse(_))
        ));
    }

    #[test]
    fn braces_in_plain_answer_are_not_directives() {
        let code = "Use a block like fn main() { println!(\"hi\"); } to print.";
        assert_eq!(
            parse_llm_output(code).unwrap(),
            PlannerOutput::FinalAnswer(code.to_string())
        );
        assert_eq!(
            parse_llm_output("The set {1, 2} has two elements.").unwrap(),
            PlannerOutput::FinalAnswer("The set {1, 2} has two elements.".to_string())
        );
        // 不含 action 键的 JSON 也是普通回复
        assert_eq!(
            parse_llm_output(r#"The config is {"port": 8000}."#).unwrap(),
            PlannerOutput::FinalAnswer(r#"The config is {"port": 8000}."#.to_string())
        );
    }

    struct Named(&'static str);

    #[async_trait]
    impl Tool for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "desc"
        }
        async fn run(&self, input: &str) -> Result<String, String> {
            Ok(input.to_string())
        }
    }

    #[test]
    fn tool_menu_follows_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Named("zeta")).unwrap();
        registry.register(Named("alpha")).unwrap();
        let prompt = build_system_prompt("EVAL", &registry);
        let zeta = prompt.find("> zeta: desc").unwrap();
        let alpha = prompt.find("> alpha: desc").unwrap();
        assert!(zeta < alpha);
        assert!(prompt.contains("one of: zeta, alpha"));
        assert!(prompt.contains("\"action_input\""));
    }
}
