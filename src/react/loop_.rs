//! ReAct 主循环：每个会话一个 AgentExecutor
//!
//! THINKING -> (TOOL_SELECTED -> OBSERVING -> THINKING)* -> FINISHED | FAILED | BUDGET_EXHAUSTED
//!
//! 传入 StepSender 时，每步模型输出推送 LLM_END、每次工具返回推送 TOOL_END。
//! 循环内不捕获错误：模型、工具、解析错误都原样返回给调用方（见 core::recovery）。
//! 只有 FINISHED 会把 (input, output) 追加到会话记忆。

use std::sync::Arc;

use crate::core::AgentError;
use crate::memory::{ConversationMemory, Message};
use crate::react::events::{
    log_action, log_final_answer, log_observation, send_event, ReasoningStep, StepKind, StepSender,
};
use crate::react::planner::{parse_llm_output, Planner, PlannerOutput, FINAL_ANSWER_ACTION};
use crate::tools::ToolExecutor;

/// 单会话执行器：会话记忆 + 步数上限 + 共享的 Planner 与工具集
pub struct AgentExecutor {
    session_key: String,
    memory: ConversationMemory,
    max_steps: usize,
    /// 拼入 LLM 上下文的历史轮数
    window: usize,
    planner: Arc<Planner>,
    tools: Arc<ToolExecutor>,
}

impl AgentExecutor {
    pub fn new(
        session_key: impl Into<String>,
        planner: Arc<Planner>,
        tools: Arc<ToolExecutor>,
        max_steps: usize,
        window: usize,
    ) -> Self {
        Self {
            session_key: session_key.into(),
            memory: ConversationMemory::new(),
            max_steps,
            window,
            planner,
            tools,
        }
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// 执行一轮推理；成功时返回最终回复并写入记忆，失败时记忆不变
    pub async fn run(&mut self, input: &str) -> Result<String, AgentError> {
        self.run_observed(input, None).await
    }

    pub async fn run_observed(
        &mut self,
        input: &str,
        events: Option<&StepSender>,
    ) -> Result<String, AgentError> {
        let mut messages = self.memory.to_messages(self.window);
        messages.push(Message::user(input.to_string()));

        let (init_prompt, init_completion, _) = self.planner.token_usage();

        for step in 0..self.max_steps {
            let output = self.planner.plan(&messages).await?;

            match parse_llm_output(&output)? {
                PlannerOutput::FinalAnswer(answer) => {
                    let reasoning =
                        ReasoningStep::thinking(output.clone()).with_action(FINAL_ANSWER_ACTION, &answer);
                    send_event(events, StepKind::LlmEnd, &reasoning);
                    log_final_answer(&self.session_key, step, &answer);
                    self.finish(input, &answer, init_prompt, init_completion);
                    return Ok(answer);
                }
                PlannerOutput::Action { tool, input: tool_input } => {
                    let reasoning = ReasoningStep::thinking(output.clone()).with_action(&tool, &tool_input);
                    log_action(&self.session_key, step, &reasoning);
                    send_event(events, StepKind::LlmEnd, &reasoning);

                    let outcome = self.tools.run(&tool, &tool_input).await?;
                    let reasoning = reasoning.with_observation(&outcome.observation);
                    log_observation(&self.session_key, step, &reasoning);
                    send_event(events, StepKind::ToolEnd, &reasoning);

                    if outcome.terminal {
                        log_final_answer(&self.session_key, step, &outcome.observation);
                        self.finish(input, &outcome.observation, init_prompt, init_completion);
                        return Ok(outcome.observation);
                    }

                    // 将本步输出与观察写回对话，供下一轮 Plan 使用
                    messages.push(Message::assistant(output));
                    messages.push(Message::user(reasoning.observation_message()));
                }
            }
        }

        tracing::warn!(session = %self.session_key, max_steps = self.max_steps, "step budget exhausted");
        Err(AgentError::BudgetExhausted(self.max_steps))
    }

    fn finish(&mut self, input: &str, output: &str, init_prompt: u64, init_completion: u64) {
        self.memory.append(input, output);
        let (prompt, completion, total) = self.planner.token_usage();
        tracing::debug!(
            session = %self.session_key,
            prompt_tokens = prompt.saturating_sub(init_prompt),
            completion_tokens = completion.saturating_sub(init_completion),
            cumulative_total = total,
            turns = self.memory.len(),
            "token usage"
        );
    }
}
