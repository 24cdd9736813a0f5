//! 推理过程日志与进度事件
//!
//! 每一步（思考、工具调用、观察、最终回复）输出一条 tracing 事件；多行内容只保留首行，
//! 其余行数以 "(+N lines)" 标注。调用方传入 StepSender 时，同时推送 StepEvent（异步执行轮询用）。

use tokio::sync::mpsc::UnboundedSender;

/// 单步推理记录（仅在本轮推理内存在，不持久化）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReasoningStep {
    pub thought: String,
    pub tool: Option<String>,
    pub tool_input: Option<String>,
    pub observation: Option<String>,
}

impl ReasoningStep {
    pub fn thinking(thought: impl Into<String>) -> Self {
        Self {
            thought: thought.into(),
            ..Default::default()
        }
    }

    pub fn with_action(mut self, tool: &str, input: &str) -> Self {
        self.tool = Some(tool.to_string());
        self.tool_input = Some(input.to_string());
        self
    }

    pub fn with_observation(mut self, observation: &str) -> Self {
        self.observation = Some(observation.to_string());
        self
    }

    /// 写回对话的 Observation 消息
    pub fn observation_message(&self) -> String {
        format!("Observation: {}", self.observation.as_deref().unwrap_or(""))
    }
}

/// 进度节点：模型给出一步输出 / 工具返回
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    LlmEnd,
    ToolEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepEvent {
    pub kind: StepKind,
    pub step: ReasoningStep,
}

pub type StepSender = UnboundedSender<StepEvent>;

pub(crate) fn send_event(tx: Option<&StepSender>, kind: StepKind, step: &ReasoningStep) {
    if let Some(t) = tx {
        let _ = t.send(StepEvent {
            kind,
            step: step.clone(),
        });
    }
}

const FIRST_LINE_MAX_CHARS: usize = 160;

/// 首行（截断到 160 字符）+ 剩余行数标记
pub fn first_line(text: &str) -> String {
    let mut lines = text.trim().lines();
    let head = lines.next().unwrap_or("");
    let rest = lines.count();
    let mut out: String = head.chars().take(FIRST_LINE_MAX_CHARS).collect();
    if head.chars().count() > FIRST_LINE_MAX_CHARS {
        out.push_str("...");
    }
    if rest > 0 {
        out.push_str(&format!(" (+{} lines)", rest));
    }
    out
}

pub fn log_action(session: &str, step: usize, step_info: &ReasoningStep) {
    tracing::info!(
        session = %session,
        step,
        action = step_info.tool.as_deref().unwrap_or(""),
        input = %first_line(step_info.tool_input.as_deref().unwrap_or("")),
        "agent action"
    );
}

pub fn log_observation(session: &str, step: usize, step_info: &ReasoningStep) {
    tracing::info!(
        session = %session,
        step,
        observation = %first_line(step_info.observation.as_deref().unwrap_or("")),
        "agent observation"
    );
}

pub fn log_final_answer(session: &str, step: usize, answer: &str) {
    tracing::info!(session = %session, step, answer = %first_line(answer), "agent finished");
}
