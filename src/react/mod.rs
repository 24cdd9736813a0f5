//! 认知层：Planner、提示词拼装、ReAct 主循环与过程日志

pub mod events;
pub mod loop_;
pub mod planner;
pub mod prompt;

pub use events::{ReasoningStep, StepEvent, StepKind, StepSender};
pub use loop_::AgentExecutor;
pub use planner::{build_system_prompt, parse_llm_output, Planner, PlannerOutput, FINAL_ANSWER_ACTION};
pub use prompt::{assemble_prompt, recovery_prompt};
