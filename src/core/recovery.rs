//! 错误恢复：一次失败后用解释性提示词重试一次，第二次失败直接把错误信息作为回复

use crate::react::{recovery_prompt, AgentExecutor, StepSender};

/// 恢复结果：succeeded 为 false 时 output 是第二次失败的错误信息，调用方不再提取产物
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryOutcome {
    pub output: String,
    pub succeeded: bool,
}

/// 最多两次推理：首轮失败后重试一次，不做第三次
pub async fn run_with_recovery(executor: &mut AgentExecutor, prompt: &str) -> RecoveryOutcome {
    run_with_recovery_observed(executor, prompt, None).await
}

/// 同 run_with_recovery，两轮推理的步骤事件都推送到 events
pub async fn run_with_recovery_observed(
    executor: &mut AgentExecutor,
    prompt: &str,
    events: Option<&StepSender>,
) -> RecoveryOutcome {
    let first = match executor.run_observed(prompt, events).await {
        Ok(output) => {
            return RecoveryOutcome {
                output,
                succeeded: true,
            }
        }
        Err(e) => e,
    };

    tracing::warn!(
        session = %executor.session_key(),
        kind = first.kind(),
        error = %first,
        "reasoning pass failed, retrying with recovery prompt"
    );
    let retry = recovery_prompt(prompt, &first.message());

    match executor.run_observed(&retry, events).await {
        Ok(output) => RecoveryOutcome {
            output,
            succeeded: true,
        },
        Err(second) => {
            tracing::error!(
                session = %executor.session_key(),
                kind = second.kind(),
                error = %second,
                "recovery pass failed"
            );
            RecoveryOutcome {
                output: second.message(),
                succeeded: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::llm::ScriptedLlmClient;
    use crate::react::Planner;
    use crate::tools::{ToolExecutor, ToolRegistry};

    fn executor(llm: Arc<ScriptedLlmClient>) -> AgentExecutor {
        let planner = Arc::new(Planner::new(llm, "system"));
        let tools = Arc::new(ToolExecutor::new(ToolRegistry::new(), 5));
        AgentExecutor::new("s1", planner, tools, 5, 10)
    }

    #[tokio::test]
    async fn success_needs_no_retry() {
        let llm = Arc::new(ScriptedLlmClient::ok(["fine"]));
        let mut exec = executor(llm.clone());
        let out = run_with_recovery(&mut exec, "hello").await;
        assert_eq!(out, RecoveryOutcome { output: "fine".to_string(), succeeded: true });
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn answer_with_braces_is_not_a_failure() {
        let answer = "Use a block like fn main() { println!(\"hi\"); } to print.";
        let llm = Arc::new(ScriptedLlmClient::ok([answer, "The set {1, 2} has two elements."]));
        let mut exec = executor(llm.clone());
        let out = run_with_recovery(&mut exec, "how do I print?").await;
        assert_eq!(out, RecoveryOutcome { output: answer.to_string(), succeeded: true });
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn retry_carries_first_error_message() {
        let llm = Arc::new(ScriptedLlmClient::new([
            Err::<&str, &str>("context too long"),
            Ok("Sorry, the request was too long."),
        ]));
        let mut exec = executor(llm.clone());
        let out = run_with_recovery(&mut exec, "summarize").await;

        assert!(out.succeeded);
        assert_eq!(out.output, "Sorry, the request was too long.");
        let calls = llm.calls();
        let retry_input = &calls[1].last().unwrap().content;
        assert_eq!(retry_input, &recovery_prompt("summarize", "context too long"));
        assert_eq!(exec.memory().len(), 1);
    }

    #[tokio::test]
    async fn two_failures_return_second_message() {
        let llm = Arc::new(ScriptedLlmClient::new([
            Err::<&str, &str>("boom"),
            Err("rate limited"),
            Ok("never used"),
        ]));
        let mut exec = executor(llm.clone());
        let out = run_with_recovery(&mut exec, "hi").await;
        assert_eq!(out, RecoveryOutcome { output: "rate limited".to_string(), succeeded: false });
        assert_eq!(llm.call_count(), 2);
        assert!(exec.memory().is_empty());
    }
}
