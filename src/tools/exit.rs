//! ExitConversation 工具：结束当前推理，输入原样作为最终回复

use async_trait::async_trait;

use crate::tools::Tool;

pub struct ExitConversationTool;

#[async_trait]
impl Tool for ExitConversationTool {
    fn name(&self) -> &str {
        "exit_conversation"
    }

    fn description(&self) -> &str {
        "A tool to exit the conversation. Use this when you want to end the conversation. \
         The input should be the message to send to the user before the conversation ends."
    }

    fn is_terminal(&self) -> bool {
        true
    }

    async fn run(&self, input: &str) -> Result<String, String> {
        let text = input.trim();
        Ok(if text.is_empty() {
            "Goodbye.".to_string()
        } else {
            text.to_string()
        })
    }
}
