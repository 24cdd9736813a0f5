//! DeepSeek（OpenAI 兼容端点）
//!
//! 推理循环依赖 JSON action 指令，deepseek-chat 比 deepseek-reasoner 更稳定地遵守格式，故为默认模型。

use crate::llm::OpenAiClient;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

/// Key 取 `DEEPSEEK_API_KEY`，缺省回退 `OPENAI_API_KEY`；base_url 可由 [llm].base_url 覆盖
pub fn create_deepseek_client(model: Option<&str>, base_url: Option<&str>) -> OpenAiClient {
    let api_key = std::env::var("DEEPSEEK_API_KEY")
        .or_else(|_| std::env::var("OPENAI_API_KEY"))
        .ok();
    OpenAiClient::new(
        Some(base_url.unwrap_or(DEEPSEEK_BASE_URL)),
        model.unwrap_or(DEEPSEEK_CHAT),
        api_key.as_deref(),
    )
}
