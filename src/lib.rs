//! EVAL - 对话式工具调用智能体服务
//!
//! 模块划分：
//! - **agent**: 命令处理管线（文件解析 -> 推理 -> 产物上传）与按配置组装工具
//! - **api**: axum HTTP 接口（`web` feature）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、会话存储、错误恢复
//! - **execution**: 异步执行与状态轮询
//! - **files**: 文件引用解析（图片描述、CSV 摘要）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **memory**: 会话记忆
//! - **react**: Planner、提示词拼装、ReAct 主循环
//! - **tools**: 工具注册表、执行器与内置工具
//! - **upload**: 产物提取与上传

pub mod agent;
#[cfg(feature = "web")]
pub mod api;
pub mod config;
pub mod core;
pub mod execution;
pub mod files;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;
pub mod upload;

pub use agent::{AgentService, CommandRequest, CommandResponse};
