//! 会话记忆：对话历史
//!
//! 每个会话按顺序保存 (input, output) 轮次，只追加不删改；
//! 渲染给 LLM 时只取最近 window 轮，底层记录保持完整。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 一轮对话：用户输入与最终回复
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub input: String,
    pub output: String,
}

/// 追加式对话记忆
#[derive(Clone, Debug, Default)]
pub struct ConversationMemory {
    turns: Vec<Turn>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, input: impl Into<String>, output: impl Into<String>) {
        self.turns.push(Turn {
            input: input.into(),
            output: output.into(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// 最近 window 轮渲染为 user/assistant 消息对
    pub fn to_messages(&self, window: usize) -> Vec<Message> {
        let skip = self.turns.len().saturating_sub(window);
        self.turns[skip..]
            .iter()
            .flat_map(|t| [Message::user(t.input.clone()), Message::assistant(t.output.clone())])
            .collect()
    }
}

impl fmt::Display for ConversationMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in &self.turns {
            writeln!(f, "Human: {}", t.input)?;
            writeln!(f, "AI: {}", t.output)?;
        }
        Ok(())
    }
}
