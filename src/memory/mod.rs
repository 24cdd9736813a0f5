//! 记忆层：按会话追加的对话历史

pub mod conversation;

pub use conversation::{ConversationMemory, Message, Role, Turn};
