//! 工具箱：注册表、执行器与内置工具
//!
//! 通用工具（terminal / code_editor / requests_get / exit_conversation）始终可用；
//! 视觉工具依赖远程推理服务，wine_db 依赖键值库凭据，由 agent::build_registry 按配置注册。

pub mod code_editor;
pub mod executor;
pub mod exit;
pub mod inference;
pub mod registry;
pub mod requests_get;
pub mod schema;
pub mod terminal;
pub mod vision;
pub mod wine_db;

pub use code_editor::CodeEditorTool;
pub use executor::{ToolExecutor, ToolOutcome};
pub use exit::ExitConversationTool;
pub use inference::InferenceClient;
pub use registry::{Tool, ToolRegistry};
pub use requests_get::RequestsGetTool;
pub use schema::action_schema_json;
pub use terminal::TerminalTool;
pub use vision::{
    ImageEditingTool, InstructPix2PixTool, Text2ImageTool, VisionContext,
    VisualQuestionAnsweringTool,
};
pub use wine_db::WineDbTool;
