//! 命令处理管线
//!
//! 文件引用解析 -> 拼提示词 -> 取会话执行器并加锁 -> 推理（失败时重试一次）-> 提取并上传产物。
//! build_registry / build_file_resolver 按启动时的 AppConfig 决定注册哪些工具与文件处理器。

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::core::{run_with_recovery_observed, AgentError, SessionStore};
use crate::files::{CsvToDataframe, FileResolver, FileType, ImageCaptioning};
use crate::llm::LlmClient;
use crate::react::{assemble_prompt, build_system_prompt, Planner, StepSender};
use crate::tools::{
    CodeEditorTool, ExitConversationTool, ImageEditingTool, InferenceClient, InstructPix2PixTool,
    RequestsGetTool, TerminalTool, Text2ImageTool, ToolExecutor, ToolRegistry, VisionContext,
    VisualQuestionAnsweringTool, WineDbTool,
};
use crate::upload::{extract_artifacts, upload_artifacts, StaticUploader, Uploader};

/// POST /command 请求体
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub key: String,
    pub query: String,
    #[serde(default)]
    pub files: Vec<String>,
}

/// POST /command 响应体：files 为上传后的 URL，图片在前
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub response: String,
    pub files: Vec<String>,
}

fn inference_client(cfg: &AppConfig) -> Option<Arc<InferenceClient>> {
    cfg.tools
        .inference
        .base_url
        .as_deref()
        .filter(|u| !u.is_empty())
        .map(|u| Arc::new(InferenceClient::new(u, cfg.tools.inference.timeout_secs)))
}

/// 按配置组装工具注册表（注册顺序即工具菜单顺序）
pub fn build_registry(cfg: &AppConfig, workspace: &Path) -> Result<ToolRegistry, AgentError> {
    let mut registry = ToolRegistry::new();
    registry.register(TerminalTool::new(
        workspace,
        cfg.tools.terminal.allowed_commands.clone(),
        cfg.tools.terminal.timeout_secs,
    ))?;
    registry.register(CodeEditorTool::new(workspace))?;
    registry.register(RequestsGetTool::new(
        cfg.tools.requests.timeout_secs,
        cfg.tools.requests.max_result_chars,
    ))?;

    if let Some(client) = inference_client(cfg) {
        let ctx = VisionContext::new(client, workspace);
        registry.register(Text2ImageTool::new(ctx.clone()))?;
        registry.register(ImageEditingTool::new(ctx.clone()))?;
        registry.register(InstructPix2PixTool::new(ctx.clone()))?;
        registry.register(VisualQuestionAnsweringTool::new(ctx))?;
    } else {
        tracing::info!("no inference endpoint configured, vision tools disabled");
    }

    let wine = &cfg.tools.wine_db;
    if let (true, Some(host), Some(password)) =
        (wine.is_configured(), wine.host.as_deref(), wine.password.as_deref())
    {
        let tool = WineDbTool::new(host, wine.user.as_deref(), password, cfg.tools.tool_timeout_secs)
            .map_err(AgentError::Config)?;
        registry.register(tool)?;
    }

    registry.register(ExitConversationTool)?;
    tracing::info!(tools = ?registry.tool_names(), "tool registry ready");
    Ok(registry)
}

/// CSV 处理器始终可用；图片描述需要推理服务
pub fn build_file_resolver(cfg: &AppConfig, workspace: &Path) -> FileResolver {
    let mut resolver = FileResolver::new(workspace).with_handler(FileType::Dataframe, CsvToDataframe);
    if let Some(client) = inference_client(cfg) {
        resolver.register(FileType::Image, Arc::new(ImageCaptioning::new(client)));
    }
    resolver
}

/// 命令服务：文件解析器 + 会话存储 + 上传器，供 HTTP 层共享
pub struct AgentService {
    resolver: FileResolver,
    sessions: SessionStore,
    uploader: Arc<dyn Uploader>,
}

impl AgentService {
    pub fn new(resolver: FileResolver, sessions: SessionStore, uploader: Arc<dyn Uploader>) -> Self {
        Self {
            resolver,
            sessions,
            uploader,
        }
    }

    /// 由配置与 LLM 构建完整服务（工具、Planner、会话缓存、静态目录上传）
    pub fn from_config(cfg: &AppConfig, llm: Arc<dyn LlmClient>) -> Result<Self, AgentError> {
        let workspace = cfg.app.workspace();
        let registry = build_registry(cfg, &workspace)?;
        let planner = Arc::new(Planner::new(llm, build_system_prompt(&cfg.app.bot_name, &registry)));
        let tools = Arc::new(ToolExecutor::new(registry, cfg.tools.tool_timeout_secs));
        let sessions = SessionStore::new(
            planner,
            tools,
            cfg.agent.max_steps,
            cfg.app.memory_window_turns,
            cfg.app.max_sessions,
            cfg.app.session_idle_secs,
        );
        let uploader = StaticUploader::new(&workspace, &cfg.app.static_dir, &cfg.app.public_url());
        Ok(Self::new(
            build_file_resolver(cfg, &workspace),
            sessions,
            Arc::new(uploader),
        ))
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// 处理一条命令；文件解析失败与上传失败返回 Err，推理失败以错误文本作为回复
    pub async fn handle_command(&self, req: &CommandRequest) -> Result<CommandResponse, AgentError> {
        self.handle_command_observed(req, None).await
    }

    /// 同 handle_command，推理步骤同时推送到 events
    pub async fn handle_command_observed(
        &self,
        req: &CommandRequest,
        events: Option<&StepSender>,
    ) -> Result<CommandResponse, AgentError> {
        tracing::info!(key = %req.key, query = %req.query, files = req.files.len(), "command received");

        let mut fragments = Vec::with_capacity(req.files.len());
        for file in &req.files {
            fragments.push(self.resolver.resolve_detected(file).await?);
        }
        let prompt = assemble_prompt(&fragments, &req.query);

        let executor = self.sessions.get_or_create(&req.key);
        let outcome = {
            let mut guard = executor.lock().await;
            let outcome = run_with_recovery_observed(&mut guard, &prompt, events).await;
            tracing::debug!(key = %req.key, memory = %guard.memory(), "session memory");
            outcome
        };

        if !outcome.succeeded {
            tracing::info!(key = %req.key, response = %outcome.output, "command failed after recovery");
            return Ok(CommandResponse {
                response: outcome.output,
                files: Vec::new(),
            });
        }

        let artifacts = extract_artifacts(&outcome.output);
        let files = upload_artifacts(self.uploader.as_ref(), &artifacts).await?;
        tracing::info!(key = %req.key, response = %outcome.output, files = ?files, "command done");
        Ok(CommandResponse {
            response: outcome.output,
            files,
        })
    }
}
