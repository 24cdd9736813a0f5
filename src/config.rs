//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `EVAL__*` 覆盖（双下划线表示嵌套，如 `EVAL__APP__PORT=9000`）。
//! 配置在启动时构建一次，按引用传入工具注册表与文件解析器的构造函数；推理循环内不再读取环境。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub tools: ToolsSection,
}

/// [app] 段：服务地址、工作目录、会话缓存
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 上传产物对外可访问的前缀，如 http://localhost:8000
    pub public_url: Option<String>,
    /// 工具读写 image/、dataframe/ 的根目录，未设置时用当前目录
    pub workspace_root: Option<PathBuf>,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// 同时保留的会话数上限
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u64,
    /// 会话空闲多久后被回收（秒）
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
    /// 拼入提示词的历史轮数
    #[serde(default = "default_memory_window_turns")]
    pub memory_window_turns: usize,
    /// 异步执行记录保留条数上限
    #[serde(default = "default_max_executions")]
    pub max_executions: u64,
    /// 异步执行记录创建后保留多久（秒）
    #[serde(default = "default_execution_ttl_secs")]
    pub execution_ttl_secs: u64,
}

fn default_bot_name() -> String {
    "EVAL".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_max_sessions() -> u64 {
    1000
}

fn default_session_idle_secs() -> u64 {
    6 * 60 * 60
}

fn default_memory_window_turns() -> usize {
    10
}

fn default_max_executions() -> u64 {
    10_000
}

fn default_execution_ttl_secs() -> u64 {
    60 * 60
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            host: default_host(),
            port: default_port(),
            public_url: None,
            workspace_root: None,
            static_dir: default_static_dir(),
            max_sessions: default_max_sessions(),
            session_idle_secs: default_session_idle_secs(),
            memory_window_turns: default_memory_window_turns(),
            max_executions: default_max_executions(),
            execution_ttl_secs: default_execution_ttl_secs(),
        }
    }
}

impl AppSection {
    pub fn workspace(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn public_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
    }
}

/// [llm] 段：后端选择
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：deepseek / openai；优先级由 API Key 与 provider 共同决定
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub deepseek: LlmDeepSeekSection,
    #[serde(default)]
    pub openai: LlmOpenAiSection,
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            deepseek: LlmDeepSeekSection::default(),
            openai: LlmOpenAiSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmDeepSeekSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmOpenAiSection {
    pub model: Option<String>,
}

/// [agent] 段：推理循环
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSection {
    /// 单轮推理最多调用 LLM 的次数
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

fn default_max_steps() -> usize {
    15
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

/// [tools] 段：工具超时与各工具配置
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default)]
    pub terminal: TerminalSection,
    #[serde(default)]
    pub requests: RequestsSection,
    #[serde(default)]
    pub inference: InferenceSection,
    #[serde(default)]
    pub wine_db: WineDbSection,
}

fn default_tool_timeout_secs() -> u64 {
    120
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            terminal: TerminalSection::default(),
            requests: RequestsSection::default(),
            inference: InferenceSection::default(),
            wine_db: WineDbSection::default(),
        }
    }
}

/// [tools.terminal] 段：命令白名单（空表示不限制）与命令超时
#[derive(Debug, Clone, Deserialize)]
pub struct TerminalSection {
    #[serde(default)]
    pub allowed_commands: Vec<String>,
    #[serde(default = "default_terminal_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_terminal_timeout_secs() -> u64 {
    60
}

impl Default for TerminalSection {
    fn default() -> Self {
        Self {
            allowed_commands: Vec::new(),
            timeout_secs: default_terminal_timeout_secs(),
        }
    }
}

/// [tools.requests] 段：抓取 URL 的超时与最大字符数
#[derive(Debug, Clone, Deserialize)]
pub struct RequestsSection {
    #[serde(default = "default_requests_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_result_chars")]
    pub max_result_chars: usize,
}

fn default_requests_timeout_secs() -> u64 {
    15
}

fn default_max_result_chars() -> usize {
    2000
}

impl Default for RequestsSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_requests_timeout_secs(),
            max_result_chars: default_max_result_chars(),
        }
    }
}

/// [tools.inference] 段：远程视觉推理服务；未配置 base_url 时不注册视觉工具与图片描述
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceSection {
    pub base_url: Option<String>,
    #[serde(default = "default_inference_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_inference_timeout_secs() -> u64 {
    300
}

impl Default for InferenceSection {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_inference_timeout_secs(),
        }
    }
}

/// [tools.wine_db] 段：远程键值库；host 与 password 都存在时才注册
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WineDbSection {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl WineDbSection {
    pub fn is_configured(&self) -> bool {
        self.host.as_deref().is_some_and(|h| !h.is_empty())
            && self.password.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// 从 config 目录加载配置，环境变量 EVAL__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 EVAL__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("EVAL")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("tools.terminal.allowed_commands")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
