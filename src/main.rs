//! EVAL 服务入口
//!
//! 初始化日志、加载配置、构建 AgentService，并启动 HTTP 服务。

use std::sync::Arc;

use anyhow::Context;
use eval_agent::{
    api::{router, AppState},
    config::{load_config, AppConfig},
    execution::ExecutionStore,
    llm::create_llm_from_config,
    observability, AgentService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config ({}), using defaults", e);
        AppConfig::default()
    });

    let workspace = cfg.app.workspace();
    for dir in ["image", "dataframe"] {
        std::fs::create_dir_all(workspace.join(dir))
            .with_context(|| format!("Failed to create {}/{}", workspace.display(), dir))?;
    }
    std::fs::create_dir_all(&cfg.app.static_dir).context("Failed to create static dir")?;

    let llm = create_llm_from_config(&cfg);
    let service = AgentService::from_config(&cfg, llm).context("Failed to build agent service")?;
    let state = Arc::new(AppState {
        bot_name: cfg.app.bot_name.clone(),
        service: Arc::new(service),
        executions: ExecutionStore::new(cfg.app.max_executions, cfg.app.execution_ttl_secs),
        workspace,
        static_dir: cfg.app.static_dir.clone(),
    });

    let addr = format!("{}:{}", cfg.app.host, cfg.app.port);
    tracing::info!("{} listening on http://{}", cfg.app.bot_name, addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, router(state)).await.context("Server error")?;

    Ok(())
}
