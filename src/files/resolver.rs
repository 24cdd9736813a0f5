//! FileResolver：类型标签 -> 处理器；远程引用下载到 workspace 后再处理
//!
//! 下载文件名为 uuid-v5(引用)，同一引用总是落到同一路径，重复解析得到相同文本。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::core::AgentError;
use crate::files::{extension, workspace_path, FileHandler, FileType};

pub struct FileResolver {
    handlers: HashMap<FileType, Arc<dyn FileHandler>>,
    workspace: PathBuf,
    client: Client,
}

impl FileResolver {
    pub fn new(workspace: impl AsRef<Path>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            handlers: HashMap::new(),
            workspace: workspace.as_ref().to_path_buf(),
            client,
        }
    }

    pub fn register(&mut self, tag: FileType, handler: Arc<dyn FileHandler>) {
        self.handlers.insert(tag, handler);
    }

    pub fn with_handler(mut self, tag: FileType, handler: impl FileHandler + 'static) -> Self {
        self.register(tag, Arc::new(handler));
        self
    }

    pub fn supports(&self, tag: FileType) -> bool {
        self.handlers.contains_key(&tag)
    }

    /// 按给定类型解析；无处理器时返回 UnsupportedFileType
    pub async fn resolve(&self, reference: &str, tag: FileType) -> Result<String, AgentError> {
        let handler = self
            .handlers
            .get(&tag)
            .ok_or_else(|| AgentError::UnsupportedFileType(format!("{} ({})", reference, tag)))?;
        let (name, path) = self.localize(reference, tag).await?;
        handler
            .handle(&name, &path)
            .await
            .map_err(|e| AgentError::FileFetch(format!("{}: {}", reference, e)))
    }

    /// 先按扩展名判断类型，再解析
    pub async fn resolve_detected(&self, reference: &str) -> Result<String, AgentError> {
        let tag = FileType::detect(reference)?;
        self.resolve(reference, tag).await
    }

    /// 远程引用下载到 <workspace>/<dir>/<uuid5>.<ext>，本地引用原样使用
    async fn localize(&self, reference: &str, tag: FileType) -> Result<(String, PathBuf), AgentError> {
        if !(reference.starts_with("http://") || reference.starts_with("https://")) {
            let path = workspace_path(&self.workspace, reference).map_err(AgentError::FileFetch)?;
            return Ok((reference.to_string(), path));
        }

        let ext = extension(reference).unwrap_or_else(|| tag.default_extension().to_string());
        let id = uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_URL, reference.as_bytes());
        let name = format!("{}/{}.{}", tag.dir_name(), id.simple(), ext);
        let path = self.workspace.join(&name);
        if path.is_file() {
            return Ok((name, path));
        }

        tracing::info!(url = %reference, target = %name, "downloading file reference");
        let resp = self
            .client
            .get(reference)
            .send()
            .await
            .map_err(|e| AgentError::FileFetch(format!("{}: {}", reference, e)))?;
        if !resp.status().is_success() {
            return Err(AgentError::FileFetch(format!("{}: HTTP {}", reference, resp.status())));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AgentError::FileFetch(format!("{}: {}", reference, e)))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AgentError::FileFetch(e.to_string()))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| AgentError::FileFetch(e.to_string()))?;
        Ok((name, path))
    }
}
