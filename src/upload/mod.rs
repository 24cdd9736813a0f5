//! 产物提取与上传
//!
//! 最终回复中形如 image/...png、dataframe/...csv 的路径视为生成的文件；
//! 按类型分组（图片在前、数据表在后），组内保持出现顺序，逐个交给 Uploader 换成 URL。

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::core::AgentError;
use crate::files::workspace_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Image,
    Dataframe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArtifact {
    pub kind: ArtifactKind,
    pub raw_reference: String,
}

const IMAGE_PATTERN: &str = r"image/\S*png";
const DATAFRAME_PATTERN: &str = r"dataframe/\S*csv";

static IMAGE_RE: OnceLock<Option<Regex>> = OnceLock::new();
static DATAFRAME_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// 左到右、互不重叠的全部匹配
fn find_all(cell: &'static OnceLock<Option<Regex>>, pattern: &str, text: &str) -> Vec<String> {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .map(|re| re.find_iter(text).map(|m| m.as_str().to_string()).collect())
        .unwrap_or_default()
}

/// 提取产物引用：先全部图片，再全部数据表
pub fn extract_artifacts(text: &str) -> Vec<ExtractedArtifact> {
    let images = find_all(&IMAGE_RE, IMAGE_PATTERN, text)
        .into_iter()
        .map(|raw_reference| ExtractedArtifact {
            kind: ArtifactKind::Image,
            raw_reference,
        });
    let dataframes = find_all(&DATAFRAME_RE, DATAFRAME_PATTERN, text)
        .into_iter()
        .map(|raw_reference| ExtractedArtifact {
            kind: ArtifactKind::Dataframe,
            raw_reference,
        });
    images.chain(dataframes).collect()
}

/// 上传协作方：workspace 内的相对路径 -> 可访问 URL
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, raw_reference: &str) -> Result<String, String>;
}

/// 依次上传；任一失败即整体失败（不返回部分结果）
pub async fn upload_artifacts(
    uploader: &dyn Uploader,
    artifacts: &[ExtractedArtifact],
) -> Result<Vec<String>, AgentError> {
    let mut urls = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let url = uploader
            .upload(&artifact.raw_reference)
            .await
            .map_err(|e| AgentError::Upload(format!("{}: {}", artifact.raw_reference, e)))?;
        tracing::info!(file = %artifact.raw_reference, url = %url, "artifact uploaded");
        urls.push(url);
    }
    Ok(urls)
}

/// 复制到本地静态目录，由 HTTP 层在 /static/<name> 提供下载
pub struct StaticUploader {
    workspace: PathBuf,
    static_dir: PathBuf,
    public_url: String,
}

impl StaticUploader {
    pub fn new(workspace: impl AsRef<Path>, static_dir: impl AsRef<Path>, public_url: &str) -> Self {
        Self {
            workspace: workspace.as_ref().to_path_buf(),
            static_dir: static_dir.as_ref().to_path_buf(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Uploader for StaticUploader {
    async fn upload(&self, raw_reference: &str) -> Result<String, String> {
        let source = workspace_path(&self.workspace, raw_reference)?;
        let file_name = Path::new(raw_reference)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| format!("Invalid artifact path: {}", raw_reference))?;
        tokio::fs::create_dir_all(&self.static_dir)
            .await
            .map_err(|e| format!("Failed to create static dir: {}", e))?;
        tokio::fs::copy(&source, self.static_dir.join(file_name))
            .await
            .map_err(|e| format!("Failed to copy {}: {}", source.display(), e))?;
        Ok(format!("{}/static/{}", self.public_url, file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_come_before_dataframes_in_text_order() {
        let text = "Saved dataframe/b.csv, then image/a.png and finally image/c.png.";
        let refs: Vec<_> = extract_artifacts(text)
            .into_iter()
            .map(|a| a.raw_reference)
            .collect();
        assert_eq!(refs, vec!["image/a.png", "image/c.png", "dataframe/b.csv"]);
    }

    #[test]
    fn text_without_markers_yields_nothing() {
        assert!(extract_artifacts("It's a cat sitting on a mat.").is_empty());
        let a = extract_artifacts("see image/out_123.png");
        assert_eq!(a[0].kind, ArtifactKind::Image);
    }

    struct FailOn(&'static str);

    #[async_trait]
    impl Uploader for FailOn {
        async fn upload(&self, raw: &str) -> Result<String, String> {
            if raw == self.0 {
                Err("quota exceeded".to_string())
            } else {
                Ok(format!("https://cdn/{}", raw))
            }
        }
    }

    #[tokio::test]
    async fn any_failed_upload_fails_all() {
        let artifacts = extract_artifacts("image/a.png dataframe/b.csv");
        let ok = upload_artifacts(&FailOn("none"), &artifacts).await.unwrap();
        assert_eq!(ok, vec!["https://cdn/image/a.png", "https://cdn/dataframe/b.csv"]);

        let err = upload_artifacts(&FailOn("dataframe/b.csv"), &artifacts)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Upload(ref m) if m.contains("quota exceeded")));
    }

    #[tokio::test]
    async fn static_uploader_copies_and_builds_url() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(ws.path().join("image")).unwrap();
        std::fs::write(ws.path().join("image/out.png"), b"png").unwrap();
        let static_dir = ws.path().join("static");

        let uploader = StaticUploader::new(ws.path(), &static_dir, "http://localhost:8000/");
        let url = uploader.upload("image/out.png").await.unwrap();
        assert_eq!(url, "http://localhost:8000/static/out.png");
        assert_eq!(std::fs::read(static_dir.join("out.png")).unwrap(), b"png");
        assert!(uploader.upload("image/missing.png").await.is_err());
    }

    #[tokio::test]
    async fn static_uploader_refuses_paths_outside_workspace() {
        let root = tempfile::tempdir().unwrap();
        let ws = root.path().join("ws");
        std::fs::create_dir_all(ws.join("dataframe")).unwrap();
        std::fs::write(root.path().join("secret.csv"), b"token").unwrap();
        let static_dir = root.path().join("static");
        let uploader = StaticUploader::new(&ws, &static_dir, "http://localhost:8000");

        let artifacts = extract_artifacts("done: dataframe/../../secret.csv");
        assert_eq!(artifacts[0].raw_reference, "dataframe/../../secret.csv");
        let err = upload_artifacts(&uploader, &artifacts).await.unwrap_err();
        assert!(matches!(err, AgentError::Upload(ref m) if m.contains("escapes the workspace")));
        assert!(!static_dir.join("secret.csv").exists());
    }
}
