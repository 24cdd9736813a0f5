//! 文件引用解析：把请求中的文件引用转为可拼入提示词的文本片段
//!
//! - FileType：按扩展名分类（image / dataframe）
//! - FileHandler：每种类型一个处理器（图片描述、CSV 摘要）
//! - FileResolver：远程引用先下载到 workspace/<类型目录>/，再交给对应处理器；不接触会话状态
//! - save_upload：POST /upload 收到的文件按类型落盘，返回的相对路径可直接作为文件引用

pub mod dataframe;
pub mod image;
pub mod resolver;

use std::fmt;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::core::AgentError;

pub use dataframe::CsvToDataframe;
pub use image::ImageCaptioning;
pub use resolver::FileResolver;

/// 文件类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FileType {
    Image,
    Dataframe,
}

impl FileType {
    /// 按引用末尾扩展名（忽略 ?query 与 #fragment）判断类型
    pub fn detect(reference: &str) -> Result<Self, AgentError> {
        let ext = extension(reference)
            .ok_or_else(|| AgentError::UnsupportedFileType(reference.to_string()))?;
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" => Ok(FileType::Image),
            "csv" => Ok(FileType::Dataframe),
            _ => Err(AgentError::UnsupportedFileType(reference.to_string())),
        }
    }

    /// 本地存放目录，与产物提取的前缀一致
    pub fn dir_name(&self) -> &'static str {
        match self {
            FileType::Image => "image",
            FileType::Dataframe => "dataframe",
        }
    }

    /// 下载落盘时使用的扩展名
    pub fn default_extension(&self) -> &'static str {
        match self {
            FileType::Image => "png",
            FileType::Dataframe => "csv",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

pub(crate) fn extension(reference: &str) -> Option<String> {
    let path = reference.split(['?', '#']).next().unwrap_or(reference);
    let name = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_lowercase())
    }
}

/// workspace 相对引用 -> 本地路径；绝对路径或含 `..` 的引用拒绝
pub(crate) fn workspace_path(workspace: &Path, reference: &str) -> Result<PathBuf, String> {
    let path = Path::new(reference);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if reference.is_empty() || escapes {
        return Err(format!("'{}' escapes the workspace", reference));
    }
    Ok(workspace.join(path))
}

/// 保存一个上传文件到 <workspace>/<类型目录>/<uuid>.<ext>，返回可作为文件引用的相对路径
pub async fn save_upload(workspace: &Path, file_name: &str, bytes: &[u8]) -> Result<String, AgentError> {
    let tag = FileType::detect(file_name)?;
    let ext = extension(file_name).unwrap_or_else(|| tag.default_extension().to_string());
    let name = format!("{}/{}.{}", tag.dir_name(), uuid::Uuid::new_v4().simple(), ext);
    let path = workspace.join(&name);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AgentError::Upload(format!("{}: {}", parent.display(), e)))?;
    }
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| AgentError::Upload(format!("{}: {}", path.display(), e)))?;
    tracing::info!(file = %file_name, saved = %name, size = bytes.len(), "file uploaded");
    Ok(name)
}

/// 单一类型的文件处理器：name 为提示词中引用该文件用的 workspace 相对路径，path 为本地实际路径
#[async_trait]
pub trait FileHandler: Send + Sync {
    async fn handle(&self, name: &str, path: &Path) -> Result<String, String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_extension() {
        assert_eq!(FileType::detect("uploads/cat.PNG").unwrap(), FileType::Image);
        assert_eq!(FileType::detect("https://x/y/data.csv?sig=1").unwrap(), FileType::Dataframe);
        assert_eq!(
            FileType::detect("notes.txt").unwrap_err(),
            AgentError::UnsupportedFileType("notes.txt".to_string())
        );
        assert!(FileType::detect("no_extension").is_err());
    }

    #[tokio::test]
    async fn uploads_land_in_type_directory() {
        let dir = tempfile::tempdir().unwrap();
        let name = save_upload(dir.path(), "Cat.JPG", b"jpg").await.unwrap();
        assert!(name.starts_with("image/"));
        assert!(name.ends_with(".jpg"));
        assert_eq!(std::fs::read(dir.path().join(&name)).unwrap(), b"jpg");

        let name = save_upload(dir.path(), "../../wines.csv", b"a,b\n").await.unwrap();
        assert!(name.starts_with("dataframe/"));
        assert!(workspace_path(dir.path(), &name).is_ok());

        assert_eq!(
            save_upload(dir.path(), "notes.txt", b"x").await.unwrap_err(),
            AgentError::UnsupportedFileType("notes.txt".to_string())
        );
    }

    #[test]
    fn workspace_path_stays_inside_root() {
        let root = Path::new("/srv/ws");
        assert_eq!(
            workspace_path(root, "image/a.png").unwrap(),
            PathBuf::from("/srv/ws/image/a.png")
        );
        assert!(workspace_path(root, "dataframe/../../secret.csv").is_err());
        assert!(workspace_path(root, "/etc/passwd.csv").is_err());
        assert!(workspace_path(root, "").is_err());
    }
}
