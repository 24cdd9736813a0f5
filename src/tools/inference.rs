//! 远程视觉推理客户端
//!
//! 文生图、图像编辑、指令改图、视觉问答与图片描述都依赖 GPU 模型，由独立推理服务承担：
//! POST {base_url}/{task}?k=v，请求体为图片原始字节（无图时为空），
//! 文本类任务返回 JSON `{"text": "..."}`，图像类任务直接返回 PNG 字节。

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TextReply {
    text: String,
}

pub struct InferenceClient {
    client: Client,
    base_url: String,
}

impl InferenceClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post(
        &self,
        task: &str,
        image: Option<&Path>,
        params: &[(&str, &str)],
    ) -> Result<reqwest::Response, String> {
        let body = match image {
            Some(p) => tokio::fs::read(p)
                .await
                .map_err(|e| format!("Failed to read image {}: {}", p.display(), e))?,
            None => Vec::new(),
        };
        let url = format!("{}/{}", self.base_url, task);
        tracing::debug!(url = %url, bytes = body.len(), "inference request");
        let resp = self
            .client
            .post(&url)
            .query(params)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| format!("Inference request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("Inference service returned HTTP {}", resp.status()));
        }
        Ok(resp)
    }

    /// 文本类任务（caption、vqa）
    pub async fn text(
        &self,
        task: &str,
        image: Option<&Path>,
        params: &[(&str, &str)],
    ) -> Result<String, String> {
        let reply: TextReply = self
            .post(task, image, params)
            .await?
            .json()
            .await
            .map_err(|e| format!("Invalid inference reply: {}", e))?;
        Ok(reply.text)
    }

    /// 图像类任务，返回生成图片的字节
    pub async fn image(
        &self,
        task: &str,
        image: Option<&Path>,
        params: &[(&str, &str)],
    ) -> Result<Vec<u8>, String> {
        let bytes = self
            .post(task, image, params)
            .await?
            .bytes()
            .await
            .map_err(|e| format!("Read inference body: {}", e))?;
        if bytes.is_empty() {
            return Err("Inference service returned an empty image".to_string());
        }
        Ok(bytes.to_vec())
    }
}

/// 生成图片落盘：<workspace>/image/<uuid>.png，返回相对路径 image/<uuid>.png（供产物提取匹配）
pub async fn save_generated_image(workspace: &Path, bytes: &[u8]) -> Result<String, String> {
    let dir: PathBuf = workspace.join("image");
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| format!("Failed to create image dir: {}", e))?;
    let name = format!("{}.png", uuid::Uuid::new_v4().simple());
    tokio::fs::write(dir.join(&name), bytes)
        .await
        .map_err(|e| format!("Failed to save image: {}", e))?;
    Ok(format!("image/{}", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn text_task_parses_json_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vqa"))
            .and(query_param("question", "what color?"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "red"})))
            .mount(&server)
            .await;

        let client = InferenceClient::new(&format!("{}/", server.uri()), 5);
        let answer = client.text("vqa", None, &[("question", "what color?")]).await.unwrap();
        assert_eq!(answer, "red");
    }

    #[tokio::test]
    async fn image_task_returns_bytes_and_errors_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/text2image"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = InferenceClient::new(&server.uri(), 5);
        assert_eq!(client.image("text2image", None, &[]).await.unwrap(), vec![1, 2, 3]);
        assert!(client.image("broken", None, &[]).await.unwrap_err().contains("500"));
    }

    #[tokio::test]
    async fn saved_image_path_is_workspace_relative() {
        let dir = tempfile::tempdir().unwrap();
        let rel = save_generated_image(dir.path(), b"png").await.unwrap();
        assert!(rel.starts_with("image/") && rel.ends_with(".png"));
        assert_eq!(std::fs::read(dir.path().join(&rel)).unwrap(), b"png");
    }
}
