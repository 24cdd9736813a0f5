//! 图片 -> 描述文本（远程推理服务的 caption 任务）

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::files::FileHandler;
use crate::tools::InferenceClient;

pub const IMAGE_PROMPT: &str = "provide a figure named {filename}. The description is: {description}.\n\n\
Please understand and answer the image based on this information. \
The image understanding is complete, so don't try to understand the image again.\n";

pub struct ImageCaptioning {
    client: Arc<InferenceClient>,
}

impl ImageCaptioning {
    pub fn new(client: Arc<InferenceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FileHandler for ImageCaptioning {
    async fn handle(&self, name: &str, path: &Path) -> Result<String, String> {
        let description = self.client.text("caption", Some(path), &[]).await?;
        tracing::debug!(file = %name, caption = %description, "image captioned");
        Ok(IMAGE_PROMPT
            .replace("{filename}", name)
            .replace("{description}", description.trim()))
    }
}
