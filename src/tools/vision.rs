//! 视觉工具：文生图、图像编辑、指令改图、视觉问答
//!
//! 均委托给远程 InferenceClient；仅在配置了 [tools.inference].base_url 时注册。
//! 输入为逗号分隔文本，首项为 workspace 内的图片路径（文生图除外）。
//! 生成的图片保存为 image/<uuid>.png，路径写入 Observation，最终回复引用它即可被上传。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::tools::inference::{save_generated_image, InferenceClient};
use crate::tools::Tool;

/// 视觉工具共享：推理客户端与工作目录
#[derive(Clone)]
pub struct VisionContext {
    client: Arc<InferenceClient>,
    workspace: PathBuf,
}

impl VisionContext {
    pub fn new(client: Arc<InferenceClient>, workspace: impl AsRef<Path>) -> Self {
        Self {
            client,
            workspace: workspace.as_ref().to_path_buf(),
        }
    }

    fn image_path(&self, raw: &str) -> Result<PathBuf, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("Missing image path".to_string());
        }
        let path = self.workspace.join(raw);
        if !path.is_file() {
            return Err(format!("Image not found: {}", raw));
        }
        Ok(path)
    }
}

/// 按逗号切分为恰好 n 段（最后一段保留其余逗号）
fn split_args(input: &str, n: usize) -> Vec<String> {
    input
        .splitn(n, ',')
        .map(|s| s.trim().to_string())
        .collect()
}

pub struct Text2ImageTool {
    ctx: VisionContext,
}

impl Text2ImageTool {
    pub fn new(ctx: VisionContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for Text2ImageTool {
    fn name(&self) -> &str {
        "text_to_image"
    }

    fn description(&self) -> &str {
        "Generate an image from user input text and save it to a file. Useful when you want to generate an image \
         of an object or a scene. The input should be the text used to generate the image. \
         The output is the path of the generated image."
    }

    async fn run(&self, input: &str) -> Result<String, String> {
        let prompt = input.trim();
        if prompt.is_empty() {
            return Err("Missing prompt".to_string());
        }
        let bytes = self
            .ctx
            .client
            .image("text2image", None, &[("prompt", prompt)])
            .await?;
        let saved = save_generated_image(&self.ctx.workspace, &bytes).await?;
        Ok(format!("Result saved to {}", saved))
    }
}

pub struct ImageEditingTool {
    ctx: VisionContext,
}

impl ImageEditingTool {
    pub fn new(ctx: VisionContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for ImageEditingTool {
    fn name(&self) -> &str {
        "image_editing"
    }

    fn description(&self) -> &str {
        "Remove or replace an object in a photo. The input should be a comma separated string: \
         'image_path, object_to_replace, replacement'. Leave out the replacement to remove the object. \
         The output is the path of the edited image."
    }

    async fn run(&self, input: &str) -> Result<String, String> {
        let args = split_args(input, 3);
        let image = self.ctx.image_path(&args[0])?;
        let target = args
            .get(1)
            .filter(|s| !s.is_empty())
            .ok_or("Missing object to replace")?;
        let replacement = args.get(2).map(String::as_str).unwrap_or("");
        let bytes = self
            .ctx
            .client
            .image(
                "image_editing",
                Some(&image),
                &[("target", target.as_str()), ("replacement", replacement)],
            )
            .await?;
        let saved = save_generated_image(&self.ctx.workspace, &bytes).await?;
        Ok(format!("Result saved to {}", saved))
    }
}

pub struct InstructPix2PixTool {
    ctx: VisionContext,
}

impl InstructPix2PixTool {
    pub fn new(ctx: VisionContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for InstructPix2PixTool {
    fn name(&self) -> &str {
        "instruct_pix2pix"
    }

    fn description(&self) -> &str {
        "Change the style of an image following a text instruction, e.g. 'make it look like a painting'. \
         The input should be a comma separated string: 'image_path, instruction'. \
         The output is the path of the new image."
    }

    async fn run(&self, input: &str) -> Result<String, String> {
        let args = split_args(input, 2);
        let image = self.ctx.image_path(&args[0])?;
        let instruction = args
            .get(1)
            .filter(|s| !s.is_empty())
            .ok_or("Missing instruction")?;
        let bytes = self
            .ctx
            .client
            .image("pix2pix", Some(&image), &[("instruction", instruction.as_str())])
            .await?;
        let saved = save_generated_image(&self.ctx.workspace, &bytes).await?;
        Ok(format!("Result saved to {}", saved))
    }
}

pub struct VisualQuestionAnsweringTool {
    ctx: VisionContext,
}

impl VisualQuestionAnsweringTool {
    pub fn new(ctx: VisionContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for VisualQuestionAnsweringTool {
    fn name(&self) -> &str {
        "visual_question_answering"
    }

    fn description(&self) -> &str {
        "Answer a question about an image. The input should be a comma separated string: \
         'image_path, question'. The output is the answer."
    }

    async fn run(&self, input: &str) -> Result<String, String> {
        let args = split_args(input, 2);
        let image = self.ctx.image_path(&args[0])?;
        let question = args
            .get(1)
            .filter(|s| !s.is_empty())
            .ok_or("Missing question")?;
        self.ctx
            .client
            .text("vqa", Some(&image), &[("question", question.as_str())])
            .await
    }
}
