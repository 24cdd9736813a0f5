//! 代码编辑工具：在工作目录内读写、追加、替换与删除文件
//!
//! 输入为纯文本：首行 `<操作> <路径>`，其余行为内容。
//! patch 的内容以单独一行 `=======` 分隔旧文本与新文本，先精确匹配，失败再做缩进容忍匹配。

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::tools::Tool;

const PATCH_SEPARATOR: &str = "=======";

/// 解析后的编辑指令
#[derive(Debug, PartialEq, Eq)]
enum EditOp {
    /// 可选行区间（1 起，含两端）
    Read { path: String, lines: Option<(usize, usize)> },
    Write { path: String, content: String },
    Append { path: String, content: String },
    Patch { path: String, old: String, new: String },
    Delete { path: String },
}

fn parse_op(input: &str) -> Result<EditOp, String> {
    let input = input.trim_start_matches('\n');
    let (head, body) = match input.split_once('\n') {
        Some((h, b)) => (h.trim(), b.to_string()),
        None => (input.trim(), String::new()),
    };
    let (op, target) = head
        .split_once(char::is_whitespace)
        .map(|(o, t)| (o.trim().to_lowercase(), t.trim()))
        .ok_or_else(|| format!("Expected '<operation> <path>' on the first line, got: {head}"))?;
    if target.is_empty() {
        return Err("Missing file path".to_string());
    }

    match op.as_str() {
        "read" => {
            let (path, lines) = match target.rsplit_once(':') {
                Some((p, range)) => match range.split_once('-') {
                    Some((s, e)) => {
                        let start = s.trim().parse::<usize>().map_err(|e| e.to_string())?;
                        let end = e.trim().parse::<usize>().map_err(|e| e.to_string())?;
                        (p.to_string(), Some((start.max(1), end)))
                    }
                    None => (target.to_string(), None),
                },
                None => (target.to_string(), None),
            };
            Ok(EditOp::Read { path, lines })
        }
        "write" => Ok(EditOp::Write {
            path: target.to_string(),
            content: body,
        }),
        "append" => Ok(EditOp::Append {
            path: target.to_string(),
            content: body,
        }),
        "patch" => {
            let mut old = Vec::new();
            let mut new = Vec::new();
            let mut seen_separator = false;
            for line in body.lines() {
                if !seen_separator && line.trim() == PATCH_SEPARATOR {
                    seen_separator = true;
                } else if seen_separator {
                    new.push(line);
                } else {
                    old.push(line);
                }
            }
            if !seen_separator {
                return Err(format!("patch requires a '{PATCH_SEPARATOR}' line between old and new text"));
            }
            Ok(EditOp::Patch {
                path: target.to_string(),
                old: old.join("\n"),
                new: new.join("\n"),
            })
        }
        "delete" => Ok(EditOp::Delete {
            path: target.to_string(),
        }),
        other => Err(format!("Unknown operation '{other}', expected read/write/append/patch/delete")),
    }
}

pub struct CodeEditorTool {
    allowed_root: PathBuf,
    max_file_size: usize,
}

impl CodeEditorTool {
    pub fn new(allowed_root: impl AsRef<Path>) -> Self {
        Self {
            allowed_root: allowed_root.as_ref().to_path_buf(),
            max_file_size: 10 * 1024 * 1024, // 10MB
        }
    }

    /// 相对路径拼到根目录下；拒绝 `..` 与根目录之外的绝对路径
    fn validate_path(&self, file_path: &str) -> Result<PathBuf, String> {
        let path = Path::new(file_path);
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(format!("Access denied: '{}' escapes the workspace", file_path));
        }
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.allowed_root.join(path)
        };
        if !absolute.starts_with(&self.allowed_root) {
            return Err(format!(
                "Access denied: path '{}' is outside allowed root",
                file_path
            ));
        }
        Ok(absolute)
    }

    fn read_limited(&self, path: &Path) -> Result<String, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("Failed to read file: {}", e))?;
        if content.len() > self.max_file_size {
            return Err(format!(
                "File too large: {} bytes (max: {})",
                content.len(),
                self.max_file_size
            ));
        }
        Ok(content)
    }

    fn ensure_parent(path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create directory: {}", e))?;
        }
        Ok(())
    }

    fn apply(&self, op: EditOp) -> Result<String, String> {
        match op {
            EditOp::Read { path, lines } => {
                let full = self.validate_path(&path)?;
                let content = self.read_limited(&full)?;
                Ok(match lines {
                    Some((start, end)) => content
                        .lines()
                        .enumerate()
                        .filter(|(i, _)| (start..=end).contains(&(i + 1)))
                        .map(|(i, l)| format!("{}|{}", i + 1, l))
                        .collect::<Vec<_>>()
                        .join("\n"),
                    None => content,
                })
            }
            EditOp::Write { path, content } => {
                let full = self.validate_path(&path)?;
                Self::ensure_parent(&full)?;
                std::fs::write(&full, &content)
                    .map_err(|e| format!("Failed to write file: {}", e))?;
                Ok(format!("Wrote {} bytes to {}", content.len(), path))
            }
            EditOp::Append { path, content } => {
                use std::io::Write;
                let full = self.validate_path(&path)?;
                Self::ensure_parent(&full)?;
                let mut file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&full)
                    .map_err(|e| format!("Failed to open file: {}", e))?;
                file.write_all(content.as_bytes())
                    .map_err(|e| format!("Failed to write file: {}", e))?;
                Ok(format!("Appended {} bytes to {}", content.len(), path))
            }
            EditOp::Patch { path, old, new } => {
                let full = self.validate_path(&path)?;
                let content = self.read_limited(&full)?;
                let (pos, matched) = find_exact_match(&content, &old)
                    .map(|p| (p, old.clone()))
                    .or_else(|| find_with_indentation_tolerance(&content, &old))
                    .ok_or_else(|| {
                        "Could not find the text to replace. It must match the file exactly \
                         (leading whitespace differences are tolerated)."
                            .to_string()
                    })?;
                let patched = format!("{}{}{}", &content[..pos], new, &content[pos + matched.len()..]);
                std::fs::write(&full, patched)
                    .map_err(|e| format!("Failed to write file: {}", e))?;
                let line_number = content[..pos].lines().count() + 1;
                Ok(format!("Patched {} at line {}", path, line_number))
            }
            EditOp::Delete { path } => {
                let full = self.validate_path(&path)?;
                std::fs::remove_file(&full).map_err(|e| format!("Failed to delete file: {}", e))?;
                Ok(format!("Deleted {}", path))
            }
        }
    }
}

fn find_exact_match(content: &str, old: &str) -> Option<usize> {
    if old.is_empty() {
        return None;
    }
    content.find(old)
}

/// 逐行忽略前导空白比较，返回 (字节位置, 文件中实际匹配的原文)
fn find_with_indentation_tolerance(content: &str, old: &str) -> Option<(usize, String)> {
    let old_lines: Vec<&str> = old.lines().collect();
    let first = old_lines.first()?.trim_start();
    let content_lines: Vec<&str> = content.lines().collect();

    for (i, line) in content_lines.iter().enumerate() {
        if line.trim_start() != first || i + old_lines.len() > content_lines.len() {
            continue;
        }
        let window = &content_lines[i..i + old_lines.len()];
        let matched = window
            .iter()
            .zip(&old_lines)
            .all(|(c, o)| c.trim_start() == o.trim_start());
        if matched {
            let byte_pos = content_lines[..i].iter().map(|l| l.len() + 1).sum();
            return Some((byte_pos, window.join("\n")));
        }
    }
    None
}

#[async_trait]
impl Tool for CodeEditorTool {
    fn name(&self) -> &str {
        "code_editor"
    }

    fn description(&self) -> &str {
        "Reads and edits files in the workspace. The first line of the input is '<operation> <path>' and \
         the remaining lines are the content. Operations: \
         'read <path>' or 'read <path>:<start>-<end>' returns the file (or numbered lines); \
         'write <path>' replaces the file with the content; \
         'append <path>' appends the content; \
         'patch <path>' replaces text: put the old text, then a line '=======', then the new text; \
         'delete <path>' removes the file."
    }

    async fn run(&self, input: &str) -> Result<String, String> {
        let op = parse_op(input)?;
        self.apply(op)
    }
}
