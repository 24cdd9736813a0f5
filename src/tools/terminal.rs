//! Terminal 工具：在工作目录执行一条 shell 命令
//!
//! 可选白名单（仅首词，空表示不限制）；危险子串（rm -rf、mkfs、fork bomb 等）始终拒绝。
//! 非零退出码不视为工具失败：退出码与 stderr 一并作为 Observation 返回，由模型自行修正。

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::tools::Tool;

/// 禁止的命令/子串（即使白名单中有同名，也不允许带这些参数）
const FORBIDDEN_SUBSTR: &[&str] = &[
    "rm -rf /",
    "rm -fr /",
    "chmod 777 /",
    "mkfs",
    "dd if=",
    "> /dev/sd",
    "shutdown",
    "reboot",
    ":(){ :|:& };:", // fork bomb
];

pub struct TerminalTool {
    workdir: PathBuf,
    allowed_commands: HashSet<String>,
    timeout_secs: u64,
}

impl TerminalTool {
    pub fn new(workdir: impl AsRef<Path>, allowed_commands: Vec<String>, timeout_secs: u64) -> Self {
        let allowed_commands = allowed_commands
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect();
        Self {
            workdir: workdir.as_ref().to_path_buf(),
            allowed_commands,
            timeout_secs,
        }
    }

    fn check(&self, raw: &str) -> Result<(), String> {
        let raw_lower = raw.to_lowercase();
        for forbidden in FORBIDDEN_SUBSTR {
            if raw_lower.contains(forbidden) {
                return Err(format!("Forbidden pattern: {}", forbidden));
            }
        }
        let name = raw_lower.split_whitespace().next().unwrap_or("");
        if name.is_empty() {
            return Err("Empty command".to_string());
        }
        if self.allowed_commands.is_empty() || self.allowed_commands.contains(name) {
            return Ok(());
        }
        Err(format!("Command '{}' not in allowlist", name))
    }
}

#[async_trait]
impl Tool for TerminalTool {
    fn name(&self) -> &str {
        "terminal"
    }

    fn description(&self) -> &str {
        "Executes commands in a terminal. If a linux errno occurs, solve the problem with further terminal commands. \
         Input must be one valid command. Output will be any output from running that command."
    }

    async fn run(&self, input: &str) -> Result<String, String> {
        let command = input.trim();
        self.check(command)?;

        tracing::info!(command = %command, "terminal tool execute");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.current_dir(&self.workdir).kill_on_drop(true);

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), cmd.output())
            .await
            .map_err(|_| format!("Command timed out after {}s", self.timeout_secs))?
            .map_err(|e| format!("Execution failed: {}", e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let mut text = stdout;
        if !stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&stderr);
        }
        if !output.status.success() {
            text = format!("{}\n(exit code {:?})", text, output.status.code());
        }
        if text.trim().is_empty() {
            text = "(no output)".to_string();
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_patterns_rejected_even_without_allowlist() {
        let tool = TerminalTool::new(".", vec![], 5);
        assert!(tool.check("ls -la").is_ok());
        assert!(tool.check("sudo rm -rf / --no-preserve-root").is_err());
        assert!(tool.check("   ").is_err());
    }

    #[test]
    fn allowlist_applies_to_first_word() {
        let tool = TerminalTool::new(".", vec!["ls".into(), "echo".into()], 5);
        assert!(tool.check("echo hi").is_ok());
        assert_eq!(
            tool.check("python -c 1").unwrap_err(),
            "Command 'python' not in allowlist"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_in_workdir_and_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let tool = TerminalTool::new(dir.path(), vec![], 5);

        let out = tool.run("ls").await.unwrap();
        assert!(out.contains("marker.txt"));

        let out = tool.run("ls does-not-exist").await.unwrap();
        assert!(out.contains("exit code"));
    }
}
