//! 提示词拼装：文件片段 + 用户问题；失败后的解释性重试提示

/// 重试模板：{prompt} 为原提示词，{error} 为首次失败的错误信息
const RECOVERY_TEMPLATE: &str =
    "An error has occurred for the following text: \n{prompt} Please explain this error.\n {error}";

/// 各文件片段按调用方顺序以换行连接，用户问题放在最后
pub fn assemble_prompt<S: AsRef<str>>(fragments: &[S], query: &str) -> String {
    let joined = fragments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}{}", joined, query)
}

pub fn recovery_prompt(prompt: &str, error: &str) -> String {
    RECOVERY_TEMPLATE
        .replace("{prompt}", prompt)
        .replace("{error}", error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_precede_query_in_order() {
        let prompt = assemble_prompt(&["figure A\n", "table B\n"], "compare them");
        assert_eq!(prompt, "figure A\n\ntable B\ncompare them");
        assert_eq!(assemble_prompt::<&str>(&[], "hi"), "hi");
    }

    #[test]
    fn recovery_embeds_prompt_and_error() {
        assert_eq!(
            recovery_prompt("list files", "terminal timeout"),
            "An error has occurred for the following text: \nlist files Please explain this error.\n terminal timeout"
        );
    }
}
