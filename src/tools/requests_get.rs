//! RequestsGet 工具：GET 一个 URL 并返回可读文本
//!
//! HTML 响应用 html2text 提取正文（失败时退回简易去标签）；超过 max_result_chars 时截断并追加 ...[truncated]。

use std::time::Duration;

use async_trait::async_trait;
use html2text::from_read;
use reqwest::Client;

use crate::tools::Tool;

pub struct RequestsGetTool {
    client: Client,
    max_result_chars: usize,
}

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!")
        || s.to_ascii_lowercase().starts_with("<html")
        || (s.contains("</") && (s.contains("<head") || s.contains("<body") || s.contains("<div")))
}

fn truncate_chars(body: String, max: usize) -> String {
    if body.chars().count() > max {
        body.chars().take(max).collect::<String>() + "\n...[truncated]"
    } else {
        body
    }
}

impl RequestsGetTool {
    pub fn new(timeout_secs: u64, max_result_chars: usize) -> Self {
        const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            max_result_chars,
        }
    }

    fn html_to_text(&self, html: &str) -> String {
        match from_read(html.as_bytes(), 120) {
            Ok(text) if !text.trim().is_empty() => text,
            _ => strip_html_tags(html),
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, String> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!("Invalid URL (expected http:// or https://): {}", url));
        }
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| format!("Read body: {}", e))?;
        let body = body.trim_start_matches('\u{FEFF}');

        let text = if looks_like_html(body) {
            self.html_to_text(body)
        } else {
            body.to_string()
        };
        Ok(truncate_chars(text, self.max_result_chars))
    }
}

#[async_trait]
impl Tool for RequestsGetTool {
    fn name(&self) -> &str {
        "requests_get"
    }

    fn description(&self) -> &str {
        "A portal to the internet. Use this when you need to get specific content from a website. \
         Input should be a url (i.e. https://www.google.com). The output will be the text response of the GET request."
    }

    async fn run(&self, input: &str) -> Result<String, String> {
        let url = input.trim().trim_matches('"');
        tracing::info!(url = %url, "requests_get fetch");
        self.fetch(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn strips_tags_and_truncates() {
        assert_eq!(strip_html_tags("<p>hello <b>world</b></p>"), "hello world");
        assert_eq!(truncate_chars("abcdef".into(), 3), "abc\n...[truncated]");
        assert!(looks_like_html("<!DOCTYPE html><html></html>"));
        assert!(!looks_like_html("{\"a\": 1}"));
    }

    #[tokio::test]
    async fn fetches_plain_text_and_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/plain"))
            .respond_with(ResponseTemplate::new(200).set_body_string("just text"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<!DOCTYPE html><html><head><title>t</title></head><body><p>Grapes</p></body></html>",
            ))
            .mount(&server)
            .await;

        let tool = RequestsGetTool::new(5, 2000);
        let plain = tool.run(&format!("{}/plain", server.uri())).await.unwrap();
        assert_eq!(plain, "just text");
        let page = tool.run(&format!("{}/page", server.uri())).await.unwrap();
        assert!(page.contains("Grapes"));
        assert!(!page.contains("<p>"));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let tool = RequestsGetTool::new(5, 2000);
        let err = tool.run(&format!("{}/missing", server.uri())).await.unwrap_err();
        assert!(err.contains("404"));
        assert!(tool.run("ftp://nope").await.is_err());
    }
}
