//! WineDB 工具：远程键值库查询
//!
//! GET {host}/kv/{key}，Basic Auth（user 缺省 root）；404 视为「无此条目」而非工具失败。
//! 仅在 [tools.wine_db] 的 host 与 password 均配置时注册。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};

use crate::tools::Tool;

pub struct WineDbTool {
    client: Client,
    base: Url,
    user: String,
    password: String,
}

impl WineDbTool {
    pub fn new(host: &str, user: Option<&str>, password: &str, timeout_secs: u64) -> Result<Self, String> {
        let base = Url::parse(host).map_err(|e| format!("Invalid wine_db host '{}': {}", host, e))?;
        if base.cannot_be_a_base() {
            return Err(format!("Invalid wine_db host '{}'", host));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Ok(Self {
            client,
            base,
            user: user.unwrap_or("root").to_string(),
            password: password.to_string(),
        })
    }

    fn key_url(&self, key: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("kv").push(key);
        }
        url
    }
}

#[async_trait]
impl Tool for WineDbTool {
    fn name(&self) -> &str {
        "wine_db"
    }

    fn description(&self) -> &str {
        "Look up an entry in the wine database (a remote key-value store). \
         Input should be the exact key, for example a wine name. The output is the stored value."
    }

    async fn run(&self, input: &str) -> Result<String, String> {
        let key = input.trim();
        if key.is_empty() {
            return Err("Missing key".to_string());
        }
        let resp = self
            .client
            .get(self.key_url(key))
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await
            .map_err(|e| format!("wine_db request failed: {}", e))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(format!("No entry found for '{}'", key)),
            s if s.is_success() => resp
                .text()
                .await
                .map_err(|e| format!("wine_db read body: {}", e)),
            s => Err(format!("wine_db returned HTTP {}", s)),
        }
    }
}
