//! 会话存储：session key -> AgentExecutor
//!
//! moka 有界缓存（容量 + 空闲过期）；get_with 保证同一 key 并发首次访问只构造一个执行器。
//! 每个执行器包在 tokio Mutex 中，同 key 的请求在整轮推理（含恢复重试）期间串行。

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tokio::sync::Mutex;

use crate::react::{AgentExecutor, Planner};
use crate::tools::ToolExecutor;

pub type SharedExecutor = Arc<Mutex<AgentExecutor>>;

#[derive(Clone)]
pub struct SessionStore {
    cache: Cache<String, SharedExecutor>,
    planner: Arc<Planner>,
    tools: Arc<ToolExecutor>,
    max_steps: usize,
    window: usize,
}

impl SessionStore {
    pub fn new(
        planner: Arc<Planner>,
        tools: Arc<ToolExecutor>,
        max_steps: usize,
        window: usize,
        max_sessions: u64,
        idle_secs: u64,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_sessions.max(1))
            .time_to_idle(Duration::from_secs(idle_secs.max(1)))
            .build();
        Self {
            cache,
            planner,
            tools,
            max_steps,
            window,
        }
    }

    /// 取得 key 对应的执行器，不存在时创建
    pub fn get_or_create(&self, key: &str) -> SharedExecutor {
        self.cache.get_with(key.to_string(), || {
            tracing::info!(session = %key, "creating agent executor");
            Arc::new(Mutex::new(AgentExecutor::new(
                key,
                self.planner.clone(),
                self.tools.clone(),
                self.max_steps,
                self.window,
            )))
        })
    }

    pub fn get(&self, key: &str) -> Option<SharedExecutor> {
        self.cache.get(key)
    }

    /// 当前会话数（会先处理挂起的淘汰）
    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::tools::ToolRegistry;

    fn store(max_sessions: u64) -> SessionStore {
        let planner = Arc::new(Planner::new(Arc::new(MockLlmClient), "system"));
        let tools = Arc::new(ToolExecutor::new(ToolRegistry::new(), 5));
        SessionStore::new(planner, tools, 5, 10, max_sessions, 3600)
    }

    #[test]
    fn same_key_reuses_executor() {
        let store = store(10);
        let a = store.get_or_create("s1");
        let b = store.get_or_create("s1");
        let c = store.get_or_create("s2");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(store.len(), 2);
        assert!(store.get("missing").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_use_creates_one_executor() {
        let store = store(10);
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.get_or_create("fresh") })
            })
            .collect();
        let mut executors = Vec::new();
        for h in handles {
            executors.push(h.await.unwrap());
        }
        assert!(executors.iter().all(|e| Arc::ptr_eq(e, &executors[0])));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn capacity_bounds_sessions() {
        let store = store(2);
        for key in ["a", "b", "c", "d"] {
            store.get_or_create(key);
        }
        assert!(store.len() <= 2);
    }

    #[tokio::test]
    async fn memory_is_visible_through_reused_handle() {
        let store = store(10);
        {
            let exec = store.get_or_create("s1");
            let mut guard = exec.lock().await;
            guard.run("hello").await.unwrap();
        }
        let exec = store.get_or_create("s1");
        let guard = exec.lock().await;
        assert_eq!(guard.memory().len(), 1);
        assert_eq!(guard.session_key(), "s1");
    }
}
