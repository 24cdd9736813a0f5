//! 核心层：错误类型、会话存储、错误恢复

pub mod error;
pub mod recovery;
pub mod session_store;

pub use error::AgentError;
pub use recovery::{run_with_recovery, run_with_recovery_observed, RecoveryOutcome};
pub use session_store::{SessionStore, SharedExecutor};
