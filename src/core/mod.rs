//! 核心编排层：状态机、熔断、重试、错误与恢复建议、研究编排器

pub mod breaker;
pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod retry;
pub mod shutdown;
pub mod state;

pub use breaker::{BreakerState, CircuitBreaker, CircuitBreakerState};
pub use error::{OrchestrationError, ValidationLayer};
pub use orchestrator::{MrdAgent, SufficiencyReport};
pub use recovery::RecoveryEngine;
pub use retry::{RetryExecutor, RetryPolicy, TaskInvoker};
pub use shutdown::cancel_on_ctrl_c;
pub use state::{can_transition, transition, AgentState};
