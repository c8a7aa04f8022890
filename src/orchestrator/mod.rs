//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责对受限流保护的上游调用进行排队、重试和分批，
//! 是整个系统的"节流中心"。
//!
//! ## 模块划分
//!
//! ### `queue_scheduler` - 排队调度器
//! - 单个后台任务串行执行所有上游调用
//! - 保证相邻调用之间的最小间隔
//! - 限流错误按重试策略退避重试
//!
//! ### `batch_processor` - 批量处理器
//! - 将条目切分为固定大小的批次
//! - 批内并发，批间固定停顿
//!
//! ### `retry_policy` - 重试策略
//! - 最大重试次数、基础等待、退避方式、可重试判定
//!
//! ## 层次关系
//!
//! ```text
//! workflow::AnalyzeFlow (一次请求)
//!     ↓
//! batch_processor (处理 Vec<条目>)
//!     ↓
//! queue_scheduler (处理单个调用：间隔 + 重试)
//!     ↓
//! services::LlmService (上游能力)
//! ```

pub mod batch_processor;
pub mod queue_scheduler;
pub mod retry_policy;

// 重新导出主要类型
pub use batch_processor::{run_batches, BatchRunner, DEFAULT_BATCH_PAUSE};
pub use queue_scheduler::QueueScheduler;
pub use retry_policy::{Backoff, RetryPolicy};
