//! # NicheVault
//!
//! 细分市场 → 痛点 → 方案指南的生成后端，核心是对受限流保护的
//! 生成式 AI 服务进行排队、重试、分批调用，并清洗不可靠的模型输出。
//!
//! ## 架构设计
//!
//! ### ① 业务能力层（Services）
//! - `services/llm_service` - `Generator` 能力，唯一访问上游的地方
//! - `services/sanitizer` - 模型输出清洗、去重、最佳候选选择
//! - `services/prompts` - 提示词构建
//!
//! ### ② 编排层（Orchestration）
//! - `orchestrator/queue_scheduler` - 串行排队 + 最小间隔 + 限流重试
//! - `orchestrator/batch_processor` - 分批并发 + 批间停顿
//! - `orchestrator/retry_policy` - 参数化重试策略
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/analyze_flow` - 每种请求的完整处理流程
//!
//! ### ④ 边界层（API）
//! - `api/analyze` - 按 `action` 分发请求，超时赛跑，错误映射
//!
//! ## 模块结构

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use api::{AnalyzeRequest, AnalyzeResponse, ApiReply};
pub use app::App;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use orchestrator::{BatchRunner, QueueScheduler, RetryPolicy};
pub use services::{Generator, LlmService};
pub use workflow::{AnalyzeFlow, NicheReport};
