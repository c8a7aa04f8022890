//! API 模块
//!
//! 负责把外部请求转换为流程调用，并把结果转换为响应

pub mod analyze;

// 重新导出常用类型
pub use analyze::{dispatch, handle_json, handle_request, AnalyzeRequest, AnalyzeResponse, ApiReply, ErrorBody};
