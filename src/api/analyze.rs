//! 请求分发 - 边界层
//!
//! 接收带 `action` 的请求，与超时赛跑，把结果或错误转换成
//! `(状态码, JSON)`。错误体统一为 `{error, userMessage}`。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult, RequestError};
use crate::models::{Niche, Problem};
use crate::workflow::AnalyzeFlow;

/// 请求体
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AnalyzeRequest {
    GetNiches {
        #[serde(default)]
        exclude_niches: Vec<String>,
        #[serde(default)]
        batch: u32,
    },
    GetProblems {
        niche: Option<String>,
    },
    GetMoreProblems {
        niche: Option<String>,
        #[serde(default)]
        current_problems: Vec<Problem>,
    },
    GetSolution {
        niche: Option<String>,
        problem: Option<String>,
    },
    ExpandSolution {
        niche: Option<String>,
        problem: Option<String>,
        current_solution: Option<String>,
    },
}

impl AnalyzeRequest {
    pub fn action(&self) -> &'static str {
        match self {
            AnalyzeRequest::GetNiches { .. } => "getNiches",
            AnalyzeRequest::GetProblems { .. } => "getProblems",
            AnalyzeRequest::GetMoreProblems { .. } => "getMoreProblems",
            AnalyzeRequest::GetSolution { .. } => "getSolution",
            AnalyzeRequest::ExpandSolution { .. } => "expandSolution",
        }
    }
}

const NO_NEW_PROBLEMS_MESSAGE: &str =
    "No new problems were found for this niche. Please try again in a moment.";

/// 成功响应体
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnalyzeResponse {
    Niches {
        categories: Vec<String>,
        niches: Vec<Niche>,
    },
    Problems {
        problems: Vec<Problem>,
        /// 追加痛点没有新结果时给用户的说明
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Solution {
        solution: String,
    },
    #[serde(rename_all = "camelCase")]
    Expansion {
        additional_content: String,
    },
}

/// 错误响应体
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(rename = "userMessage")]
    pub user_message: String,
}

/// 边界层的返回值
#[derive(Debug, Clone)]
pub struct ApiReply {
    pub status: u16,
    pub body: JsonValue,
}

impl ApiReply {
    fn ok(response: &AnalyzeResponse) -> Self {
        match serde_json::to_value(response) {
            Ok(body) => Self { status: 200, body },
            Err(e) => Self::from_error(&AppError::Other(format!("响应序列化失败: {}", e))),
        }
    }

    /// 把错误映射成状态码和提示信息
    pub fn from_error(err: &AppError) -> Self {
        let (status, user_message) = match err {
            AppError::Timeout { .. } => (504, "Request took too long. Please try again.".to_string()),
            AppError::Request(e) => (400, format!("Invalid request: {}", e)),
            e if e.is_rate_limited() => (
                429,
                "The AI service is busy right now. Please wait a moment and try again.".to_string(),
            ),
            _ => (500, "An unexpected error occurred. Please try again.".to_string()),
        };

        let body = ErrorBody {
            error: err.to_string(),
            user_message,
        };
        Self {
            status,
            body: json!(body),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn required(value: Option<String>, field: &'static str) -> AppResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::missing_field(field))
}

/// 执行请求对应的流程
pub async fn dispatch(flow: &AnalyzeFlow, request: AnalyzeRequest) -> AppResult<AnalyzeResponse> {
    match request {
        AnalyzeRequest::GetNiches { exclude_niches, batch } => {
            let report = flow.get_niches(&exclude_niches, batch).await;
            Ok(AnalyzeResponse::Niches {
                categories: report.categories,
                niches: report.niches,
            })
        }
        AnalyzeRequest::GetProblems { niche } => {
            let niche = required(niche, "niche")?;
            let problems = flow.get_problems(&niche).await?;
            Ok(AnalyzeResponse::Problems { problems, message: None })
        }
        AnalyzeRequest::GetMoreProblems { niche, current_problems } => {
            let niche = required(niche, "niche")?;
            let problems = flow.get_more_problems(&niche, &current_problems).await?;
            let message = problems
                .is_empty()
                .then(|| NO_NEW_PROBLEMS_MESSAGE.to_string());
            Ok(AnalyzeResponse::Problems { problems, message })
        }
        AnalyzeRequest::GetSolution { niche, problem } => {
            let niche = required(niche, "niche")?;
            let problem = required(problem, "problem")?;
            let solution = flow.get_solution(&niche, &problem).await?;
            Ok(AnalyzeResponse::Solution { solution })
        }
        AnalyzeRequest::ExpandSolution { niche, problem, current_solution } => {
            let niche = required(niche, "niche")?;
            let problem = required(problem, "problem")?;
            let current_solution = required(current_solution, "currentSolution")?;
            let additional_content = flow.expand_solution(&niche, &problem, &current_solution).await?;
            Ok(AnalyzeResponse::Expansion { additional_content })
        }
    }
}

/// 处理一次请求：与超时赛跑
///
/// 超时只是不再等待，已经开始的上游调用会在后台完成。
pub async fn handle_request(flow: &AnalyzeFlow, request: AnalyzeRequest, timeout: Duration) -> ApiReply {
    let action = request.action();
    info!("📨 收到请求: {}", action);

    let result = match tokio::time::timeout(timeout, dispatch(flow, request)).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout {
            waited_ms: timeout.as_millis() as u64,
        }),
    };

    match result {
        Ok(response) => ApiReply::ok(&response),
        Err(e) => {
            if e.is_timeout() {
                warn!("⏰ 请求 {} 超时 ({}ms)", action, timeout.as_millis());
            } else {
                error!("❌ 请求 {} 失败: {}", action, e);
            }
            ApiReply::from_error(&e)
        }
    }
}

/// 处理原始 JSON 请求体
pub async fn handle_json(flow: &AnalyzeFlow, body: &str, timeout: Duration) -> ApiReply {
    match serde_json::from_str::<AnalyzeRequest>(body) {
        Ok(request) => handle_request(flow, request, timeout).await,
        Err(e) => {
            warn!("⚠️ 无法解析请求体: {}", e);
            ApiReply::from_error(&AppError::Request(RequestError::Malformed(e.to_string())))
        }
    }
}
