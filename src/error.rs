use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 请求参数错误
    #[error("请求错误: {0}")]
    Request(#[from] RequestError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 调用方等待超时（底层调用不会被中断）
    #[error("Request timeout")]
    Timeout { waited_ms: u64 },
    /// 调度器的排队任务已经退出
    #[error("调度器已关闭")]
    SchedulerClosed,
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// 上游限流（HTTP 429），可重试
    #[error("LLM 请求被限流 (模型: {model}): {message}")]
    RateLimited { model: String, message: String },
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 构建请求失败
    #[error("LLM 请求构建失败: {0}")]
    RequestBuildFailed(String),
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

/// 请求参数错误
#[derive(Debug, Error)]
pub enum RequestError {
    /// 请求体不是合法 JSON 或 action 未知
    #[error("无法解析请求: {0}")]
    Malformed(String),
    /// 缺少必需参数
    #[error("缺少参数: {field}")]
    MissingField { field: &'static str },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {message}")]
    ReadFailed { path: String, message: String },
    /// 配置文件解析失败
    #[error("配置文件解析失败 ({path}): {message}")]
    ParseFailed { path: String, message: String },
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Request(RequestError::Malformed(err.to_string()))
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建LLM API调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 创建限流错误
    pub fn rate_limited(model: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Llm(LlmError::RateLimited {
            model: model.into(),
            message: message.into(),
        })
    }

    /// 缺少必需参数
    pub fn missing_field(field: &'static str) -> Self {
        AppError::Request(RequestError::MissingField { field })
    }

    /// 是否为上游限流错误（默认的重试判定）
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::Llm(LlmError::RateLimited { .. }))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::Timeout { .. })
    }
}

/// 判断一段上游错误描述是否表示限流
pub fn looks_rate_limited(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("too many requests")
        || lower.contains("resource_exhausted")
        || lower.contains("resource has been exhausted")
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_detection() {
        assert!(looks_rate_limited("http error: 429 Too Many Requests"));
        assert!(looks_rate_limited("Rate limit reached for requests"));
        assert!(looks_rate_limited("Resource has been exhausted (e.g. check quota)."));
        assert!(looks_rate_limited("status: RESOURCE_EXHAUSTED"));
        assert!(!looks_rate_limited("connection reset by peer"));
    }

    #[test]
    fn test_is_rate_limited_only_for_throttling() {
        assert!(AppError::rate_limited("gemini", "429").is_rate_limited());
        assert!(!AppError::missing_field("niche").is_rate_limited());
        assert!(!AppError::Timeout { waited_ms: 10 }.is_rate_limited());
    }

    #[test]
    fn test_timeout_display_is_stable() {
        // 边界层依赖这个文案
        assert_eq!(AppError::Timeout { waited_ms: 5 }.to_string(), "Request timeout");
    }
}
