//! LLM 服务 - 业务能力层
//!
//! 只负责"给一段提示词，拿回一段文本"的能力，不关心节流和解析
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Gemini 的 OpenAI 兼容端点）

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{looks_rate_limited, AppError, AppResult, LlmError};

const SYSTEM_MESSAGE: &str = "You are a market research assistant for digital product creators. \
    When asked for JSON, reply with a single JSON object and nothing else.";

/// 上游用来表示限流的 `type` / `code` 取值（忽略大小写）
const THROTTLE_CODES: [&str; 5] = [
    "rate_limit_exceeded",
    "rate_limit_error",
    "too_many_requests",
    "resource_exhausted",
    "requests",
];

/// 文本生成能力
///
/// 限流失败必须以 [`LlmError::RateLimited`] 返回，调度器据此决定是否重试。
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> AppResult<String>;
}

/// LLM 服务
///
/// 职责：
/// - 调用 LLM API 生成文本
/// - 把上游错误归类为限流 / 其他失败
/// - 不做节流、不做重试、不解析内容
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        // 客户端只尝试一次，重试统一交给调度器
        let client = Client::with_config(openai_config).with_backoff(single_attempt());

        Self {
            client,
            model_name: config.llm_model_name.clone(),
            temperature: 0.8,
            max_tokens: 4096,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（字符串）
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> AppResult<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(|e| LlmError::RequestBuildFailed(e.to_string()))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| LlmError::RequestBuildFailed(e.to_string()))?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| LlmError::RequestBuildFailed(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            classify_failure(&self.model_name, e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl Generator for LlmService {
    async fn generate(&self, prompt: &str) -> AppResult<String> {
        self.send_to_llm(prompt, Some(SYSTEM_MESSAGE)).await
    }
}

/// async-openai 默认会对 429 / 5xx 自行退避重试，最长 15 分钟
fn single_attempt() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build()
}

fn is_throttle_code(value: Option<&str>) -> bool {
    value.is_some_and(|v| THROTTLE_CODES.iter().any(|code| v.eq_ignore_ascii_case(code)))
}

/// 把上游错误归类：限流可重试，其余直接失败
fn classify_failure(model: &str, error: OpenAIError) -> AppError {
    let throttled = match &error {
        OpenAIError::ApiError(api) => {
            is_throttle_code(api.r#type.as_deref())
                || is_throttle_code(api.code.as_deref())
                || looks_rate_limited(&api.message)
        }
        other => looks_rate_limited(&other.to_string()),
    };

    if throttled {
        AppError::rate_limited(model, error.to_string())
    } else {
        AppError::llm_api_failed(model, error)
    }
}
