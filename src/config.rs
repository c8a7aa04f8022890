use crate::error::{AppResult, ConfigError};
use crate::orchestrator::RetryPolicy;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- 调度器 ---
    /// 两次调用之间的最小间隔（毫秒）
    pub min_delay_ms: u64,
    /// 限流后的最大重试次数
    pub max_retries: u32,
    /// 重试基础等待（毫秒），按重试次数线性放大
    pub retry_delay_ms: u64,
    // --- 批处理 ---
    /// 每批并发的条目数
    pub batch_size: usize,
    /// 批与批之间的停顿（毫秒）
    pub batch_pause_ms: u64,
    /// 调用方等待上限（毫秒）
    pub request_timeout_ms: u64,
    // --- 生成参数 ---
    pub solution_candidates: usize,
    pub niches_per_category: usize,
    pub problems_per_request: usize,
    pub categories: Vec<String>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_api_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            llm_model_name: "gemini-2.0-flash".to_string(),
            min_delay_ms: 1000,
            max_retries: 3,
            retry_delay_ms: 2000,
            batch_size: 2,
            batch_pause_ms: 1000,
            request_timeout_ms: 60_000,
            solution_candidates: 3,
            niches_per_category: 2,
            problems_per_request: 5,
            categories: ["Technology", "Health", "Education", "Business", "Lifestyle"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            verbose_logging: false,
        }
    }
}

/// 配置文件内容，所有字段可选，缺省时沿用默认值
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    llm_api_key: Option<String>,
    llm_api_base_url: Option<String>,
    llm_model_name: Option<String>,
    min_delay_ms: Option<u64>,
    max_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    batch_size: Option<usize>,
    batch_pause_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    solution_candidates: Option<usize>,
    niches_per_category: Option<usize>,
    problems_per_request: Option<usize>,
    categories: Option<Vec<String>>,
    verbose_logging: Option<bool>,
}

impl Config {
    /// 先读 `NICHEVAULT_CONFIG` 指向的 TOML 文件（如果有），再用环境变量覆盖
    pub fn load() -> AppResult<Self> {
        let base = match std::env::var("NICHEVAULT_CONFIG") {
            Ok(path) => Self::from_toml_file(&path)?,
            Err(_) => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载配置
    pub fn from_toml_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            crate::error::AppError::Config(ConfigError::ParseFailed { message, .. }) => {
                ConfigError::ParseFailed {
                    path: path.display().to_string(),
                    message,
                }
                .into()
            }
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| ConfigError::ParseFailed {
            path: String::new(),
            message: e.to_string(),
        })?;
        let default = Self::default();
        Ok(Self {
            llm_api_key: file.llm_api_key.unwrap_or(default.llm_api_key),
            llm_api_base_url: file.llm_api_base_url.unwrap_or(default.llm_api_base_url),
            llm_model_name: file.llm_model_name.unwrap_or(default.llm_model_name),
            min_delay_ms: file.min_delay_ms.unwrap_or(default.min_delay_ms),
            max_retries: file.max_retries.unwrap_or(default.max_retries),
            retry_delay_ms: file.retry_delay_ms.unwrap_or(default.retry_delay_ms),
            batch_size: file.batch_size.unwrap_or(default.batch_size),
            batch_pause_ms: file.batch_pause_ms.unwrap_or(default.batch_pause_ms),
            request_timeout_ms: file.request_timeout_ms.unwrap_or(default.request_timeout_ms),
            solution_candidates: file.solution_candidates.unwrap_or(default.solution_candidates),
            niches_per_category: file.niches_per_category.unwrap_or(default.niches_per_category),
            problems_per_request: file.problems_per_request.unwrap_or(default.problems_per_request),
            categories: file.categories.unwrap_or(default.categories),
            verbose_logging: file.verbose_logging.unwrap_or(default.verbose_logging),
        })
    }

    fn with_env_overrides(self) -> Self {
        Self {
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(self.llm_model_name),
            min_delay_ms: std::env::var("MIN_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.min_delay_ms),
            max_retries: std::env::var("MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(self.max_retries),
            retry_delay_ms: std::env::var("RETRY_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.retry_delay_ms),
            batch_size: std::env::var("BATCH_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(self.batch_size),
            batch_pause_ms: std::env::var("BATCH_PAUSE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.batch_pause_ms),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.request_timeout_ms),
            solution_candidates: std::env::var("SOLUTION_CANDIDATES").ok().and_then(|v| v.parse().ok()).unwrap_or(self.solution_candidates),
            niches_per_category: std::env::var("NICHES_PER_CATEGORY").ok().and_then(|v| v.parse().ok()).unwrap_or(self.niches_per_category),
            problems_per_request: std::env::var("PROBLEMS_PER_REQUEST").ok().and_then(|v| v.parse().ok()).unwrap_or(self.problems_per_request),
            categories: std::env::var("NICHE_CATEGORIES")
                .ok()
                .map(|v| v.split(',').map(|c| c.trim().to_string()).filter(|c| !c.is_empty()).collect::<Vec<_>>())
                .filter(|c| !c.is_empty())
                .unwrap_or(self.categories),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(self.verbose_logging),
        }
    }

    /// 调度器使用的重试策略
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::linear(self.max_retries, Duration::from_millis(self.retry_delay_ms))
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_pacing_constants() {
        let config = Config::default();
        assert_eq!(config.min_delay(), Duration::from_millis(1000));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_ms, 2000);
        assert_eq!(config.batch_pause(), Duration::from_millis(1000));
        assert_eq!(config.categories.len(), 5);
    }

    #[test]
    fn test_toml_overlays_defaults() {
        let config = Config::from_toml_str(
            r#"
            llm_model_name = "gemini-pro"
            batch_size = 4
            categories = ["Finance"]
            "#,
        )
        .unwrap();

        assert_eq!(config.llm_model_name, "gemini-pro");
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.categories, vec!["Finance".to_string()]);
        // 未出现的字段保持默认
        assert_eq!(config.min_delay_ms, 1000);
    }

    #[test]
    fn test_toml_parse_error_is_config_error() {
        let err = Config::from_toml_str("batch_size = \"many\"").unwrap_err();
        assert!(matches!(err, crate::error::AppError::Config(ConfigError::ParseFailed { .. })));
    }
}
