//! 应用入口
//!
//! 负责组装各层：配置 → LLM 服务 → 调度器 → 流程，
//! 然后把一条请求交给边界层处理。

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tracing::info;

use crate::api::{self, ApiReply};
use crate::config::Config;
use crate::orchestrator::QueueScheduler;
use crate::services::{Generator, LlmService};
use crate::utils::logging::log_startup;
use crate::workflow::AnalyzeFlow;

/// 应用主结构
pub struct App {
    config: Config,
    flow: AnalyzeFlow,
}

impl App {
    /// 使用真实的 LLM 服务初始化应用
    pub fn initialize(config: Config) -> Result<Self> {
        if config.llm_api_key.is_empty() {
            anyhow::bail!("未设置 LLM_API_KEY");
        }

        let generator: Arc<dyn Generator> = Arc::new(LlmService::new(&config));
        Ok(Self::with_generator(config, generator))
    }

    /// 使用指定的生成能力初始化应用
    pub fn with_generator(config: Config, generator: Arc<dyn Generator>) -> Self {
        log_startup(&config.llm_model_name, config.min_delay_ms, config.batch_size);

        let scheduler = QueueScheduler::new(config.min_delay(), config.retry_policy());
        let flow = AnalyzeFlow::new(&config, generator, scheduler);

        Self { config, flow }
    }

    pub fn flow(&self) -> &AnalyzeFlow {
        &self.flow
    }

    /// 处理一条 JSON 请求
    pub async fn handle(&self, body: &str) -> ApiReply {
        api::handle_json(&self.flow, body, self.config.request_timeout()).await
    }

    /// 运行应用主逻辑
    ///
    /// 请求体取第一个命令行参数，没有时从标准输入读取；响应 JSON 输出到标准输出。
    pub async fn run(&self) -> Result<ApiReply> {
        let body = match std::env::args().nth(1) {
            Some(arg) => arg,
            None => {
                let mut input = String::new();
                tokio::io::stdin()
                    .read_to_string(&mut input)
                    .await
                    .context("无法读取标准输入")?;
                input
            }
        };

        let reply = self.handle(&body).await;
        info!("📤 响应状态码: {}", reply.status);

        let rendered = serde_json::to_string_pretty(&reply.body).context("无法序列化响应")?;
        println!("{}", rendered);

        Ok(reply)
    }
}
