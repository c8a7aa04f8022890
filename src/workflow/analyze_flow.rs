//! 分析流程 - 流程层
//!
//! 核心职责：定义每一种请求的完整处理流程
//!
//! - 细分市场：按类别分批 → 排队调用 → 清洗 → 排除 → 去重
//! - 痛点：排队调用 → 清洗 → 去重
//! - 方案：分批生成多个候选 → 清洗 → 选出最佳
//! - 展开方案：排队调用 → 去 HTML

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{Niche, NicheList, Problem, ProblemList, ResponseShape, REQUIRED_SECTIONS};
use crate::orchestrator::{BatchRunner, QueueScheduler};
use crate::services::{
    dedupe, exclude_by_identity, prompts, sanitize_and_parse, sanitize_solution,
    select_best_candidate, strip_html, Generator,
};
use crate::utils::logging::truncate_text;

/// 细分市场结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NicheReport {
    pub categories: Vec<String>,
    pub niches: Vec<Niche>,
}

/// 分析流程
///
/// - 不直接访问上游，所有调用都经过 [`QueueScheduler`]
/// - 多条目的请求交给 [`BatchRunner`] 分批
/// - 模型输出一律经过清洗
pub struct AnalyzeFlow {
    generator: Arc<dyn Generator>,
    scheduler: QueueScheduler,
    batch_runner: BatchRunner,
    categories: Vec<String>,
    niches_per_category: usize,
    problems_per_request: usize,
    solution_candidates: usize,
}

impl AnalyzeFlow {
    /// 创建新的分析流程
    pub fn new(config: &Config, generator: Arc<dyn Generator>, scheduler: QueueScheduler) -> Self {
        Self {
            generator,
            scheduler,
            batch_runner: BatchRunner::new(config.batch_size, config.batch_pause()),
            categories: config.categories.clone(),
            niches_per_category: config.niches_per_category,
            problems_per_request: config.problems_per_request,
            solution_candidates: config.solution_candidates.max(1),
        }
    }

    pub fn scheduler(&self) -> &QueueScheduler {
        &self.scheduler
    }

    /// 经过调度器调用上游
    async fn generate(&self, prompt: String) -> AppResult<String> {
        let generator = Arc::clone(&self.generator);
        self.scheduler
            .submit(move || {
                let generator = Arc::clone(&generator);
                let prompt = prompt.clone();
                async move { generator.generate(&prompt).await }
            })
            .await
    }

    /// 生成细分市场
    ///
    /// 每个类别一次调用；单个类别失败时用兜底结果代替，不影响其他类别。
    pub async fn get_niches(&self, exclude: &[String], batch: u32) -> NicheReport {
        info!("🔍 正在生成细分市场，共 {} 个类别", self.categories.len());

        let lists = self
            .batch_runner
            .run(self.categories.clone(), |category: String| {
                let prompt = prompts::niches_prompt(&category, self.niches_per_category, exclude, batch);
                async move {
                    match self.generate(prompt).await {
                        Ok(raw) => sanitize_and_parse::<NicheList>(&raw),
                        Err(e) => {
                            warn!("⚠️ 类别 {} 生成失败，使用兜底结果: {}", category, e);
                            NicheList::fallback()
                        }
                    }
                }
            })
            .await;

        let all: Vec<Niche> = lists.into_iter().flat_map(|list| list.niches).collect();
        let mut niches = dedupe(exclude_by_identity(all, exclude));
        if niches.is_empty() {
            niches = NicheList::fallback().niches;
        }

        info!("✓ 得到 {} 个细分市场", niches.len());

        NicheReport {
            categories: self.categories.clone(),
            niches,
        }
    }

    /// 生成某个细分市场的痛点
    pub async fn get_problems(&self, niche: &str) -> AppResult<Vec<Problem>> {
        info!("🔍 正在生成痛点: {}", niche);

        let raw = self
            .generate(prompts::problems_prompt(niche, self.problems_per_request))
            .await?;
        let problems = dedupe(sanitize_and_parse::<ProblemList>(&raw).problems);

        info!("✓ 得到 {} 个痛点", problems.len());
        Ok(problems)
    }

    /// 在已有痛点之外再生成一些，结果不包含已有标题
    pub async fn get_more_problems(&self, niche: &str, current: &[Problem]) -> AppResult<Vec<Problem>> {
        let current_titles: Vec<String> = current.iter().map(|p| p.title.clone()).collect();
        info!("🔍 正在追加痛点: {} (已有 {} 个)", niche, current_titles.len());

        let raw = self
            .generate(prompts::more_problems_prompt(
                niche,
                self.problems_per_request,
                &current_titles,
            ))
            .await?;
        let parsed = sanitize_and_parse::<ProblemList>(&raw).problems;
        let parsed_count = parsed.len();
        let problems = dedupe(exclude_by_identity(parsed, &current_titles));

        if problems.is_empty() {
            warn!(
                "⚠️ 追加痛点没有新结果: {} (模型返回 {} 个，均已存在)",
                niche, parsed_count
            );
        } else {
            info!("✓ 新增 {} 个痛点", problems.len());
        }
        Ok(problems)
    }

    /// 生成方案：多个候选中选出包含全部章节且最长的一个
    ///
    /// 所有候选都失败时返回最后一个错误。
    pub async fn get_solution(&self, niche: &str, problem: &str) -> AppResult<String> {
        info!(
            "🤖 正在生成方案 ({} 个候选): {} / {}",
            self.solution_candidates, niche, problem
        );

        let prompt = prompts::solution_prompt(niche, problem);
        let attempts = self
            .batch_runner
            .run((0..self.solution_candidates).collect(), |index: usize| {
                let prompt = prompt.clone();
                async move {
                    let result = self.generate(prompt).await.map(|raw| sanitize_solution(&raw));
                    if let Err(e) = &result {
                        warn!("⚠️ 方案候选 {} 生成失败: {}", index + 1, e);
                    }
                    result
                }
            })
            .await;

        let mut candidates = Vec::new();
        let mut last_error = None;
        for attempt in attempts {
            match attempt {
                Ok(text) => candidates.push(text),
                Err(e) => last_error = Some(e),
            }
        }

        match select_best_candidate(&candidates, &REQUIRED_SECTIONS) {
            Some(best) => {
                info!("✓ 方案已生成 ({} 字符)", best.len());
                Ok(best.to_string())
            }
            None => Err(last_error.unwrap_or_else(|| AppError::Other("没有生成任何方案候选".to_string()))),
        }
    }

    /// 在已有方案基础上继续展开，返回新增内容
    pub async fn expand_solution(
        &self,
        niche: &str,
        problem: &str,
        current_solution: &str,
    ) -> AppResult<String> {
        info!(
            "🤖 正在展开方案: {} / {} (现有内容: {})",
            niche,
            problem,
            truncate_text(current_solution, 40)
        );

        let raw = self
            .generate(prompts::expand_solution_prompt(niche, problem, current_solution))
            .await?;
        Ok(strip_html(&raw).trim().to_string())
    }
}
