//! 模型输出清洗 - 业务能力层
//!
//! 把不可靠的模型文本转换成可信的结构化结果。
//! 这里的函数从不向调用方返回错误：解析失败一律替换为固定的兜底值。

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{Identified, ResponseShape, FALLBACK_SOLUTION};
use crate::utils::logging::truncate_text;

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```[A-Za-z]*").expect("valid fence regex"))
}

fn newline_regex() -> &'static Regex {
    static NEWLINES: OnceLock<Regex> = OnceLock::new();
    NEWLINES.get_or_init(|| Regex::new(r"[ \t]*[\r\n]+[ \t]*").expect("valid newline regex"))
}

fn html_tag_regex() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag regex"))
}

/// 去掉代码块标记，把换行折叠成单个空格
pub fn clean_model_text(raw: &str) -> String {
    let without_fences = fence_regex().replace_all(raw, "");
    newline_regex()
        .replace_all(&without_fences, " ")
        .trim()
        .to_string()
}

/// 清洗并解析模型输出，失败时返回 `S::fallback()`
pub fn sanitize_and_parse<S: ResponseShape>(raw: &str) -> S {
    match try_parse::<S>(raw) {
        Ok(parsed) => parsed,
        Err(reason) => {
            warn!(
                "⚠️ 无法解析模型输出 (期望键: {}): {}，使用兜底结果",
                S::KEY,
                reason
            );
            debug!("原始输出: {}", truncate_text(raw, 200));
            S::fallback()
        }
    }
}

fn try_parse<S: ResponseShape>(raw: &str) -> Result<S, String> {
    let cleaned = clean_model_text(raw);

    let value = match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => value,
        // 模型有时会在 JSON 前后加说明文字
        Err(e) => embedded_object(&cleaned)
            .and_then(|inner| serde_json::from_str::<Value>(inner).ok())
            .ok_or_else(|| format!("不是合法 JSON: {}", e))?,
    };

    if !value.get(S::KEY).map_or(false, Value::is_array) {
        return Err(format!("缺少数组字段 `{}`", S::KEY));
    }

    let parsed: S = serde_json::from_value(value).map_err(|e| format!("结构不匹配: {}", e))?;
    if parsed.is_empty() {
        return Err(format!("`{}` 为空", S::KEY));
    }

    Ok(parsed)
}

/// 第一个 `{` 到最后一个 `}` 之间的片段
fn embedded_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// 按标识字段去重，保留首次出现的条目及其顺序
pub fn dedupe<T: Identified>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.identity().to_string()))
        .collect()
}

/// 去掉标识在 `excluded` 中的条目
pub fn exclude_by_identity<T: Identified>(items: Vec<T>, excluded: &[String]) -> Vec<T> {
    if excluded.is_empty() {
        return items;
    }
    let excluded: HashSet<&str> = excluded.iter().map(String::as_str).collect();
    items
        .into_iter()
        .filter(|item| !excluded.contains(item.identity()))
        .collect()
}

/// 从多个候选方案中选出最佳的一个
///
/// 包含全部 `markers` 的候选中取最长的（等长取先出现者）；
/// 都不满足时取第一个候选。没有候选时返回 `None`。
pub fn select_best_candidate<'a>(candidates: &'a [String], markers: &[&str]) -> Option<&'a str> {
    let qualified = candidates
        .iter()
        .filter(|candidate| markers.iter().all(|marker| candidate.contains(marker)))
        .fold(None::<&String>, |best, candidate| match best {
            Some(current) if current.len() >= candidate.len() => Some(current),
            _ => Some(candidate),
        });

    qualified.or_else(|| candidates.first()).map(String::as_str)
}

/// 去掉 HTML 标签并还原常见实体
pub fn strip_html(text: &str) -> String {
    html_tag_regex()
        .replace_all(text, "")
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// 清洗方案文本：去代码块标记和 HTML，保留换行；为空时返回兜底方案
pub fn sanitize_solution(raw: &str) -> String {
    let without_fences = fence_regex().replace_all(raw, "");
    let cleaned = strip_html(&without_fences).trim().to_string();
    if cleaned.is_empty() {
        warn!("⚠️ 模型返回的方案为空，使用兜底方案");
        FALLBACK_SOLUTION.to_string()
    } else {
        cleaned
    }
}
