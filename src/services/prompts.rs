//! 提示词构建
//!
//! 所有要求 JSON 的提示词都约定顶层键（`niches` / `problems`），
//! 与 [`ResponseShape::KEY`](crate::models::ResponseShape::KEY) 保持一致。

use crate::models::REQUIRED_SECTIONS;

/// 某个类别下的细分市场
pub fn niches_prompt(category: &str, count: usize, exclude: &[String], batch: u32) -> String {
    let exclusion = if exclude.is_empty() {
        String::new()
    } else {
        format!(
            "\nDo not suggest any of these niches (or close variations): {}.",
            exclude.join(", ")
        )
    };
    let variation = if batch > 0 {
        format!("\nThis is request #{} for this category, so favour less obvious ideas.", batch + 1)
    } else {
        String::new()
    };

    format!(
        r#"Generate {count} profitable digital product niches in the {category} category.{exclusion}{variation}
Respond with JSON only, in exactly this format:
{{"niches": [{{"name": "...", "category": "{category}", "description": "...", "potential": "High|Medium|Low", "competition": "High|Medium|Low"}}]}}"#
    )
}

/// 某个细分市场里的痛点
pub fn problems_prompt(niche: &str, count: usize) -> String {
    format!(
        r#"List {count} specific, painful problems that people in the "{niche}" niche would pay to have solved with a digital product.
Respond with JSON only, in exactly this format:
{{"problems": [{{"title": "...", "description": "...", "audience": "...", "severity": "High|Medium|Low", "complexity": "High|Medium|Low", "example": "..."}}]}}"#
    )
}

/// 在已有痛点之外再生成一些
pub fn more_problems_prompt(niche: &str, count: usize, current_titles: &[String]) -> String {
    format!(
        "{}\nThese problems are already known, do not repeat them: {}.",
        problems_prompt(niche, count),
        current_titles.join("; ")
    )
}

/// 方案指南，要求包含固定章节
pub fn solution_prompt(niche: &str, problem: &str) -> String {
    let sections = REQUIRED_SECTIONS
        .iter()
        .map(|section| format!("- {section}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Write a practical guide for building a digital product in the "{niche}" niche that solves this problem: "{problem}".
Use plain text with these section headings, each on its own line and spelled exactly like this:
{sections}
- Pricing Strategy
- Marketing Plan
Be concrete: name tools, steps and realistic numbers. Do not use HTML."#
    )
}

/// 在已有方案的基础上继续展开
pub fn expand_solution_prompt(niche: &str, problem: &str, current_solution: &str) -> String {
    format!(
        r#"Here is a guide for a digital product in the "{niche}" niche that solves "{problem}":

{current_solution}

Continue it with additional, deeper content that is not already covered: advanced tactics, common pitfalls, and a 30-day launch checklist.
Return only the new content as plain text, without repeating the existing guide and without HTML."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_niches_prompt_mentions_key_and_exclusions() {
        let prompt = niches_prompt("Health", 2, &["Sleep Trackers".to_string()], 0);
        assert!(prompt.contains("\"niches\""));
        assert!(prompt.contains("Health"));
        assert!(prompt.contains("Sleep Trackers"));
        assert!(!prompt.contains("request #"));
    }

    #[test]
    fn test_solution_prompt_lists_required_sections() {
        let prompt = solution_prompt("Pet Tech", "Lost pets");
        for section in REQUIRED_SECTIONS {
            assert!(prompt.contains(section));
        }
    }

    #[test]
    fn test_more_problems_prompt_excludes_current() {
        let prompt = more_problems_prompt("Pet Tech", 3, &["Vet costs".to_string()]);
        assert!(prompt.contains("\"problems\""));
        assert!(prompt.contains("Vet costs"));
    }
}
