pub mod niche;
pub mod problem;
pub mod solution;

use serde::de::DeserializeOwned;

pub use niche::{Niche, NicheList};
pub use problem::{Problem, ProblemList};
pub use solution::{FALLBACK_SOLUTION, REQUIRED_SECTIONS};

/// 用于去重的标识字段
pub trait Identified {
    fn identity(&self) -> &str;
}

/// 模型输出期望的结构：顶层 `KEY` 对应一个数组
pub trait ResponseShape: DeserializeOwned {
    const KEY: &'static str;

    /// 解析失败时的固定兜底值，不能为空
    fn fallback() -> Self;

    fn is_empty(&self) -> bool;
}
