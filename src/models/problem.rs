use serde::{Deserialize, Serialize};

use crate::models::{Identified, ResponseShape};

/// 某个细分市场里的具体痛点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub audience: String,
    /// High / Medium / Low
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub complexity: String,
    #[serde(default)]
    pub example: String,
}

impl Identified for Problem {
    fn identity(&self) -> &str {
        &self.title
    }
}

/// 模型返回的 `{"problems": [...]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemList {
    pub problems: Vec<Problem>,
}

impl ResponseShape for ProblemList {
    const KEY: &'static str = "problems";

    fn fallback() -> Self {
        Self {
            problems: vec![Problem {
                title: "Finding reliable information quickly".to_string(),
                description: "People in this niche spend too much time searching for trustworthy, up-to-date guidance. Problems could not be generated right now, please try again.".to_string(),
                audience: "Beginners and busy professionals".to_string(),
                severity: "Medium".to_string(),
                complexity: "Low".to_string(),
                example: "Comparing a dozen blog posts before making a simple decision.".to_string(),
            }],
        }
    }

    fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }
}
