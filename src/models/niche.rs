use serde::{Deserialize, Serialize};

use crate::models::{Identified, ResponseShape};

/// 模型推荐的细分市场
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Niche {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    /// High / Medium / Low
    #[serde(default)]
    pub potential: String,
    /// High / Medium / Low
    #[serde(default)]
    pub competition: String,
}

impl Identified for Niche {
    fn identity(&self) -> &str {
        &self.name
    }
}

/// 模型返回的 `{"niches": [...]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NicheList {
    pub niches: Vec<Niche>,
}

impl ResponseShape for NicheList {
    const KEY: &'static str = "niches";

    fn fallback() -> Self {
        Self {
            niches: vec![Niche {
                name: "Digital Productivity Tools".to_string(),
                category: "Technology".to_string(),
                description: "Templates, planners and small utilities that help people organise their work. Suggestions could not be generated right now, please try again.".to_string(),
                potential: "Medium".to_string(),
                competition: "Medium".to_string(),
            }],
        }
    }

    fn is_empty(&self) -> bool {
        self.niches.is_empty()
    }
}
