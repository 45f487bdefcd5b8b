use serde::{Deserialize, Serialize};

/// 课程学习成果（ÖÇ）及其贡献的专业成果（PÇ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningOutcome {
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub program_outcome_codes: Vec<String>,
}

/// 课程
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub learning_outcomes: Vec<LearningOutcome>,
}

impl Course {
    pub fn learning_outcome(&self, code: &str) -> Option<&LearningOutcome> {
        self.learning_outcomes.iter().find(|lo| lo.code == code)
    }

    /// 学习成果对应的专业成果代码；未定义的学习成果返回空
    pub fn program_outcomes_of(&self, code: &str) -> &[String] {
        self.learning_outcome(code)
            .map(|lo| lo.program_outcome_codes.as_slice())
            .unwrap_or(&[])
    }
}
