use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, AppResult, ValidationError};

/// 默认及格线（百分制）
pub const DEFAULT_PASSING_SCORE: f64 = 60.0;

/// 考试类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamKind {
    /// 期中
    #[serde(alias = "vize", alias = "ara_sinav")]
    Midterm,
    /// 期末
    #[serde(alias = "final_sinav")]
    Final,
}

impl ExamKind {
    pub fn name(self) -> &'static str {
        match self {
            ExamKind::Midterm => "midterm",
            ExamKind::Final => "final",
        }
    }
}

impl fmt::Display for ExamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExamKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "midterm" | "vize" | "ara_sinav" | "期中" => Ok(ExamKind::Midterm),
            "final" | "final_sinav" | "期末" => Ok(ExamKind::Final),
            other => Err(format!("未知的考试类型: {}", other)),
        }
    }
}

/// 试题定义：题号 + 对应的学习成果代码（至少一个）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamQuestion {
    pub question_number: u32,
    pub learning_outcome_codes: Vec<String>,
}

/// 考试
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub id: String,
    pub course_id: String,
    pub kind: ExamKind,
    /// 课程内唯一的考试代码
    pub code: String,
    pub max_score: u32,
    #[serde(default)]
    pub questions: Vec<ExamQuestion>,
    /// 显式指定的学习成果列表；为空时使用课程全部学习成果
    #[serde(default)]
    pub learning_outcome_codes: Vec<String>,
    #[serde(default = "default_passing_score")]
    pub passing_score: f64,
}

fn default_passing_score() -> f64 {
    DEFAULT_PASSING_SCORE
}

impl Exam {
    /// 校验考试定义
    pub fn validate(&self) -> AppResult<()> {
        let invalid = |reason: String| {
            AppError::Validation(ValidationError::InvalidExam {
                exam_id: self.id.clone(),
                reason,
            })
        };

        if self.max_score == 0 {
            return Err(invalid("满分必须大于 0".to_string()));
        }
        if !(0.0..=100.0).contains(&self.passing_score) {
            return Err(invalid(format!(
                "及格线 {} 不在 [0, 100] 范围内",
                self.passing_score
            )));
        }

        let mut seen = HashSet::new();
        for question in &self.questions {
            if !seen.insert(question.question_number) {
                return Err(invalid(format!("题号 {} 重复", question.question_number)));
            }
            if question.learning_outcome_codes.is_empty() {
                return Err(invalid(format!(
                    "题目 {} 没有对应的学习成果",
                    question.question_number
                )));
            }
        }

        Ok(())
    }

    /// 按题号排序后的试题
    pub fn ordered_questions(&self) -> Vec<&ExamQuestion> {
        let mut questions: Vec<&ExamQuestion> = self.questions.iter().collect();
        questions.sort_by_key(|q| q.question_number);
        questions
    }
}
