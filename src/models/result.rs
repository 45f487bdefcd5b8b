use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult, ValidationError};
use crate::models::{Course, Exam};

/// 某个成果代码上累计的得分
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomePoints {
    pub points: u32,
    pub question_count: u32,
}

/// 成绩来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// 扫描识别
    Scanned,
    /// 手工录入
    Manual,
}

/// 学生考试成绩（每个 学号+考试 仅一条）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentExamResult {
    pub student_number: String,
    pub exam_id: String,
    pub course_id: String,
    pub total_score: u32,
    pub max_score: u32,
    /// total_score / max_score × 100
    pub percentage: f64,
    pub outcome_performance: BTreeMap<String, OutcomePoints>,
    pub program_outcome_performance: BTreeMap<String, OutcomePoints>,
    pub source: ResultSource,
    pub created_at: DateTime<Utc>,
}

impl StudentExamResult {
    /// 由逐题得分构建成绩
    ///
    /// 总分为各题得分之和，截断到考试满分。
    pub fn from_question_scores(
        student_number: impl Into<String>,
        exam: &Exam,
        course: &Course,
        question_scores: &[(u32, u32)],
        source: ResultSource,
    ) -> AppResult<Self> {
        let student_number = student_number.into();
        if student_number.trim().is_empty() {
            return Err(AppError::Validation(ValidationError::EmptyStudentNumber));
        }

        let raw_total: u32 = question_scores.iter().map(|(_, score)| *score).sum();
        let total_score = raw_total.min(exam.max_score);

        let outcome_performance = outcome_points(exam, question_scores);
        let program_outcome_performance = program_outcome_points(course, &outcome_performance);

        Ok(Self {
            student_number,
            exam_id: exam.id.clone(),
            course_id: exam.course_id.clone(),
            total_score,
            max_score: exam.max_score,
            percentage: percentage_of(total_score, exam.max_score),
            outcome_performance,
            program_outcome_performance,
            source,
            created_at: Utc::now(),
        })
    }

    /// 手工录入总分（无逐题得分）
    pub fn from_total(
        student_number: impl Into<String>,
        exam: &Exam,
        total_score: u32,
    ) -> AppResult<Self> {
        let student_number = student_number.into();
        if student_number.trim().is_empty() {
            return Err(AppError::Validation(ValidationError::EmptyStudentNumber));
        }
        if total_score > exam.max_score {
            return Err(AppError::Validation(ValidationError::ScoreOutOfRange {
                score: total_score,
                max_score: exam.max_score,
            }));
        }

        Ok(Self {
            student_number,
            exam_id: exam.id.clone(),
            course_id: exam.course_id.clone(),
            total_score,
            max_score: exam.max_score,
            percentage: percentage_of(total_score, exam.max_score),
            outcome_performance: BTreeMap::new(),
            program_outcome_performance: BTreeMap::new(),
            source: ResultSource::Manual,
            created_at: Utc::now(),
        })
    }
}

pub fn percentage_of(score: u32, max_score: u32) -> f64 {
    if max_score == 0 {
        return 0.0;
    }
    score as f64 * 100.0 / max_score as f64
}

/// 按题目定义把得分累加到学习成果代码上
fn outcome_points(exam: &Exam, question_scores: &[(u32, u32)]) -> BTreeMap<String, OutcomePoints> {
    let mut map: BTreeMap<String, OutcomePoints> = BTreeMap::new();
    for (question_number, score) in question_scores {
        let Some(question) = exam
            .questions
            .iter()
            .find(|q| q.question_number == *question_number)
        else {
            continue;
        };
        for code in &question.learning_outcome_codes {
            let entry = map.entry(code.clone()).or_default();
            entry.points += score;
            entry.question_count += 1;
        }
    }
    map
}

/// 学习成果 → 专业成果 扇出
fn program_outcome_points(
    course: &Course,
    outcomes: &BTreeMap<String, OutcomePoints>,
) -> BTreeMap<String, OutcomePoints> {
    let mut map: BTreeMap<String, OutcomePoints> = BTreeMap::new();
    for (lo_code, points) in outcomes {
        for po_code in course.program_outcomes_of(lo_code) {
            let entry = map.entry(po_code.clone()).or_default();
            entry.points += points.points;
            entry.question_count += points.question_count;
        }
    }
    map
}
