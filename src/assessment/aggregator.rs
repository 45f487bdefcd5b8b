//! 评估汇总 - 纯函数
//!
//! 输入：已保存的成绩 + 考试 / 课程定义；输出：总分统计、学习成果（ÖÇ）
//! 达成度、专业成果（PÇ）达成度。没有副作用，相同输入得到完全相同的输出。
//!
//! 每个学生每场考试只有一个总分，因此同一考试涉及的所有学习成果
//! 使用同一个达成度（考试平均百分比）。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt::{self, Write};

use crate::models::{Course, Exam, StudentExamResult};

const TARGET_ACCEPTABLE: f64 = 60.0;
const TARGET_GOOD: f64 = 70.0;

/// 总分统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TotalScoreAnalysis {
    pub student_count: usize,
    pub average_total_score: f64,
    pub average_percentage: f64,
    pub min_score: u32,
    pub max_score: u32,
    /// 百分比达到考试及格线的人数
    pub passed_count: usize,
    pub pass_rate: f64,
}

/// 学习成果达成度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSuccess {
    pub code: String,
    pub description: String,
    pub success: f64,
    pub met_target: bool,
}

/// 专业成果达成度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramOutcomeSuccess {
    pub code: String,
    /// 所有贡献学习成果达成度的算术平均
    pub success: f64,
    pub contribution_count: usize,
    pub met_target: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    BelowTarget,
    Acceptable,
    Good,
}

impl Recommendation {
    pub fn from_percentage(average_percentage: f64) -> Self {
        if average_percentage < TARGET_ACCEPTABLE {
            Recommendation::BelowTarget
        } else if average_percentage < TARGET_GOOD {
            Recommendation::Acceptable
        } else {
            Recommendation::Good
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Recommendation::BelowTarget => "未达到目标，建议复盘相关学习成果的教学安排",
            Recommendation::Acceptable => "基本达标，仍有提升空间",
            Recommendation::Good => "达成情况良好",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// 一场考试的完整评估结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentReport {
    pub exam_id: String,
    pub exam_code: String,
    pub course_id: String,
    pub total: TotalScoreAnalysis,
    pub learning_outcomes: Vec<OutcomeSuccess>,
    pub program_outcomes: Vec<ProgramOutcomeSuccess>,
    pub recommendation: Recommendation,
}

pub fn analyze_total_scores(results: &[StudentExamResult], exam: &Exam) -> TotalScoreAnalysis {
    if results.is_empty() {
        return TotalScoreAnalysis::default();
    }

    let count = results.len();
    let total_sum: u64 = results.iter().map(|r| r.total_score as u64).sum();
    let percentage_sum: f64 = results.iter().map(|r| r.percentage).sum();
    let passed_count = results
        .iter()
        .filter(|r| r.percentage >= exam.passing_score)
        .count();

    TotalScoreAnalysis {
        student_count: count,
        average_total_score: total_sum as f64 / count as f64,
        average_percentage: percentage_sum / count as f64,
        min_score: results.iter().map(|r| r.total_score).min().unwrap_or(0),
        max_score: results.iter().map(|r| r.total_score).max().unwrap_or(0),
        passed_count,
        pass_rate: passed_count as f64 / count as f64 * 100.0,
    }
}

/// 考试涉及的学习成果：显式列表优先，否则取课程全部学习成果（去重、保持顺序）
pub fn resolve_outcome_codes(exam: &Exam, course: &Course) -> Vec<String> {
    let source: Vec<&String> = if exam.learning_outcome_codes.is_empty() {
        course.learning_outcomes.iter().map(|lo| &lo.code).collect()
    } else {
        exam.learning_outcome_codes.iter().collect()
    };

    let mut seen: HashSet<&str> = HashSet::new();
    let mut codes = Vec::with_capacity(source.len());
    for code in source {
        if seen.insert(code.as_str()) {
            codes.push(code.clone());
        }
    }
    codes
}

pub fn learning_outcome_performance(
    exam: &Exam,
    course: &Course,
    average_percentage: f64,
) -> Vec<OutcomeSuccess> {
    resolve_outcome_codes(exam, course)
        .into_iter()
        .map(|code| OutcomeSuccess {
            description: course
                .learning_outcome(&code)
                .map(|lo| lo.description.clone())
                .unwrap_or_default(),
            code,
            success: average_percentage,
            met_target: average_percentage >= exam.passing_score,
        })
        .collect()
}

/// 学习成果达成度按课程映射扇出到专业成果
pub fn program_outcome_performance(
    course: &Course,
    outcomes: &[OutcomeSuccess],
    passing_score: f64,
) -> Vec<ProgramOutcomeSuccess> {
    let mut contributions: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for outcome in outcomes {
        for po in course.program_outcomes_of(&outcome.code) {
            contributions.entry(po.as_str()).or_default().push(outcome.success);
        }
    }

    contributions
        .into_iter()
        .map(|(code, values)| {
            let success = values.iter().sum::<f64>() / values.len() as f64;
            ProgramOutcomeSuccess {
                code: code.to_string(),
                success,
                contribution_count: values.len(),
                met_target: success >= passing_score,
            }
        })
        .collect()
}

pub fn compute_report(results: &[StudentExamResult], exam: &Exam, course: &Course) -> AssessmentReport {
    let total = analyze_total_scores(results, exam);
    let learning_outcomes = learning_outcome_performance(exam, course, total.average_percentage);
    let program_outcomes = program_outcome_performance(course, &learning_outcomes, exam.passing_score);

    AssessmentReport {
        exam_id: exam.id.clone(),
        exam_code: exam.code.clone(),
        course_id: course.id.clone(),
        recommendation: Recommendation::from_percentage(total.average_percentage),
        total,
        learning_outcomes,
        program_outcomes,
    }
}

impl AssessmentReport {
    /// 终端展示用的文本报告
    pub fn render_text(&self) -> String {
        let mut output = String::new();
        let mark = |met: bool| if met { "✅" } else { "⚠️" };

        let _ = writeln!(output, "# 考试评估: {} ({})", self.exam_code, self.exam_id);
        let _ = writeln!(
            output,
            "学生数 {}，平均分 {:.2}，平均百分比 {:.2}%，最低 {}，最高 {}",
            self.total.student_count,
            self.total.average_total_score,
            self.total.average_percentage,
            self.total.min_score,
            self.total.max_score
        );
        let _ = writeln!(
            output,
            "及格 {}/{} ({:.1}%)",
            self.total.passed_count, self.total.student_count, self.total.pass_rate
        );

        let _ = writeln!(output);
        let _ = writeln!(output, "## 学习成果");
        if self.learning_outcomes.is_empty() {
            let _ = writeln!(output, "没有关联的学习成果。");
        }
        for lo in &self.learning_outcomes {
            let _ = writeln!(output, "- {} {} {:.2}% {}", mark(lo.met_target), lo.code, lo.success, lo.description);
        }

        let _ = writeln!(output);
        let _ = writeln!(output, "## 专业成果");
        if self.program_outcomes.is_empty() {
            let _ = writeln!(output, "没有关联的专业成果。");
        }
        for po in &self.program_outcomes {
            let _ = writeln!(
                output,
                "- {} {} {:.2}% (来自 {} 个学习成果)",
                mark(po.met_target),
                po.code,
                po.success,
                po.contribution_count
            );
        }

        let _ = writeln!(output);
        let _ = writeln!(output, "结论: {}", self.recommendation);
        output
    }
}
