//! 评估层
//!
//! - `aggregator` - 纯函数：总分统计、学习成果 / 专业成果达成度、结论
//! - `service` - 读取存储后调用纯函数；手工录入成绩

pub mod aggregator;
pub mod service;

pub use aggregator::{
    analyze_total_scores, compute_report, learning_outcome_performance, program_outcome_performance,
    resolve_outcome_codes, AssessmentReport, OutcomeSuccess, ProgramOutcomeSuccess, Recommendation,
    TotalScoreAnalysis,
};
pub use service::AssessmentService;
