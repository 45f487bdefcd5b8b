//! 评估服务：从存储读取考试、课程和成绩，交给纯函数汇总
//!
//! 手工录入成绩也走这里，和扫描成绩共享同一个唯一性约束。

use std::sync::Arc;
use tracing::info;

use crate::assessment::aggregator::{compute_report, AssessmentReport};
use crate::error::{AppError, AppResult};
use crate::models::{Course, Exam, StudentExamResult};
use crate::store::{ExamCatalog, ResultRepository};

pub struct AssessmentService {
    catalog: Arc<dyn ExamCatalog>,
    results: Arc<dyn ResultRepository>,
}

impl AssessmentService {
    pub fn new(catalog: Arc<dyn ExamCatalog>, results: Arc<dyn ResultRepository>) -> Self {
        Self { catalog, results }
    }

    async fn exam_and_course(&self, exam_id: &str) -> AppResult<(Exam, Course)> {
        let exam = self
            .catalog
            .get_exam(exam_id)
            .await?
            .ok_or_else(|| AppError::exam_not_found(exam_id))?;
        let course = self
            .catalog
            .get_course(&exam.course_id)
            .await?
            .ok_or_else(|| AppError::course_not_found(&exam.course_id))?;
        Ok((exam, course))
    }

    pub async fn compute_assessment(&self, exam_id: &str) -> AppResult<AssessmentReport> {
        let (exam, course) = self.exam_and_course(exam_id).await?;
        let results = self.results.list_by_exam(exam_id).await?;
        info!("📊 考试 {} 共 {} 条成绩，开始汇总", exam.code, results.len());
        Ok(compute_report(&results, &exam, &course))
    }

    /// 手工录入总分
    pub async fn record_manual_score(
        &self,
        exam_id: &str,
        student_number: &str,
        total_score: u32,
    ) -> AppResult<StudentExamResult> {
        let (exam, _) = self.exam_and_course(exam_id).await?;
        let result = StudentExamResult::from_total(student_number.trim(), &exam, total_score)?;
        self.results.create(result.clone()).await?;
        info!("✍️ 手工录入: 学号 {} 考试 {} 总分 {}", result.student_number, exam.code, total_score);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExamKind, LearningOutcome, ResultSource};
    use crate::store::{InMemoryCatalog, InMemoryResultRepository};

    fn service() -> AssessmentService {
        let course = Course {
            id: "C1".to_string(),
            code: "BM101".to_string(),
            name: String::new(),
            learning_outcomes: vec![LearningOutcome {
                code: "ÖÇ1".to_string(),
                description: String::new(),
                program_outcome_codes: vec!["PÇ1".to_string()],
            }],
        };
        let exam = Exam {
            id: "E1".to_string(),
            course_id: "C1".to_string(),
            kind: ExamKind::Midterm,
            code: "VIZE".to_string(),
            max_score: 50,
            questions: vec![],
            learning_outcome_codes: vec![],
            passing_score: 60.0,
        };
        AssessmentService::new(
            Arc::new(InMemoryCatalog::new(vec![course], vec![exam])),
            Arc::new(InMemoryResultRepository::new()),
        )
    }

    #[tokio::test]
    async fn test_manual_scores_feed_assessment() {
        let service = service();
        let result = service.record_manual_score("E1", " 20211001 ", 40).await.unwrap();
        assert_eq!(result.student_number, "20211001");
        assert_eq!(result.source, ResultSource::Manual);
        service.record_manual_score("E1", "20211002", 20).await.unwrap();

        let report = service.compute_assessment("E1").await.unwrap();
        assert_eq!(report.total.student_count, 2);
        assert!((report.total.average_percentage - 60.0).abs() < 1e-9);
        assert_eq!(report.program_outcomes[0].code, "PÇ1");
    }

    #[tokio::test]
    async fn test_manual_score_rules() {
        let service = service();
        assert!(service.record_manual_score("E1", "20211001", 51).await.is_err());
        assert!(service.record_manual_score("E1", "  ", 10).await.is_err());
        assert!(matches!(
            service.record_manual_score("E9", "20211001", 10).await,
            Err(AppError::NotFound(_))
        ));

        service.record_manual_score("E1", "20211001", 10).await.unwrap();
        let dup = service.record_manual_score("E1", "20211001", 30).await.unwrap_err();
        assert!(dup.is_conflict());
    }

    #[tokio::test]
    async fn test_assessment_of_unknown_exam() {
        assert!(service().compute_assessment("nope").await.is_err());
    }
}
