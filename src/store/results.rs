use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult, ConflictError};
use crate::models::StudentExamResult;

/// 学生成绩存储
///
/// `create` 必须保证 (学号, 考试) 唯一：重复创建返回冲突错误，已有记录不受影响。
#[async_trait]
pub trait ResultRepository: Send + Sync {
    async fn create(&self, result: StudentExamResult) -> AppResult<()>;
    async fn list_by_exam(&self, exam_id: &str) -> AppResult<Vec<StudentExamResult>>;
    async fn get(&self, student_number: &str, exam_id: &str) -> AppResult<Option<StudentExamResult>>;
}

#[derive(Debug, Default)]
pub struct InMemoryResultRepository {
    // key: (exam_id, student_number)
    results: RwLock<HashMap<(String, String), StudentExamResult>>,
}

impl InMemoryResultRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultRepository for InMemoryResultRepository {
    async fn create(&self, result: StudentExamResult) -> AppResult<()> {
        let key = (result.exam_id.clone(), result.student_number.clone());
        let mut results = self.results.write().await;
        if results.contains_key(&key) {
            return Err(AppError::Conflict(ConflictError::DuplicateResult {
                student_number: result.student_number,
                exam_id: result.exam_id,
            }));
        }
        results.insert(key, result);
        Ok(())
    }

    async fn list_by_exam(&self, exam_id: &str) -> AppResult<Vec<StudentExamResult>> {
        let results = self.results.read().await;
        let mut list: Vec<StudentExamResult> = results
            .values()
            .filter(|r| r.exam_id == exam_id)
            .cloned()
            .collect();
        // HashMap 遍历无序，按学号排序保证输出稳定
        list.sort_by(|a, b| a.student_number.cmp(&b.student_number));
        Ok(list)
    }

    async fn get(&self, student_number: &str, exam_id: &str) -> AppResult<Option<StudentExamResult>> {
        let results = self.results.read().await;
        Ok(results
            .get(&(exam_id.to_string(), student_number.to_string()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Exam, ExamKind};

    fn exam() -> Exam {
        Exam {
            id: "E1".to_string(),
            course_id: "C1".to_string(),
            kind: ExamKind::Midterm,
            code: "V".to_string(),
            max_score: 100,
            questions: Vec::new(),
            learning_outcome_codes: Vec::new(),
            passing_score: 60.0,
        }
    }

    #[tokio::test]
    async fn test_duplicate_result_conflicts_and_keeps_first() {
        let repo = InMemoryResultRepository::new();
        let exam = exam();
        repo.create(StudentExamResult::from_total("20211001", &exam, 80).unwrap())
            .await
            .unwrap();

        let err = repo
            .create(StudentExamResult::from_total("20211001", &exam, 10).unwrap())
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let stored = repo.get("20211001", "E1").await.unwrap().unwrap();
        assert_eq!(stored.total_score, 80);
        assert_eq!(repo.list_by_exam("E1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_creates_only_one_wins() {
        let repo = std::sync::Arc::new(InMemoryResultRepository::new());
        let exam = exam();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let repo = repo.clone();
                let result = StudentExamResult::from_total("20211001", &exam, i).unwrap();
                tokio::spawn(async move { repo.create(result).await })
            })
            .collect();

        let outcomes = futures::future::join_all(handles).await;
        let created = outcomes
            .into_iter()
            .filter(|o| matches!(o, Ok(Ok(()))))
            .count();
        assert_eq!(created, 1);
    }
}
