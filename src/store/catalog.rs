use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::AppResult;
use crate::models::{CatalogFile, Course, Exam};

/// 课程与考试的只读查询
#[async_trait]
pub trait ExamCatalog: Send + Sync {
    async fn get_exam(&self, exam_id: &str) -> AppResult<Option<Exam>>;
    async fn get_course(&self, course_id: &str) -> AppResult<Option<Course>>;
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    exams: HashMap<String, Exam>,
    courses: HashMap<String, Course>,
}

impl InMemoryCatalog {
    pub fn new(courses: Vec<Course>, exams: Vec<Exam>) -> Self {
        Self {
            exams: exams.into_iter().map(|e| (e.id.clone(), e)).collect(),
            courses: courses.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }
}

impl From<CatalogFile> for InMemoryCatalog {
    fn from(file: CatalogFile) -> Self {
        Self::new(file.courses, file.exams)
    }
}

#[async_trait]
impl ExamCatalog for InMemoryCatalog {
    async fn get_exam(&self, exam_id: &str) -> AppResult<Option<Exam>> {
        Ok(self.exams.get(exam_id).cloned())
    }

    async fn get_course(&self, course_id: &str) -> AppResult<Option<Course>> {
        Ok(self.courses.get(course_id).cloned())
    }
}
