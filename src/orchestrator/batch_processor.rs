//! 批量答题卡处理器 - 编排层
//!
//! ## 职责
//!
//! 1. **提交**：校验考试 / 课程 / 文档列表，创建批次记录，立即返回批次 ID
//! 2. **并发控制**：全局 Semaphore 限制同时处理的文档数（跨所有批次）
//! 3. **失败隔离**：单个文档的错误（包括 panic）只记为该文件失败
//! 4. **状态查询**：`poll_batch` 返回当前计数快照
//!
//! 计数由 `JobStore::record` 在同一把写锁内更新，轮询方永远看不到
//! `success + failed != processed` 的中间状态。

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ValidationError};
use crate::models::{BatchJob, Course, Document, Exam, FileStatus};
use crate::store::{ExamCatalog, JobStore};
use crate::workflow::{DocumentCtx, DocumentFlow, DocumentReport};

type CancelFlags = Arc<Mutex<HashMap<String, Arc<AtomicBool>>>>;

/// 批量编排器
pub struct BatchOrchestrator {
    catalog: Arc<dyn ExamCatalog>,
    jobs: Arc<dyn JobStore>,
    flow: Arc<DocumentFlow>,
    semaphore: Arc<Semaphore>,
    cancel_flags: CancelFlags,
}

impl BatchOrchestrator {
    pub fn new(
        config: &Config,
        catalog: Arc<dyn ExamCatalog>,
        jobs: Arc<dyn JobStore>,
        flow: Arc<DocumentFlow>,
    ) -> Self {
        Self {
            catalog,
            jobs,
            flow,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_documents.max(1))),
            cancel_flags: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 查找考试及其课程
    async fn resolve_exam(&self, exam_id: &str) -> AppResult<(Exam, Course)> {
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

    /// 提交一个批次，立即返回批次 ID
    ///
    /// 只有提交时的校验错误会同步返回；之后每个文档的失败都记录在批次状态里。
    pub async fn submit_batch(&self, exam_id: &str, documents: Vec<Document>) -> AppResult<String> {
        let (exam, course) = self.resolve_exam(exam_id).await?;
        if documents.is_empty() {
            return Err(AppError::Validation(ValidationError::EmptyDocumentList));
        }

        let batch_id = uuid::Uuid::new_v4().to_string();
        self.jobs
            .create(BatchJob::new(&batch_id, exam_id, documents.len()))
            .await?;

        let cancel = Arc::new(AtomicBool::new(false));
        if let Ok(mut flags) = self.cancel_flags.lock() {
            flags.insert(batch_id.clone(), cancel.clone());
        }

        info!(
            "📦 批次 {} 已创建: 考试 {} ({}), {} 个文档",
            batch_id,
            exam.code,
            exam.kind,
            documents.len()
        );

        let driver = BatchDriver {
            batch_id: batch_id.clone(),
            exam: Arc::new(exam),
            course: Arc::new(course),
            jobs: self.jobs.clone(),
            flow: self.flow.clone(),
            semaphore: self.semaphore.clone(),
            cancel,
            cancel_flags: self.cancel_flags.clone(),
        };
        tokio::spawn(driver.run(documents));

        Ok(batch_id)
    }

    /// 查询批次状态
    pub async fn poll_batch(&self, batch_id: &str) -> AppResult<BatchJob> {
        self.jobs
            .get(batch_id)
            .await?
            .ok_or_else(|| AppError::batch_not_found(batch_id))
    }

    /// 同步处理单个文档（不创建批次），同样受全局并发上限约束
    pub async fn score_single_document(&self, exam_id: &str, document: Document) -> AppResult<DocumentReport> {
        let (exam, course) = self.resolve_exam(exam_id).await?;
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| AppError::Other(format!("并发控制已关闭: {}", e)))?;

        let ctx = DocumentCtx::new(None, 1, &document.file_name);
        self.flow.run(&ctx, &exam, &course, document).await
    }

    /// 标记批次为已取消：尚未开始的文档将记为失败，已开始的文档照常完成
    ///
    /// 批次已结束或不存在时返回 false。
    pub fn request_cancel(&self, batch_id: &str) -> bool {
        match self.cancel_flags.lock() {
            Ok(flags) => match flags.get(batch_id) {
                Some(flag) => {
                    flag.store(true, Ordering::SeqCst);
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }
}

/// 单个批次的后台驱动任务
struct BatchDriver {
    batch_id: String,
    exam: Arc<Exam>,
    course: Arc<Course>,
    jobs: Arc<dyn JobStore>,
    flow: Arc<DocumentFlow>,
    semaphore: Arc<Semaphore>,
    cancel: Arc<AtomicBool>,
    cancel_flags: CancelFlags,
}

impl BatchDriver {
    async fn run(self, documents: Vec<Document>) {
        let mut handles = Vec::with_capacity(documents.len());

        for (idx, document) in documents.into_iter().enumerate() {
            let document_index = idx + 1;
            let file_name = document.file_name.clone();

            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("[批次 {}] 无法获取并发许可: {}", self.batch_id, e);
                    self.record(FileStatus::failed(&file_name, format!("无法获取并发许可: {}", e)))
                        .await;
                    continue;
                }
            };

            if self.cancel.load(Ordering::SeqCst) {
                warn!("[批次 {}] 已取消，跳过文档 {}", self.batch_id, file_name);
                self.record(FileStatus::failed(&file_name, "批次已取消")).await;
                continue;
            }

            let ctx = DocumentCtx::new(Some(self.batch_id.clone()), document_index, &file_name);
            let batch_id = self.batch_id.clone();
            let exam = self.exam.clone();
            let course = self.course.clone();
            let flow = self.flow.clone();
            let jobs = self.jobs.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let status = match flow.run(&ctx, &exam, &course, document).await {
                    Ok(report) => report.into_status(ctx.file_name.clone()),
                    Err(e) => {
                        error!("{} ❌ 处理失败: {}", ctx, e);
                        FileStatus::failed(ctx.file_name.clone(), e.to_string())
                    }
                };
                if let Err(e) = jobs.record(&batch_id, status).await {
                    error!("{} 无法更新批次状态: {}", ctx, e);
                }
            });
            handles.push((document_index, file_name, handle));
        }

        // 等待本批所有任务完成；panic 的任务没有机会自己记录状态
        let outcomes = join_all(
            handles
                .into_iter()
                .map(|(document_index, file_name, handle)| async move { (document_index, file_name, handle.await) }),
        )
        .await;

        for (document_index, file_name, outcome) in outcomes {
            if let Err(e) = outcome {
                error!("[批次 {} 文档 #{}] 任务执行失败: {}", self.batch_id, document_index, e);
                self.record(FileStatus::failed(&file_name, format!("任务执行失败: {}", e)))
                    .await;
            }
        }

        if let Ok(mut flags) = self.cancel_flags.lock() {
            flags.remove(&self.batch_id);
        }

        match self.jobs.get(&self.batch_id).await {
            Ok(Some(job)) => info!(
                "✓ 批次 {} 完成: 成功 {}/{}，失败 {}",
                self.batch_id, job.success_count, job.total_files, job.failed_count
            ),
            Ok(None) => warn!("批次 {} 已不存在", self.batch_id),
            Err(e) => warn!("批次 {} 状态读取失败: {}", self.batch_id, e),
        }
    }

    async fn record(&self, status: FileStatus) {
        if let Err(e) = self.jobs.record(&self.batch_id, status).await {
            error!("[批次 {}] 无法更新批次状态: {}", self.batch_id, e);
        }
    }
}
