use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult, ConflictError};
use crate::models::{BatchJob, FileStatus};

/// 批次状态存储
///
/// `record` 在一次加锁内同时更新计数和文件状态，轮询方不会看到中间状态。
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: BatchJob) -> AppResult<()>;
    async fn get(&self, batch_id: &str) -> AppResult<Option<BatchJob>>;
    async fn record(&self, batch_id: &str, status: FileStatus) -> AppResult<BatchJob>;
}

/// 进程内存中的批次状态，重启后丢失
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, BatchJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: BatchJob) -> AppResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.batch_id) {
            return Err(AppError::Conflict(ConflictError::DuplicateBatch {
                batch_id: job.batch_id,
            }));
        }
        jobs.insert(job.batch_id.clone(), job);
        Ok(())
    }

    async fn get(&self, batch_id: &str) -> AppResult<Option<BatchJob>> {
        Ok(self.jobs.read().await.get(batch_id).cloned())
    }

    async fn record(&self, batch_id: &str, status: FileStatus) -> AppResult<BatchJob> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(batch_id)
            .ok_or_else(|| AppError::batch_not_found(batch_id))?;
        job.record(status);
        Ok(job.clone())
    }
}
