use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 上传的原始文档
#[derive(Debug, Clone)]
pub struct Document {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// 不带扩展名的文件名，用于区域命名
    pub fn stem(&self) -> String {
        Path::new(&self.file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.file_name.clone())
    }
}

/// 单个区域读分失败的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionError {
    pub question_number: u32,
    pub region_label: String,
    pub reason: String,
}

/// 单个文件的处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Success,
    Failed,
}

/// 单个文件的处理结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStatus {
    pub file_name: String,
    pub state: FileState,
    pub student_number: Option<String>,
    pub total_score: Option<u32>,
    /// 是否走了模板兜底路径
    pub used_template_fallback: bool,
    /// 人类可读的说明（失败原因）
    pub message: String,
    #[serde(default)]
    pub region_errors: Vec<RegionError>,
}

impl FileStatus {
    pub fn failed(file_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            state: FileState::Failed,
            student_number: None,
            total_score: None,
            used_template_fallback: false,
            message: reason.into(),
            region_errors: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == FileState::Success
    }
}

/// 批次任务（仅进程内存，重启后丢失）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub batch_id: String,
    pub exam_id: String,
    pub total_files: usize,
    pub processed_count: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub file_statuses: Vec<FileStatus>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    pub fn new(batch_id: impl Into<String>, exam_id: impl Into<String>, total_files: usize) -> Self {
        Self {
            batch_id: batch_id.into(),
            exam_id: exam_id.into(),
            total_files,
            processed_count: 0,
            success_count: 0,
            failed_count: 0,
            file_statuses: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// 记录一个文件的结果：计数与状态列表一起更新
    pub fn record(&mut self, status: FileStatus) {
        if self.is_complete() {
            return;
        }
        self.processed_count += 1;
        if status.is_success() {
            self.success_count += 1;
        } else {
            self.failed_count += 1;
        }
        self.file_statuses.push(status);
        if self.is_complete() {
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn is_complete(&self) -> bool {
        self.processed_count >= self.total_files
    }
}
