//! 文档处理上下文
//!
//! 封装"我正在处理哪个批次的第几个文档"这一信息

use std::fmt::Display;

/// 文档处理上下文
#[derive(Debug, Clone)]
pub struct DocumentCtx {
    /// 批次ID（单文档同步评分时为 None）
    pub batch_id: Option<String>,

    /// 文档在批次中的序号（从1开始，仅用于日志显示）
    pub document_index: usize,

    pub file_name: String,
}

impl DocumentCtx {
    pub fn new(batch_id: Option<String>, document_index: usize, file_name: impl Into<String>) -> Self {
        Self {
            batch_id,
            document_index,
            file_name: file_name.into(),
        }
    }

    /// 批次ID前 8 位，日志里足够区分
    fn short_batch(&self) -> &str {
        match &self.batch_id {
            Some(id) => id.get(..id.len().min(8)).unwrap_or(id),
            None => "single",
        }
    }
}

impl Display for DocumentCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[批次 {} 文档 #{} {}]",
            self.short_batch(),
            self.document_index,
            self.file_name
        )
    }
}
