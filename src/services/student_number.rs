//! 学号解析 - 业务能力层
//!
//! 先从文件名中取学号，取不到再调用整页 OCR。

use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

use crate::error::AppResult;
use crate::infrastructure::PageOcr;

/// 学号来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudentNumberSource {
    FileName,
    PageOcr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentNumber {
    pub value: String,
    pub source: StudentNumberSource,
}

fn file_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?:^|\D)(\d{6,12})(?:\D|$)").expect("学号正则无效"))
}

/// 从文件名中提取学号：6 到 12 位的独立数字串，取第一个
pub fn student_number_from_file_name(file_name: &str) -> Option<String> {
    let stem = std::path::Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string());

    file_name_pattern()
        .captures(&stem)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub struct StudentNumberResolver {
    ocr: Arc<dyn PageOcr>,
}

impl StudentNumberResolver {
    pub fn new(ocr: Arc<dyn PageOcr>) -> Self {
        Self { ocr }
    }

    /// 解析学号
    ///
    /// OCR 调用失败会向上传播（导致该文档失败）；OCR 未识别出学号返回 `Ok(None)`。
    pub async fn resolve(&self, file_name: &str, raster: &[u8]) -> AppResult<Option<StudentNumber>> {
        if let Some(value) = student_number_from_file_name(file_name) {
            debug!("从文件名 {} 解析到学号 {}", file_name, value);
            return Ok(Some(StudentNumber {
                value,
                source: StudentNumberSource::FileName,
            }));
        }

        info!("文件名 {} 中没有学号，尝试整页 OCR", file_name);
        let value = self.ocr.read_student_number(raster).await?;
        Ok(value.map(|value| StudentNumber {
            value,
            source: StudentNumberSource::PageOcr,
        }))
    }
}
