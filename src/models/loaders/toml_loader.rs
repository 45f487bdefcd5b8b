use crate::error::{AppError, AppResult, FileError, ValidationError};
use crate::models::{CanvasSize, Course, Document, Exam, RegionBox, SheetLayout};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 支持的扫描件扩展名
const DOCUMENT_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "tif", "tiff", "pdf"];

/// 课程与考试定义文件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub exams: Vec<Exam>,
}

impl CatalogFile {
    /// 校验每场考试，以及考试 ID 唯一、课程内考试代码唯一、所属课程存在
    pub fn validate(&self) -> AppResult<()> {
        let course_ids: HashSet<&str> = self.courses.iter().map(|c| c.id.as_str()).collect();
        let mut exam_ids = HashSet::new();
        let mut exam_codes = HashSet::new();

        for exam in &self.exams {
            exam.validate()?;

            let invalid = |reason: String| {
                AppError::Validation(ValidationError::InvalidExam {
                    exam_id: exam.id.clone(),
                    reason,
                })
            };
            if !exam_ids.insert(exam.id.as_str()) {
                return Err(invalid("考试 ID 重复".to_string()));
            }
            if !course_ids.contains(exam.course_id.as_str()) {
                return Err(invalid(format!("课程 {} 不存在", exam.course_id)));
            }
            if !exam_codes.insert((exam.course_id.as_str(), exam.code.as_str())) {
                return Err(invalid(format!(
                    "考试代码 {} 在课程 {} 中重复",
                    exam.code, exam.course_id
                )));
            }
        }
        Ok(())
    }
}

/// 一场考试的答题卡布局
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamLayout {
    pub exam_id: String,
    #[serde(default)]
    pub canonical_boxes: Vec<RegionBox>,
    #[serde(default)]
    pub template_boxes: Vec<RegionBox>,
}

/// 布局文件：按考试给出区域框
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutFile {
    #[serde(default)]
    pub layouts: Vec<ExamLayout>,
}

async fn read_toml(path: &Path) -> AppResult<String> {
    if !path.exists() {
        return Err(AppError::File(FileError::NotFound {
            path: path.display().to_string(),
        }));
    }
    fs::read_to_string(path)
        .await
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))
}

fn toml_error(path: &Path, source: toml::de::Error) -> AppError {
    AppError::File(FileError::TomlParseFailed {
        path: path.display().to_string(),
        source,
    })
}

/// 加载课程与考试定义，并校验每场考试
pub async fn load_catalog(path: &Path) -> AppResult<CatalogFile> {
    let content = read_toml(path).await?;
    let catalog: CatalogFile = toml::from_str(&content).map_err(|e| toml_error(path, e))?;

    catalog.validate()?;

    tracing::info!(
        "已加载 {} 门课程, {} 场考试",
        catalog.courses.len(),
        catalog.exams.len()
    );
    Ok(catalog)
}

/// 加载答题卡布局，补全后逐个与考试题目数核对
pub async fn load_layouts(
    path: &Path,
    exams: &[Exam],
    canonical: CanvasSize,
) -> AppResult<HashMap<String, SheetLayout>> {
    let content = read_toml(path).await?;
    let file: LayoutFile = toml::from_str(&content).map_err(|e| toml_error(path, e))?;

    let mut layouts = HashMap::new();
    for entry in file.layouts {
        let exam = exams
            .iter()
            .find(|e| e.id == entry.exam_id)
            .ok_or_else(|| AppError::exam_not_found(&entry.exam_id))?;

        let layout = SheetLayout {
            canonical_boxes: entry.canonical_boxes,
            template_boxes: entry.template_boxes,
        }
        .complete(canonical);
        layout.validate(&exam.id, exam.questions.len())?;

        if layouts.insert(entry.exam_id.clone(), layout).is_some() {
            return Err(AppError::Validation(ValidationError::InvalidLayout {
                exam_id: entry.exam_id,
                reason: "同一考试出现多个布局".to_string(),
            }));
        }
    }

    tracing::info!("已加载 {} 个答题卡布局", layouts.len());
    Ok(layouts)
}

/// 从文件夹中加载所有扫描件
pub async fn load_documents(folder_path: &str) -> AppResult<Vec<Document>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        return Err(AppError::File(FileError::DirectoryNotFound {
            path: folder_path.to_string(),
        }));
    }

    let mut documents = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .map_err(|e| AppError::file_read_failed(folder_path, e))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| DOCUMENT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);
        if !supported {
            continue;
        }

        let file_name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        match fs::read(&path).await {
            Ok(bytes) => {
                tracing::debug!("正在加载: {} ({} 字节)", file_name, bytes.len());
                documents.push(Document::new(file_name, bytes));
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", path.display(), e);
            }
        }
    }

    // 目录遍历顺序不稳定，按文件名排序便于日志对照
    documents.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(documents)
}
