//! 文档处理流程 - 流程层
//!
//! 核心职责：定义"一份答题卡"的完整处理流程
//!
//! 流程顺序：
//! 1. 栅格化 → 学号（文件名 / 整页 OCR）
//! 2. 标记检测 → 几何归一化（透视校正或模板兜底）
//! 3. 逐题裁剪 → 逐题读分（单题失败记 0 分）
//! 4. 学习成果映射 → 写入成绩
//!
//! 任何一步返回 Err 都只让当前文档失败，由编排层记录。

use image::DynamicImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ImageError, ValidationError};
use crate::infrastructure::{
    HomographyWarper, MarkerDetection, MarkerDetector, NoMarkerDetector, PageOcr,
    PassthroughRasterizer, PerspectiveWarper, RasterConverter, VisionClient,
};
use crate::models::{
    Course, Document, Exam, FileState, FileStatus, RegionError, ResultSource, SheetLayout,
    StudentExamResult,
};
use crate::services::{
    compose_grid, extract_page, ExtractedRegion, ExtractionResult, LlmService, NormalizationResult,
    Normalizer, ScoreHint, ScoreReader, StudentNumberResolver,
};
use crate::store::ResultRepository;
use crate::workflow::DocumentCtx;

const DEBUG_GRID_COLUMNS: u32 = 5;

/// 流程依赖的外部协作方
#[derive(Clone)]
pub struct Collaborators {
    pub rasterizer: Arc<dyn RasterConverter>,
    pub markers: Arc<dyn MarkerDetector>,
    pub warper: Arc<dyn PerspectiveWarper>,
    pub vision: Arc<dyn VisionClient>,
    pub ocr: Arc<dyn PageOcr>,
    pub results: Arc<dyn ResultRepository>,
}

impl Collaborators {
    /// 默认实现：图片直通、无标记检测、单应性透视变换、LLM 视觉服务
    pub fn from_config(config: &Config, results: Arc<dyn ResultRepository>) -> Self {
        let llm = Arc::new(LlmService::new(config));
        Self {
            rasterizer: Arc::new(PassthroughRasterizer),
            markers: Arc::new(NoMarkerDetector),
            warper: Arc::new(HomographyWarper),
            vision: llm.clone(),
            ocr: llm,
            results,
        }
    }
}

/// 单个文档的评分结果
#[derive(Debug, Clone)]
pub struct DocumentReport {
    pub student_number: String,
    pub total_score: u32,
    /// (题号, 得分)
    pub question_scores: Vec<(u32, u32)>,
    pub region_errors: Vec<RegionError>,
    pub used_template_fallback: bool,
    pub fallback_reason: Option<String>,
}

impl DocumentReport {
    pub fn into_status(self, file_name: impl Into<String>) -> FileStatus {
        let message = match &self.fallback_reason {
            Some(reason) => format!("模板兜底: {}", reason),
            None => String::new(),
        };
        FileStatus {
            file_name: file_name.into(),
            state: FileState::Success,
            student_number: Some(self.student_number),
            total_score: Some(self.total_score),
            used_template_fallback: self.used_template_fallback,
            message,
            region_errors: self.region_errors,
        }
    }
}

/// 归一化 + 裁剪的产物
struct PageRegions {
    regions: Vec<ExtractedRegion>,
    fallback_reason: Option<String>,
}

/// 文档处理流程
///
/// - 编排单个文档的完整处理流程
/// - 不关心批次计数，只返回结果或错误
pub struct DocumentFlow {
    rasterizer: Arc<dyn RasterConverter>,
    markers: Arc<dyn MarkerDetector>,
    normalizer: Arc<Normalizer>,
    score_reader: ScoreReader,
    student_numbers: StudentNumberResolver,
    results: Arc<dyn ResultRepository>,
    /// 按考试 ID 配置的布局；未配置的考试按题目数量生成
    layouts: HashMap<String, SheetLayout>,
    debug_dir: Option<PathBuf>,
}

impl DocumentFlow {
    pub fn new(config: &Config, collaborators: Collaborators) -> Self {
        Self {
            rasterizer: collaborators.rasterizer,
            markers: collaborators.markers,
            normalizer: Arc::new(Normalizer::new(
                collaborators.warper,
                config.canonical_size(),
                config.reference_size(),
            )),
            score_reader: ScoreReader::new(collaborators.vision),
            student_numbers: StudentNumberResolver::new(collaborators.ocr),
            results: collaborators.results,
            layouts: HashMap::new(),
            debug_dir: config.debug_output_dir.as_ref().map(PathBuf::from),
        }
    }

    /// 为某场考试指定答题卡布局，缺失的一侧区域框按标准画布补全
    pub fn with_layout(mut self, exam_id: impl Into<String>, layout: SheetLayout) -> Self {
        let layout = layout.complete(self.normalizer.canonical_size());
        self.layouts.insert(exam_id.into(), layout);
        self
    }

    pub fn with_layouts(self, layouts: HashMap<String, SheetLayout>) -> Self {
        layouts
            .into_iter()
            .fold(self, |flow, (exam_id, layout)| flow.with_layout(exam_id, layout))
    }

    /// 布局与题目数不一致时拒绝处理，避免写入全 0 的成绩
    fn layout_for(&self, exam: &Exam) -> AppResult<SheetLayout> {
        let layout = match self.layouts.get(&exam.id) {
            Some(layout) => layout.clone(),
            None => SheetLayout::score_table(exam.questions.len(), self.normalizer.canonical_size()),
        };
        layout.validate(&exam.id, exam.questions.len())?;
        Ok(layout)
    }

    pub async fn run(
        &self,
        ctx: &DocumentCtx,
        exam: &Exam,
        course: &Course,
        document: Document,
    ) -> AppResult<DocumentReport> {
        info!("{} 开始处理 ({} 字节)", ctx, document.bytes.len());
        let layout = self.layout_for(exam)?;

        // ========== 1. 栅格化 + 学号 ==========
        let raster = self.rasterizer.rasterize(&document).await?;

        let student = self
            .student_numbers
            .resolve(&document.file_name, &raster)
            .await?
            .ok_or_else(|| {
                AppError::Validation(ValidationError::StudentNumberNotFound {
                    file_name: document.file_name.clone(),
                })
            })?;
        info!("{} 学号: {} ({:?})", ctx, student.value, student.source);

        // ========== 2. 标记检测 ==========
        // 检测服务报错等同于未找到标记
        let detection = match self.markers.detect(&raster).await {
            Ok(detection) => detection,
            Err(e) => {
                warn!("{} 标记检测失败，按未找到处理: {}", ctx, e);
                MarkerDetection::missing()
            }
        };

        // ========== 3. 归一化 + 裁剪（阻塞线程池） ==========
        let question_numbers: Vec<u32> = exam
            .ordered_questions()
            .iter()
            .map(|q| q.question_number)
            .collect();

        let page = self
            .normalize_and_extract(ctx, raster, detection, layout, document.stem(), question_numbers)
            .await?;

        match &page.fallback_reason {
            Some(reason) => info!("{} 使用模板区域 ({})", ctx, reason),
            None => info!("{} 透视校正成功", ctx),
        }

        // ========== 4. 逐题读分 ==========
        let (question_scores, region_errors) = self.read_scores(ctx, exam, &page.regions).await?;

        // ========== 5. 写入成绩 ==========
        let result = StudentExamResult::from_question_scores(
            student.value.clone(),
            exam,
            course,
            &question_scores,
            ResultSource::Scanned,
        )?;
        let total_score = result.total_score;
        self.results.create(result).await?;

        info!(
            "{} ✅ 成绩已保存: 学号 {} 总分 {}/{} (区域错误 {} 个)",
            ctx,
            student.value,
            total_score,
            exam.max_score,
            region_errors.len()
        );

        Ok(DocumentReport {
            student_number: student.value,
            total_score,
            question_scores,
            region_errors,
            used_template_fallback: page.fallback_reason.is_some(),
            fallback_reason: page.fallback_reason,
        })
    }

    async fn normalize_and_extract(
        &self,
        ctx: &DocumentCtx,
        raster: Vec<u8>,
        detection: MarkerDetection,
        layout: SheetLayout,
        stem: String,
        question_numbers: Vec<u32>,
    ) -> AppResult<PageRegions> {
        let normalizer = self.normalizer.clone();
        let debug_dir = self.debug_dir.clone();
        let ctx_label = ctx.to_string();

        tokio::task::spawn_blocking(move || -> AppResult<PageRegions> {
            let raw: DynamicImage = image::load_from_memory(&raster)?;

            let (page, fallback_reason) = match normalizer.normalize(raw, &detection, &layout) {
                NormalizationResult::WarpedCanonical(page) => (page, None),
                NormalizationResult::TemplateFallback { page, reason } => (page, Some(reason.to_string())),
                NormalizationResult::Unrecoverable { reason } => {
                    return Err(AppError::Image(ImageError::Unrecoverable { reason }));
                }
            };

            let regions = extract_page(&page, &stem, &question_numbers);

            if let Some(dir) = debug_dir {
                save_debug_artifacts(&dir, &ctx_label, &stem, &regions);
            }

            Ok(PageRegions {
                regions,
                fallback_reason,
            })
        })
        .await?
    }

    /// 逐题读分：单题失败记 0 分并记录原因；致命错误（缺少凭证）中止整个文档
    async fn read_scores(
        &self,
        ctx: &DocumentCtx,
        exam: &Exam,
        regions: &[ExtractedRegion],
    ) -> AppResult<(Vec<(u32, u32)>, Vec<RegionError>)> {
        let mut scores = Vec::with_capacity(regions.len());
        let mut errors = Vec::new();

        for region in regions {
            let record_zero = |reason: String, errors: &mut Vec<RegionError>| {
                errors.push(RegionError {
                    question_number: region.question_number,
                    region_label: region.label.clone(),
                    reason,
                });
            };

            let image = match &region.result {
                ExtractionResult::Cropped { image, .. } => image,
                ExtractionResult::BlankPlaceholder { reason, .. } => {
                    warn!("{} 题目 {} 使用占位图，记 0 分", ctx, region.question_number);
                    record_zero(reason.clone(), &mut errors);
                    scores.push((region.question_number, 0));
                    continue;
                }
            };

            let hint = ScoreHint {
                question_number: region.question_number,
                max_score: exam.max_score,
                label: region.label.clone(),
            };

            match self.score_reader.read_score(image, &hint).await {
                Ok(score) => scores.push((region.question_number, score)),
                Err(e) if e.is_fatal() => {
                    error!("{} 读分出现致命错误: {}", ctx, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("{} 题目 {} 读分失败，记 0 分: {}", ctx, region.question_number, e);
                    record_zero(e.to_string(), &mut errors);
                    scores.push((region.question_number, 0));
                }
            }
        }

        Ok((scores, errors))
    }
}

/// 写调试拼图；拼图失败时改为逐个写裁剪图。任何失败都只记日志。
fn save_debug_artifacts(dir: &Path, ctx_label: &str, stem: &str, regions: &[ExtractedRegion]) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!("{} 无法创建调试目录 {}: {}", ctx_label, dir.display(), e);
        return;
    }

    let crops: Vec<&DynamicImage> = regions.iter().map(|r| r.result.image()).collect();
    match compose_grid(&crops, DEBUG_GRID_COLUMNS) {
        Ok(grid) => {
            let path = dir.join(format!("{}_grid.png", stem));
            if let Err(e) = grid.save(&path) {
                warn!("{} 保存拼图失败 {}: {}", ctx_label, path.display(), e);
            }
        }
        Err(e) => {
            warn!("{} {}，改为逐个保存裁剪图", ctx_label, e);
            for region in regions {
                let path = dir.join(format!("{}.png", region.label));
                if let Err(e) = region.result.image().save(&path) {
                    warn!("{} 保存裁剪图失败 {}: {}", ctx_label, path.display(), e);
                }
            }
        }
    }
}
