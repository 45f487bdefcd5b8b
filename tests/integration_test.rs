use answer_sheet_scoring::infrastructure::{
    HomographyWarper, MarkerDetection, MarkerDetector, PageOcr, PassthroughRasterizer, VisionClient,
    VisionRequest,
};
use answer_sheet_scoring::models::{Course, ExamKind, ExamQuestion, LearningOutcome, Point, RegionBox, SheetLayout};
use answer_sheet_scoring::store::{InMemoryCatalog, InMemoryJobStore, InMemoryResultRepository, ResultRepository};
use answer_sheet_scoring::{
    AppError, AppResult, AssessmentService, BatchJob, BatchOrchestrator, Collaborators, Config, Document,
    DocumentFlow, Exam,
};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

const PAGE_W: u32 = 200;
const PAGE_H: u32 = 280;

/// 对指定文档前缀的所有区域返回错误，其余返回固定分数
struct ScriptedVision {
    failing_prefix: Option<&'static str>,
    reply: &'static str,
}

#[async_trait]
impl VisionClient for ScriptedVision {
    async fn ask(&self, request: VisionRequest) -> AppResult<String> {
        if let Some(prefix) = self.failing_prefix {
            if request.label.starts_with(prefix) {
                return Err(AppError::Other("视觉服务超时".to_string()));
            }
        }
        Ok(self.reply.to_string())
    }
}

/// 指定文档的读分调用直接 panic
struct PanickingVision(&'static str);

#[async_trait]
impl VisionClient for PanickingVision {
    async fn ask(&self, request: VisionRequest) -> AppResult<String> {
        if request.label.starts_with(self.0) {
            panic!("视觉服务崩溃: {}", request.label);
        }
        Ok("5".to_string())
    }
}

struct FixedOcr(Option<&'static str>);

#[async_trait]
impl PageOcr for FixedOcr {
    async fn read_student_number(&self, _raster: &[u8]) -> AppResult<Option<String>> {
        Ok(self.0.map(str::to_string))
    }
}

struct FixedMarkers(MarkerDetection);

#[async_trait]
impl MarkerDetector for FixedMarkers {
    async fn detect(&self, _raster: &[u8]) -> AppResult<MarkerDetection> {
        Ok(self.0)
    }
}

struct BrokenMarkers;

#[async_trait]
impl MarkerDetector for BrokenMarkers {
    async fn detect(&self, _raster: &[u8]) -> AppResult<MarkerDetection> {
        Err(AppError::Other("检测服务不可用".to_string()))
    }
}

fn config() -> Config {
    Config {
        max_concurrent_documents: 2,
        canonical_width: PAGE_W,
        canonical_height: PAGE_H,
        reference_width: PAGE_W,
        reference_height: PAGE_H,
        ..Config::default()
    }
}

fn course() -> Course {
    Course {
        id: "C1".to_string(),
        code: "BM101".to_string(),
        name: "Programlamaya Giriş".to_string(),
        learning_outcomes: vec![
            LearningOutcome {
                code: "ÖÇ1".to_string(),
                description: "Temel algoritmalar".to_string(),
                program_outcome_codes: vec!["PÇ1".to_string(), "PÇ2".to_string()],
            },
            LearningOutcome {
                code: "ÖÇ2".to_string(),
                description: String::new(),
                program_outcome_codes: vec!["PÇ2".to_string()],
            },
        ],
    }
}

fn exam() -> Exam {
    let question = |n: u32, lo: &str| ExamQuestion {
        question_number: n,
        learning_outcome_codes: vec![lo.to_string()],
    };
    Exam {
        id: "E1".to_string(),
        course_id: "C1".to_string(),
        kind: ExamKind::Midterm,
        code: "VIZE-1".to_string(),
        max_score: 30,
        questions: vec![question(1, "ÖÇ1"), question(2, "ÖÇ1"), question(3, "ÖÇ2")],
        learning_outcome_codes: vec![],
        passing_score: 60.0,
    }
}

fn page_png() -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(PAGE_W, PAGE_H, Rgb([250, 250, 250])))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

struct Harness {
    orchestrator: BatchOrchestrator,
    results: Arc<InMemoryResultRepository>,
    assessment: AssessmentService,
}

fn harness(
    markers: Arc<dyn MarkerDetector>,
    vision: Arc<dyn VisionClient>,
    ocr: Arc<dyn PageOcr>,
) -> Harness {
    harness_with_layout(markers, vision, ocr, None)
}

fn harness_with_layout(
    markers: Arc<dyn MarkerDetector>,
    vision: Arc<dyn VisionClient>,
    ocr: Arc<dyn PageOcr>,
    layout: Option<SheetLayout>,
) -> Harness {
    let config = config();
    let results = Arc::new(InMemoryResultRepository::new());
    let catalog = Arc::new(InMemoryCatalog::new(vec![course()], vec![exam()]));
    let collaborators = Collaborators {
        rasterizer: Arc::new(PassthroughRasterizer),
        markers,
        warper: Arc::new(HomographyWarper),
        vision,
        ocr,
        results: results.clone(),
    };
    let mut flow = DocumentFlow::new(&config, collaborators);
    if let Some(layout) = layout {
        flow = flow.with_layout("E1", layout);
    }

    Harness {
        orchestrator: BatchOrchestrator::new(
            &config,
            catalog.clone(),
            Arc::new(InMemoryJobStore::new()),
            Arc::new(flow),
        ),
        assessment: AssessmentService::new(catalog, results.clone()),
        results,
    }
}

fn default_harness(vision: ScriptedVision) -> Harness {
    harness(
        Arc::new(FixedMarkers(MarkerDetection::missing())),
        Arc::new(vision),
        Arc::new(FixedOcr(None)),
    )
}

async fn wait_complete(orchestrator: &BatchOrchestrator, batch_id: &str) -> BatchJob {
    let mut last_processed = 0;
    for _ in 0..1000 {
        let job = assert_ok!(orchestrator.poll_batch(batch_id).await);
        assert_eq!(job.success_count + job.failed_count, job.processed_count);
        assert!(job.processed_count >= last_processed, "processed_count 不应回退");
        last_processed = job.processed_count;
        if job.is_complete() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("批次 {} 未在预期时间内完成", batch_id);
}

#[tokio::test]
async fn test_region_failures_do_not_fail_the_document() {
    let h = default_harness(ScriptedVision {
        failing_prefix: Some("20210002"),
        reply: "Puan: 5",
    });
    let documents = vec![
        Document::new("20210001.png", page_png()),
        Document::new("20210002.png", page_png()),
        Document::new("20210003.png", page_png()),
    ];

    let batch_id = assert_ok!(h.orchestrator.submit_batch("E1", documents).await);
    let job = wait_complete(&h.orchestrator, &batch_id).await;

    assert_eq!(job.total_files, 3);
    assert_eq!(job.processed_count, 3);
    assert_eq!(job.success_count, 3);
    assert_eq!(job.failed_count, 0);

    let failing = job
        .file_statuses
        .iter()
        .find(|s| s.file_name == "20210002.png")
        .unwrap();
    assert!(failing.is_success());
    assert_eq!(failing.total_score, Some(0));
    assert_eq!(failing.region_errors.len(), 3);
    assert_eq!(failing.region_errors[0].region_label, "20210002_q01");
    assert!(failing.used_template_fallback);

    let stored = assert_ok!(h.results.get("20210002", "E1").await).unwrap();
    assert_eq!(stored.total_score, 0);

    let ok = assert_ok!(h.results.get("20210001", "E1").await).unwrap();
    assert_eq!(ok.total_score, 15);
    assert_eq!(ok.outcome_performance["ÖÇ1"].points, 10);
    assert_eq!(ok.outcome_performance["ÖÇ2"].points, 5);
    assert_eq!(ok.program_outcome_performance["PÇ2"].points, 15);
}

#[tokio::test]
async fn test_missing_student_number_fails_only_that_document() {
    let h = default_harness(ScriptedVision {
        failing_prefix: None,
        reply: "7",
    });
    let documents = vec![
        Document::new("20210001.png", page_png()),
        Document::new("scan_without_id.png", page_png()),
        Document::new("20210003.png", page_png()),
    ];

    let batch_id = assert_ok!(h.orchestrator.submit_batch("E1", documents).await);
    let job = wait_complete(&h.orchestrator, &batch_id).await;

    assert_eq!(job.success_count, 2);
    assert_eq!(job.failed_count, 1);
    assert_eq!(job.success_count + job.failed_count, job.total_files);

    let failed = job.file_statuses.iter().find(|s| !s.is_success()).unwrap();
    assert_eq!(failed.file_name, "scan_without_id.png");
    assert!(failed.message.contains("学号"));
    assert_eq!(assert_ok!(h.results.list_by_exam("E1").await).len(), 2);
}

#[tokio::test]
async fn test_student_number_from_ocr() {
    let h = harness(
        Arc::new(FixedMarkers(MarkerDetection::missing())),
        Arc::new(ScriptedVision {
            failing_prefix: None,
            reply: "3",
        }),
        Arc::new(FixedOcr(Some("20219999"))),
    );

    let report = assert_ok!(
        h.orchestrator
            .score_single_document("E1", Document::new("scan.png", page_png()))
            .await
    );
    assert_eq!(report.student_number, "20219999");
    assert_eq!(report.total_score, 9);
    assert_eq!(report.question_scores, vec![(1, 3), (2, 3), (3, 3)]);
}

#[tokio::test]
async fn test_duplicate_student_number_is_a_conflict() {
    let h = default_harness(ScriptedVision {
        failing_prefix: None,
        reply: "4",
    });
    let documents = vec![
        Document::new("20210001.png", page_png()),
        Document::new("20210001.jpg", page_png()),
    ];

    let batch_id = assert_ok!(h.orchestrator.submit_batch("E1", documents).await);
    let job = wait_complete(&h.orchestrator, &batch_id).await;

    assert_eq!(job.success_count, 1);
    assert_eq!(job.failed_count, 1);
    let failed = job.file_statuses.iter().find(|s| !s.is_success()).unwrap();
    assert!(failed.message.contains("20210001"));
    assert_eq!(assert_ok!(h.results.list_by_exam("E1").await).len(), 1);
}

#[tokio::test]
async fn test_markers_found_uses_canonical_layout() {
    let corners = [
        Point::new(0.0, 0.0),
        Point::new((PAGE_W - 1) as f64, 0.0),
        Point::new((PAGE_W - 1) as f64, (PAGE_H - 1) as f64),
        Point::new(0.0, (PAGE_H - 1) as f64),
    ];
    let h = harness(
        Arc::new(FixedMarkers(MarkerDetection::found(corners))),
        Arc::new(ScriptedVision {
            failing_prefix: None,
            reply: "10",
        }),
        Arc::new(FixedOcr(None)),
    );

    let report = assert_ok!(
        h.orchestrator
            .score_single_document("E1", Document::new("20210042.png", page_png()))
            .await
    );
    assert!(!report.used_template_fallback);
    assert!(report.fallback_reason.is_none());
    assert!(report.region_errors.is_empty());
    assert_eq!(report.total_score, 30);
}

#[tokio::test]
async fn test_template_only_layout_works_when_markers_found() {
    let corners = [
        Point::new(0.0, 0.0),
        Point::new((PAGE_W - 1) as f64, 0.0),
        Point::new((PAGE_W - 1) as f64, (PAGE_H - 1) as f64),
        Point::new(0.0, (PAGE_H - 1) as f64),
    ];
    let layout = SheetLayout {
        canonical_boxes: vec![],
        template_boxes: vec![
            RegionBox::percent(10.0, 10.0, 20.0, 10.0),
            RegionBox::percent(40.0, 10.0, 20.0, 10.0),
            RegionBox::percent(70.0, 10.0, 20.0, 10.0),
        ],
    };
    let h = harness_with_layout(
        Arc::new(FixedMarkers(MarkerDetection::found(corners))),
        Arc::new(ScriptedVision {
            failing_prefix: None,
            reply: "7",
        }),
        Arc::new(FixedOcr(None)),
        Some(layout),
    );

    let report = assert_ok!(
        h.orchestrator
            .score_single_document("E1", Document::new("20210044.png", page_png()))
            .await
    );
    assert!(!report.used_template_fallback);
    assert!(report.region_errors.is_empty());
    assert_eq!(report.question_scores, vec![(1, 7), (2, 7), (3, 7)]);
    assert_eq!(report.total_score, 21);
}

#[tokio::test]
async fn test_layout_with_wrong_box_count_stores_nothing() {
    let layout = SheetLayout {
        canonical_boxes: vec![],
        template_boxes: vec![
            RegionBox::percent(10.0, 10.0, 20.0, 10.0),
            RegionBox::percent(40.0, 10.0, 20.0, 10.0),
        ],
    };
    let h = harness_with_layout(
        Arc::new(FixedMarkers(MarkerDetection::missing())),
        Arc::new(ScriptedVision {
            failing_prefix: None,
            reply: "7",
        }),
        Arc::new(FixedOcr(None)),
        Some(layout),
    );

    let batch_id = assert_ok!(
        h.orchestrator
            .submit_batch("E1", vec![Document::new("20210045.png", page_png())])
            .await
    );
    let job = wait_complete(&h.orchestrator, &batch_id).await;
    assert_eq!(job.failed_count, 1);
    assert!(job.file_statuses[0].message.contains("布局"));
    assert!(assert_ok!(h.results.get("20210045", "E1").await).is_none());
}

#[tokio::test]
async fn test_panicking_document_is_recorded_as_failed() {
    let h = harness(
        Arc::new(FixedMarkers(MarkerDetection::missing())),
        Arc::new(PanickingVision("20210052")),
        Arc::new(FixedOcr(None)),
    );
    let documents = vec![
        Document::new("20210051.png", page_png()),
        Document::new("20210052.png", page_png()),
        Document::new("20210053.png", page_png()),
    ];

    let batch_id = assert_ok!(h.orchestrator.submit_batch("E1", documents).await);
    let job = wait_complete(&h.orchestrator, &batch_id).await;

    assert_eq!(job.total_files, 3);
    assert_eq!(job.processed_count, job.total_files);
    assert_eq!(job.success_count + job.failed_count, job.processed_count);
    assert_eq!(job.failed_count, 1);
    assert_eq!(job.success_count, 2);

    let failed = job.file_statuses.iter().find(|s| !s.is_success()).unwrap();
    assert_eq!(failed.file_name, "20210052.png");
    assert!(failed.message.contains("任务执行失败"));
    assert_eq!(assert_ok!(h.results.list_by_exam("E1").await).len(), 2);
}

#[tokio::test]
async fn test_marker_detector_error_falls_back_to_template() {
    let h = harness(
        Arc::new(BrokenMarkers),
        Arc::new(ScriptedVision {
            failing_prefix: None,
            reply: "1",
        }),
        Arc::new(FixedOcr(None)),
    );

    let report = assert_ok!(
        h.orchestrator
            .score_single_document("E1", Document::new("20210043.png", page_png()))
            .await
    );
    assert!(report.used_template_fallback);
    assert_eq!(report.total_score, 3);
}

#[tokio::test]
async fn test_submission_validation() {
    let h = default_harness(ScriptedVision {
        failing_prefix: None,
        reply: "1",
    });

    let empty = assert_err!(h.orchestrator.submit_batch("E1", vec![]).await);
    assert!(matches!(empty, AppError::Validation(_)));

    let unknown = assert_err!(
        h.orchestrator
            .submit_batch("E404", vec![Document::new("20210001.png", page_png())])
            .await
    );
    assert!(matches!(unknown, AppError::NotFound(_)));

    let poll = assert_err!(h.orchestrator.poll_batch("no-such-batch").await);
    assert!(matches!(poll, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_unreadable_document_fails() {
    let h = default_harness(ScriptedVision {
        failing_prefix: None,
        reply: "1",
    });
    let documents = vec![
        Document::new("20210001.pdf", b"%PDF-1.7 ...".to_vec()),
        Document::new("20210002.png", page_png()),
    ];

    let batch_id = assert_ok!(h.orchestrator.submit_batch("E1", documents).await);
    let job = wait_complete(&h.orchestrator, &batch_id).await;
    assert_eq!(job.success_count, 1);
    assert_eq!(job.failed_count, 1);
}

#[tokio::test]
async fn test_missing_credentials_fail_the_document() {
    let config = config();
    let results = Arc::new(InMemoryResultRepository::new());
    let catalog = Arc::new(InMemoryCatalog::new(vec![course()], vec![exam()]));
    let flow = DocumentFlow::new(&config, Collaborators::from_config(&config, results.clone()));
    let orchestrator = BatchOrchestrator::new(&config, catalog, Arc::new(InMemoryJobStore::new()), Arc::new(flow));

    let err = assert_err!(
        orchestrator
            .score_single_document("E1", Document::new("20210001.png", page_png()))
            .await
    );
    assert!(err.is_fatal());
    assert!(assert_ok!(results.list_by_exam("E1").await).is_empty());
}

#[tokio::test]
async fn test_batch_then_assessment() {
    let h = default_harness(ScriptedVision {
        failing_prefix: Some("20210003"),
        reply: "8",
    });
    let documents = vec![
        Document::new("20210001.png", page_png()),
        Document::new("20210002.png", page_png()),
        Document::new("20210003.png", page_png()),
    ];

    let batch_id = assert_ok!(h.orchestrator.submit_batch("E1", documents).await);
    wait_complete(&h.orchestrator, &batch_id).await;

    assert_ok!(h.assessment.record_manual_score("E1", "20210004", 30).await);

    // 24, 24, 0, 30 of 30
    let report = assert_ok!(h.assessment.compute_assessment("E1").await);
    assert_eq!(report.total.student_count, 4);
    assert_eq!(report.total.min_score, 0);
    assert_eq!(report.total.max_score, 30);
    assert_eq!(report.total.average_total_score, 19.5);
    assert_eq!(report.total.passed_count, 3);

    let codes: Vec<&str> = report.program_outcomes.iter().map(|p| p.code.as_str()).collect();
    assert_eq!(codes, vec!["PÇ1", "PÇ2"]);
    assert_eq!(report.program_outcomes[1].contribution_count, 2);

    let again = assert_ok!(h.assessment.compute_assessment("E1").await);
    assert_eq!(report, again);
}
