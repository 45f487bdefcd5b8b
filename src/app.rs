//! 应用入口
//!
//! 从磁盘加载课程目录和扫描件，提交一个批次，轮询到完成，最后输出考试评估。

use anyhow::{bail, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::assessment::AssessmentService;
use crate::config::Config;
use crate::models::{load_catalog, load_documents, load_layouts, BatchJob};
use crate::orchestrator::BatchOrchestrator;
use crate::store::{ExamCatalog, InMemoryCatalog, InMemoryJobStore, InMemoryResultRepository, ResultRepository};
use crate::utils::logging::{log_documents_loaded, log_startup, print_final_stats};
use crate::workflow::{Collaborators, DocumentFlow};

/// 应用主结构
pub struct App {
    config: Config,
    orchestrator: BatchOrchestrator,
    assessment: AssessmentService,
}

impl App {
    /// 初始化应用：加载目录、布局，组装各层
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(config.max_concurrent_documents, &config.exam_id);

        info!("📚 加载课程目录: {}", config.catalog_file);
        let catalog_file = load_catalog(Path::new(&config.catalog_file)).await?;
        info!(
            "✓ {} 门课程, {} 场考试",
            catalog_file.courses.len(),
            catalog_file.exams.len()
        );

        let layouts = match &config.layout_file {
            Some(layout_file) => {
                info!("📐 使用答题卡布局: {}", layout_file);
                load_layouts(Path::new(layout_file), &catalog_file.exams, config.canonical_size()).await?
            }
            None => Default::default(),
        };

        let catalog: Arc<dyn ExamCatalog> = Arc::new(InMemoryCatalog::from(catalog_file));
        let results: Arc<dyn ResultRepository> = Arc::new(InMemoryResultRepository::new());

        let flow = DocumentFlow::new(&config, Collaborators::from_config(&config, results.clone()))
            .with_layouts(layouts);

        let orchestrator = BatchOrchestrator::new(
            &config,
            catalog.clone(),
            Arc::new(InMemoryJobStore::new()),
            Arc::new(flow),
        );
        let assessment = AssessmentService::new(catalog, results);

        Ok(Self {
            config,
            orchestrator,
            assessment,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        if self.config.exam_id.trim().is_empty() {
            bail!("未指定考试 ID（EXAM_ID）");
        }

        info!("\n📁 正在扫描待处理的答题卡: {}", self.config.input_folder);
        let documents = load_documents(&self.config.input_folder).await?;
        if documents.is_empty() {
            warn!("⚠️ 没有找到待处理的答题卡，程序结束");
            return Ok(());
        }
        log_documents_loaded(documents.len(), self.config.max_concurrent_documents);

        let batch_id = self
            .orchestrator
            .submit_batch(&self.config.exam_id, documents)
            .await?;

        let job = self.wait_for_batch(&batch_id).await?;
        print_final_stats(&job, &self.config.output_log_file);

        let report = self.assessment.compute_assessment(&self.config.exam_id).await?;
        info!("\n{}", report.render_text());
        println!("{}", serde_json::to_string_pretty(&report)?);

        Ok(())
    }

    /// 轮询批次直到全部文档处理完毕
    async fn wait_for_batch(&self, batch_id: &str) -> Result<BatchJob> {
        let interval = Duration::from_millis(self.config.poll_interval_ms.max(10));
        let mut last_processed = usize::MAX;

        loop {
            let job = self.orchestrator.poll_batch(batch_id).await?;
            if job.processed_count != last_processed {
                info!(
                    "⏳ 进度: {}/{} (成功 {}, 失败 {})",
                    job.processed_count, job.total_files, job.success_count, job.failed_count
                );
                last_processed = job.processed_count;
            }
            if job.is_complete() {
                return Ok(job);
            }
            tokio::time::sleep(interval).await;
        }
    }
}
