//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批次调度和进度统计，是整个系统的"指挥中心"。
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<Document>，返回批次 ID)
//!     ↓
//! workflow::DocumentFlow (处理单个 Document)
//!     ↓
//! services (能力层：normalize / extract / read score / student number)
//!     ↓
//! infrastructure (协作方契约：raster / markers / warper / vision)
//! ```
//!
//! ## 设计原则
//!
//! 1. **提交即返回**：所有文档处理都发生在 `submit_batch` 返回之后
//! 2. **有界并发**：全局 Semaphore，所有批次共享同一个上限
//! 3. **无业务逻辑**：只做调度和统计，不做具体业务判断

pub mod batch_processor;

pub use batch_processor::BatchOrchestrator;
