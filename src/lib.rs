//! # Answer Sheet Scoring
//!
//! 把扫描的固定版式答题卡转换为结构化的学生成绩，并汇总为
//! 学习成果 / 专业成果达成度。
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 外部协作方契约：栅格化、定位标记、透视变换、视觉推理
//! - 默认实现：图片直通、无标记检测、单应性透视变换
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个页面或单个区域
//! - `Normalizer` - 透视校正 / 模板兜底
//! - `extractor` - 区域裁剪（越界时使用空白占位图）
//! - `ScoreReader` - 读分；`StudentNumberResolver` - 学号
//! - `LlmService` - 视觉推理能力
//!
//! ### ③ 存储层（Store）
//! - `store/` - 考试目录、成绩（唯一性约束）、批次状态
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/` - 定义"一份答题卡"的完整处理流程
//! - `DocumentCtx` - 上下文封装（batch_id + document_index）
//! - `DocumentFlow` - 栅格化 → 学号 → 归一化 → 裁剪 → 读分 → 保存
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 提交批次、有界并发、状态轮询
//!
//! ### ⑥ 评估层（Assessment）
//! - `assessment/` - 纯函数汇总 + 手工录入成绩

pub mod app;
pub mod assessment;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod store;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use assessment::{AssessmentReport, AssessmentService};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{BatchJob, Document, Exam, FileStatus, StudentExamResult};
pub use orchestrator::BatchOrchestrator;
pub use workflow::{Collaborators, DocumentCtx, DocumentFlow, DocumentReport};
