//! 存储层
//!
//! 只定义读写契约；内存实现用于测试和单进程部署，生产环境可替换为持久化实现。
//! (学号, 考试) 唯一性由存储层保证，而不是由编排层协调。

pub mod catalog;
pub mod jobs;
pub mod results;

pub use catalog::{ExamCatalog, InMemoryCatalog};
pub use jobs::{InMemoryJobStore, JobStore};
pub use results::{InMemoryResultRepository, ResultRepository};
