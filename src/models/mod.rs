pub mod batch;
pub mod course;
pub mod exam;
pub mod loaders;
pub mod region;
pub mod result;

pub use batch::{BatchJob, Document, FileState, FileStatus, RegionError};
pub use course::{Course, LearningOutcome};
pub use exam::{Exam, ExamKind, ExamQuestion, DEFAULT_PASSING_SCORE};
pub use loaders::{load_catalog, load_documents, load_layouts, CatalogFile, ExamLayout, LayoutFile};
pub use region::{CanvasSize, IntendedRect, PixelRect, Point, RegionBox, SheetLayout};
pub use result::{OutcomePoints, ResultSource, StudentExamResult};
