pub mod extractor;
pub mod llm_service;
pub mod normalizer;
pub mod score_reader;
pub mod student_number;

pub use extractor::{compose_grid, extract, extract_page, region_label, ExtractedRegion, ExtractionResult};
pub use llm_service::LlmService;
pub use normalizer::{FallbackReason, NormalizationResult, NormalizedPage, Normalizer};
pub use score_reader::{parse_score, ScoreHint, ScoreReader};
pub use student_number::{StudentNumber, StudentNumberResolver, StudentNumberSource};
