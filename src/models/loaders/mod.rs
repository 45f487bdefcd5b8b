pub mod toml_loader;

pub use toml_loader::{load_catalog, load_documents, load_layouts, CatalogFile, ExamLayout, LayoutFile};
