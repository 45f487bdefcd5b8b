//! 基础设施层（Infrastructure Layer）
//!
//! 外部协作方的窄接口，以及可以直接使用的默认实现：
//!
//! - `RasterConverter` - 文档 → 栅格图像（默认：图片直通，PDF 需外部服务）
//! - `MarkerDetector` - 定位标记检测（默认：总是报告未找到，走模板兜底）
//! - `PerspectiveWarper` - 四点透视变换（默认：纯 Rust 单应性实现）
//! - `VisionClient` / `PageOcr` - 视觉推理与整页 OCR（实现见 `services::LlmService`）
//!
//! 本层不认识 Exam / BatchJob，不处理业务流程。

pub mod contracts;
pub mod markers;
pub mod perspective;
pub mod raster;

pub use contracts::{
    MarkerDetection, MarkerDetector, PageOcr, PerspectiveWarper, RasterConverter, VisionClient,
    VisionRequest,
};
pub use markers::NoMarkerDetector;
pub use perspective::HomographyWarper;
pub use raster::PassthroughRasterizer;
