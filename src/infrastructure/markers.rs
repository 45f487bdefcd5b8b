use async_trait::async_trait;

use crate::error::AppResult;
use crate::infrastructure::{MarkerDetection, MarkerDetector};

/// 未接入标记检测服务时使用：总是报告未找到，流程走模板兜底
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMarkerDetector;

#[async_trait]
impl MarkerDetector for NoMarkerDetector {
    async fn detect(&self, _raster: &[u8]) -> AppResult<MarkerDetection> {
        Ok(MarkerDetection::missing())
    }
}
