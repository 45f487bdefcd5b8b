/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时处理的文档数量（所有批次共享）
    pub max_concurrent_documents: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 轮询批次状态的间隔（毫秒）
    pub poll_interval_ms: u64,
    // --- 视觉推理配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- 几何归一化配置 ---
    /// 透视校正后的标准画布尺寸
    pub canonical_width: u32,
    pub canonical_height: u32,
    /// 旧版绝对像素区域所基于的参考尺寸
    pub reference_width: u32,
    pub reference_height: u32,
    // --- 数据文件 ---
    /// 课程与考试定义（TOML）
    pub catalog_file: String,
    /// 待处理扫描件目录
    pub input_folder: String,
    /// 本次处理的考试ID
    pub exam_id: String,
    /// 答题卡区域布局（TOML，可选）
    pub layout_file: Option<String>,
    /// 调试拼图输出目录（可选）
    pub debug_output_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_documents: 8,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            poll_interval_ms: 500,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            canonical_width: 1654,
            canonical_height: 2339,
            reference_width: 1654,
            reference_height: 2339,
            catalog_file: "catalog.toml".to_string(),
            input_folder: "scans".to_string(),
            exam_id: String::new(),
            layout_file: None,
            debug_output_dir: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_documents: std::env::var("MAX_CONCURRENT_DOCUMENTS").ok().and_then(|v| v.parse().ok()).filter(|v: &usize| *v > 0).unwrap_or(default.max_concurrent_documents),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            poll_interval_ms: std::env::var("POLL_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.poll_interval_ms),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            canonical_width: std::env::var("CANONICAL_WIDTH").ok().and_then(|v| v.parse().ok()).unwrap_or(default.canonical_width),
            canonical_height: std::env::var("CANONICAL_HEIGHT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.canonical_height),
            reference_width: std::env::var("REFERENCE_WIDTH").ok().and_then(|v| v.parse().ok()).unwrap_or(default.reference_width),
            reference_height: std::env::var("REFERENCE_HEIGHT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.reference_height),
            catalog_file: std::env::var("CATALOG_FILE").unwrap_or(default.catalog_file),
            input_folder: std::env::var("INPUT_FOLDER").unwrap_or(default.input_folder),
            exam_id: std::env::var("EXAM_ID").unwrap_or(default.exam_id),
            layout_file: std::env::var("LAYOUT_FILE").ok().filter(|v| !v.is_empty()),
            debug_output_dir: std::env::var("DEBUG_OUTPUT_DIR").ok().filter(|v| !v.is_empty()),
        }
    }

    /// 标准画布尺寸
    pub fn canonical_size(&self) -> crate::models::CanvasSize {
        crate::models::CanvasSize::new(self.canonical_width, self.canonical_height)
    }

    /// 旧版参考尺寸
    pub fn reference_size(&self) -> crate::models::CanvasSize {
        crate::models::CanvasSize::new(self.reference_width, self.reference_height)
    }
}
