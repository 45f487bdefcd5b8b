use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 提交前校验失败（批次不会被创建）
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),
    /// 资源不存在
    #[error("未找到: {0}")]
    NotFound(#[from] NotFoundError),
    /// 唯一性冲突
    #[error("冲突: {0}")]
    Conflict(#[from] ConflictError),
    /// 外部服务（视觉推理 / OCR / 栅格化）错误
    #[error("外部服务错误: {0}")]
    ExternalService(#[from] ExternalServiceError),
    /// 图像处理错误
    #[error("图像处理错误: {0}")]
    Image(#[from] ImageError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 校验错误
#[derive(Debug, Error)]
pub enum ValidationError {
    /// 没有提交任何文档
    #[error("至少需要提交一个文档")]
    EmptyDocumentList,
    /// 考试定义不合法
    #[error("考试 {exam_id} 定义不合法: {reason}")]
    InvalidExam { exam_id: String, reason: String },
    /// 答题卡布局与考试不匹配
    #[error("考试 {exam_id} 的答题卡布局不合法: {reason}")]
    InvalidLayout { exam_id: String, reason: String },
    /// 分数不合法
    #[error("分数 {score} 超出范围 [0, {max_score}]")]
    ScoreOutOfRange { score: u32, max_score: u32 },
    /// 学号为空
    #[error("学号不能为空")]
    EmptyStudentNumber,
    /// 文件名与整页 OCR 都没有得到学号
    #[error("无法识别文档 {file_name} 的学号")]
    StudentNumberNotFound { file_name: String },
}

/// 资源不存在错误
#[derive(Debug, Error)]
pub enum NotFoundError {
    #[error("考试不存在: {exam_id}")]
    Exam { exam_id: String },
    #[error("课程不存在: {course_id}")]
    Course { course_id: String },
    #[error("批次不存在: {batch_id}")]
    Batch { batch_id: String },
}

/// 唯一性冲突错误
#[derive(Debug, Error)]
pub enum ConflictError {
    /// (学号, 考试) 已存在成绩
    #[error("学号 {student_number} 在考试 {exam_id} 中已有成绩记录")]
    DuplicateResult {
        student_number: String,
        exam_id: String,
    },
    /// 同 ID 的批次已存在
    #[error("批次已存在: {batch_id}")]
    DuplicateBatch { batch_id: String },
}

/// 外部服务错误
#[derive(Debug, Error)]
pub enum ExternalServiceError {
    /// 请求失败
    #[error("{service} 调用失败: {source}")]
    RequestFailed {
        service: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 服务返回内容为空
    #[error("{service} 返回内容为空")]
    EmptyReply { service: String },
    /// 无法从回复中解析出整数
    #[error("无法从回复中解析分数: {reply}")]
    UnparseableReply { reply: String },
    /// 文档格式无法栅格化
    #[error("无法栅格化文档 {file_name}: {reason}")]
    RasterFailed { file_name: String, reason: String },
}

/// 图像处理错误
#[derive(Debug, Error)]
pub enum ImageError {
    /// 解码失败
    #[error("图像解码失败: {0}")]
    Decode(#[from] image::ImageError),
    /// 透视变换失败
    #[error("透视变换失败: {reason}")]
    WarpFailed { reason: String },
    /// 区域无法放入图像内
    #[error("区域 ({x}, {y}, {width}x{height}) 超出图像范围 {image_width}x{image_height}")]
    RegionOutOfBounds {
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        image_width: u32,
        image_height: u32,
    },
    /// 调试拼图失败
    #[error("拼图失败: {reason}")]
    ComposeFailed { reason: String },
    /// 无法恢复的归一化失败
    #[error("页面无法归一化: {reason}")]
    Unrecoverable { reason: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 缺少凭证
    #[error("缺少凭证: {var_name}")]
    MissingCredential { var_name: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("目录不存在: {path}")]
    DirectoryNotFound { path: String },
}

// ========== 从常见错误类型转换 ==========
// anyhow 已经为所有实现了 std::error::Error 的类型提供了自动转换

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Other(format!("JSON处理失败: {}", err))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::File(FileError::TomlParseFailed {
            path: String::new(), // TOML错误通常不包含路径信息
            source: err,
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: err,
        })
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Image(ImageError::Decode(err))
    }
}

impl From<async_openai::error::OpenAIError> for AppError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        AppError::external("vision-inference", err)
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Other(format!("后台任务执行失败: {}", err))
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建外部服务调用错误
    pub fn external(
        service: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::ExternalService(ExternalServiceError::RequestFailed {
            service: service.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    pub fn exam_not_found(exam_id: impl Into<String>) -> Self {
        AppError::NotFound(NotFoundError::Exam {
            exam_id: exam_id.into(),
        })
    }

    pub fn course_not_found(course_id: impl Into<String>) -> Self {
        AppError::NotFound(NotFoundError::Course {
            course_id: course_id.into(),
        })
    }

    pub fn batch_not_found(batch_id: impl Into<String>) -> Self {
        AppError::NotFound(NotFoundError::Batch {
            batch_id: batch_id.into(),
        })
    }

    /// 致命错误：整个文档流程无法继续（例如缺少凭证）
    ///
    /// 其余错误在区域级别被吸收为 0 分并记录原因。
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Config(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
