//! LLM 视觉服务 - 业务能力层
//!
//! 只负责"看图回答"能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 图像以 base64 data URL 形式随用户消息发送
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ConfigError, ExternalServiceError};
use crate::infrastructure::{PageOcr, VisionClient, VisionRequest};

const SERVICE_NAME: &str = "vision-inference";

const SCORE_SYSTEM_PROMPT: &str = "你是阅卷助手。你会看到答题卡上手写分数框的截图，\
     只需要读出框内的数字。";

const STUDENT_NUMBER_PROMPT: &str = "这是一张答题卡的整页扫描。请找到学号（Öğrenci No）栏，\
     只返回学号数字本身；如果找不到学号，返回 NONE。";

/// LLM 视觉服务
///
/// 职责：
/// - 调用兼容 OpenAI 的多模态接口
/// - 只处理单张图像
/// - 不出现 Exam / BatchJob
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    has_credentials: bool,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.llm_model_name.clone(),
            has_credentials: !config.llm_api_key.trim().is_empty(),
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    /// - `images_png`: PNG 图像列表，会追加到用户消息中
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（已去除首尾空白）
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
        images_png: &[&[u8]],
    ) -> AppResult<String> {
        // 缺少凭证属于致命错误，整个文档流程都无法继续
        if !self.has_credentials {
            return Err(AppError::Config(ConfigError::MissingCredential {
                var_name: "LLM_API_KEY".to_string(),
            }));
        }

        debug!("调用 LLM API，模型: {}，图片 {} 张", self.model_name, images_png.len());

        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = if images_png.is_empty() {
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_message)
                .build()?
        } else {
            let mut content_parts: Vec<ChatCompletionRequestUserMessageContentPart> = Vec::new();

            content_parts.push(ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText {
                    text: user_message.to_string(),
                },
            ));

            for png in images_png {
                content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                    ChatCompletionRequestMessageContentPartImage {
                        image_url: ImageUrl {
                            url: png_data_url(png),
                            detail: Some(ImageDetail::High),
                        },
                    },
                ));
            }

            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
                .build()?
        };

        messages.push(ChatCompletionRequestMessage::User(user_msg));

        // 读数任务，温度取 0
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.0)
            .max_tokens(64u32)
            .build()?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            AppError::external(SERVICE_NAME, e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                AppError::ExternalService(ExternalServiceError::EmptyReply {
                    service: SERVICE_NAME.to_string(),
                })
            })?;

        Ok(content.trim().to_string())
    }
}

fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

fn student_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d{6,12}").expect("学号正则无效"))
}

/// 从 OCR 回复中取出学号；回复 NONE 或没有足够长的数字串时返回 None
pub fn parse_student_number_reply(reply: &str) -> Option<String> {
    if reply.trim().eq_ignore_ascii_case("none") {
        return None;
    }
    student_number_pattern()
        .find(reply)
        .map(|m| m.as_str().to_string())
}

#[async_trait]
impl VisionClient for LlmService {
    async fn ask(&self, request: VisionRequest) -> AppResult<String> {
        debug!("[{}] 发送视觉请求", request.label);
        self.send_to_llm(
            &request.prompt,
            Some(SCORE_SYSTEM_PROMPT),
            &[request.image_png.as_slice()],
        )
        .await
    }
}

#[async_trait]
impl PageOcr for LlmService {
    async fn read_student_number(&self, raster: &[u8]) -> AppResult<Option<String>> {
        let reply = self.send_to_llm(STUDENT_NUMBER_PROMPT, None, &[raster]).await?;
        let parsed = parse_student_number_reply(&reply);
        if parsed.is_none() {
            debug!("整页 OCR 未返回学号: {}", reply);
        }
        Ok(parsed)
    }
}
