//! 分数读取 - 业务能力层
//!
//! 包装视觉推理调用，把自由文本回复归一化为有界的非负整数。
//! 本层只返回错误，是否吸收为 0 分由流程层决定。

use image::{DynamicImage, ImageFormat};
use regex::Regex;
use std::io::Cursor;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::error::{AppError, AppResult, ExternalServiceError};
use crate::infrastructure::{VisionClient, VisionRequest};
use crate::utils::logging::truncate_text;

/// 读分提示
#[derive(Debug, Clone)]
pub struct ScoreHint {
    pub question_number: u32,
    /// 结果上限（考试满分）
    pub max_score: u32,
    pub label: String,
}

fn integer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-?[0-9]+").expect("整数正则无效"))
}

/// 回复中必须恰好有一个非负整数，结果截断到 `max_score`
///
/// 回复里出现多个数字（例如复述了题号）时无法判断哪个是分数，按无法解析处理。
pub fn parse_score(reply: &str, max_score: u32) -> AppResult<u32> {
    let unparseable = || {
        AppError::ExternalService(ExternalServiceError::UnparseableReply {
            reply: reply.to_string(),
        })
    };

    let mut tokens = integer_pattern().find_iter(reply);
    let token = tokens.next().ok_or_else(unparseable)?;
    if tokens.next().is_some() || token.as_str().starts_with('-') {
        return Err(unparseable());
    }

    // 超出 u64 的数字串只可能大于满分
    let value = token.as_str().parse::<u64>().unwrap_or(u64::MAX);
    Ok(value.min(max_score as u64) as u32)
}

fn encode_png(image: &DynamicImage) -> AppResult<Vec<u8>> {
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}

pub struct ScoreReader {
    vision: Arc<dyn VisionClient>,
}

impl ScoreReader {
    pub fn new(vision: Arc<dyn VisionClient>) -> Self {
        Self { vision }
    }

    fn build_prompt(hint: &ScoreHint) -> String {
        format!(
            "这是第 {} 题的得分框。只返回框内手写的整数分数（0 到 {}），不要返回其他内容。",
            hint.question_number, hint.max_score
        )
    }

    pub async fn read_score(&self, region: &DynamicImage, hint: &ScoreHint) -> AppResult<u32> {
        let request = VisionRequest {
            image_png: encode_png(region)?,
            prompt: Self::build_prompt(hint),
            label: hint.label.clone(),
        };

        let reply = self.vision.ask(request).await?;
        let score = parse_score(&reply, hint.max_score)?;
        debug!("[{}] 回复 '{}' → {} 分", hint.label, truncate_text(&reply, 40), score);
        Ok(score)
    }
}
