/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use anyhow::Result;
use std::fs::{self, OpenOptions};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::models::BatchJob;

/// 初始化 tracing
///
/// - `RUST_LOG` 优先；否则 verbose 时为 debug，默认 info
/// - 指定日志文件时先写入文件头，再追加一份无颜色的日志
pub fn init(verbose: bool, log_file_path: Option<&str>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let stdout_layer = fmt::layer().with_target(false);

    let file_layer = match log_file_path {
        Some(path) => {
            init_log_file(path)?;
            let file = OpenOptions::new().append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;
    Ok(())
}

/// 初始化日志文件（覆盖旧内容并写入文件头）
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n答题卡评分日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(max_concurrent: usize, exam_id: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 答题卡批量评分模式");
    info!("📝 考试: {}", exam_id);
    info!("📊 最大并发数: {}", max_concurrent);
    info!("{}", "=".repeat(60));
}

/// 记录文档加载信息
pub fn log_documents_loaded(total: usize, max_concurrent: usize) {
    info!("✓ 找到 {} 个待处理的答题卡", total);
    info!("📋 最多同时处理 {} 个", max_concurrent);
}

/// 打印最终统计信息
pub fn print_final_stats(job: &BatchJob, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", job.success_count, job.total_files);
    info!("❌ 失败: {}", job.failed_count);

    let fallback = job
        .file_statuses
        .iter()
        .filter(|s| s.used_template_fallback)
        .count();
    if fallback > 0 {
        info!("📐 模板兜底: {}", fallback);
    }
    for status in job.file_statuses.iter().filter(|s| !s.is_success()) {
        info!("   - {}: {}", status.file_name, truncate_text(&status.message, 80));
    }

    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("学号识别失败原因", 4), "学号识别...");
    }

    #[test]
    fn test_init_log_file_writes_header() {
        let path = std::env::temp_dir().join(format!("scoring-log-{}.txt", uuid::Uuid::new_v4()));
        let path_str = path.to_string_lossy().to_string();
        init_log_file(&path_str).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("答题卡评分日志"));
        let _ = fs::remove_file(&path);
    }
}
