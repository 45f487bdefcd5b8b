use anyhow::Result;
use answer_sheet_scoring::utils::logging;
use answer_sheet_scoring::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(config.verbose_logging, Some(&config.output_log_file))?;

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
