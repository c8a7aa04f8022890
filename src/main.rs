use anyhow::Result;
use nichevault::utils::logging;
use nichevault::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    let reply = App::initialize(config)?.run().await?;

    if !reply.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
