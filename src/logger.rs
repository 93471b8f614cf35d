//! 日志初始化
//!
//! `logging.level` 使用 EnvFilter 语法；`logging.json` 为 true 时按 JSON 行输出。

use sweetpos_core::config::LoggingConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| anyhow::anyhow!("日志级别无效 {}: {}", config.level, e))?;

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init()?;
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()?;
    }
    Ok(())
}
