//! sweetpos 服务入口

mod logger;

use anyhow::Context;
use sweetpos_core::database::open_connection;
use sweetpos_core::Config;
use sweetpos_server::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("加载配置失败")?;
    logger::init(&config.logging)?;

    tracing::info!("[Main] sweetpos v{} 启动中", sweetpos_core::version());
    let db = open_connection(&config.database_url)
        .with_context(|| format!("打开数据库失败: {}", config.database_url))?;
    let state = AppState::new(db, config.clone());

    // 启动时预热一次；失败不退出，首个请求会重试
    if let Err(err) = state.gate.ensure_schema().await {
        tracing::warn!("[Main] 启动时结构检查失败: {}", err);
    }

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("监听 {addr} 失败"))?;
    tracing::info!("[Main] 监听 http://{}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("[Main] 已退出");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("[Main] 监听退出信号失败: {}", err);
    }
}
