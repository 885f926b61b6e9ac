use tracing::info;
use tracing_subscriber::{fmt::time::ChronoLocal, EnvFilter};
use vendor_desk::{api, AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 本地时间格式，级别由 RUST_LOG 控制
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config);
    if config.webhooks.rfq_url.is_empty() {
        info!("RFQ webhook not configured; sending RFQs will fail until DESK__WEBHOOKS__RFQ_URL is set");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config)?;
    // 上次会话未退出时直接开始轮询
    state.resume();

    let app = api::router(state);

    // 启动服务器
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/session/login         - Login");
    info!("  GET  /api/matching              - Customer requests board");
    info!("  GET  /api/products              - Vendor product catalog");
    info!("  POST /api/search                - Multi-term vendor search");
    info!("  POST /api/search/export-all     - Export grouped results as CSV");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
