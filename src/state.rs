use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::client::{Backend, HttpBackend, HttpWebhooks, Webhooks};
use crate::config::AppConfig;
use crate::error::DeskResult;
use crate::service::{
    DirectoryExport, ExportSink, FileStore, KeyValueStore, LoginGate, MatchingBoard, NavCounters,
    ProductCatalog, SearchAggregator, SearchWorkspace, Shell,
};

/// 操作员会话的全部视图状态
pub struct AppState {
    pub config: AppConfig,
    pub gate: LoginGate,
    pub shell: Arc<Shell>,
    pub catalog: Arc<ProductCatalog>,
    pub search: Arc<SearchWorkspace>,
    pub board: Arc<MatchingBoard>,
    pub exports: Arc<dyn ExportSink>,
}

impl AppState {
    /// 用真实的 HTTP 客户端和文件存储组装
    pub fn new(config: AppConfig) -> DeskResult<Arc<Self>> {
        let backend = Arc::new(HttpBackend::new(config.backend.clone())?);
        let webhooks = Arc::new(HttpWebhooks::new(config.webhooks.clone())?);
        let store = Arc::new(FileStore::new(&config.auth.storage_path));
        let exports = Arc::new(DirectoryExport::new(&config.ui.export_dir));
        Ok(Self::with_parts(config, backend, webhooks, store, exports))
    }

    pub fn with_parts(
        config: AppConfig,
        backend: Arc<dyn Backend>,
        webhooks: Arc<dyn Webhooks>,
        store: Arc<dyn KeyValueStore>,
        exports: Arc<dyn ExportSink>,
    ) -> Arc<Self> {
        let counters = NavCounters::default();
        let page_size = config.ui.page_size;

        let catalog = Arc::new(ProductCatalog::new(
            Arc::clone(&backend),
            counters.products.clone(),
            page_size,
        ));
        let search = Arc::new(SearchWorkspace::new(
            SearchAggregator::new(Arc::clone(&backend), counters.search.clone()),
            page_size,
        ));
        let board = Arc::new(MatchingBoard::new(
            backend,
            webhooks,
            counters.matching.clone(),
            Duration::from_secs(config.ui.poll_interval_secs.max(1)),
        ));

        Arc::new(Self {
            gate: LoginGate::new(store, &config.auth),
            shell: Arc::new(Shell::new(counters)),
            catalog,
            search,
            board,
            exports,
            config,
        })
    }

    /// 已登录时开始轮询 (进程重启后恢复会话)
    pub fn resume(&self) {
        if self.gate.is_logged_in() {
            info!("Restored logged-in session");
            self.board.start_polling();
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> DeskResult<()> {
        self.gate.login(email, password).await?;
        if !self.board.is_polling() {
            self.board.start_polling();
        }
        Ok(())
    }

    pub fn logout(&self) -> DeskResult<()> {
        self.board.stop_polling();
        self.gate.logout()
    }
}
