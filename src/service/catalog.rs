use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use super::pager::{Pager, ScrollMetrics};
use super::shell::Counter;
use super::timers::Timer;
use crate::client::envelope::PRODUCT_ENVELOPE;
use crate::client::{extract_records, Backend};
use crate::error::{DeskError, DeskResult};
use crate::models::VendorProductRecord;

/// 过滤防抖
pub const FILTER_DEBOUNCE: Duration = Duration::from_millis(300);
/// CSV 上传成功后延迟刷新
pub const REFRESH_AFTER_UPLOAD: Duration = Duration::from_secs(1);
/// 距底部小于等于该像素时加载下一页
pub const SCROLL_THRESHOLD: f64 = 50.0;
/// 不过滤状态
pub const ALL_STATUSES: &str = "All";

/// 商品列表视图的错误状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum CatalogError {
    /// 后端没有任何数据
    NoData,
    /// 有数据，但过滤后为空
    NoMatches,
    Fetch(String),
    Upload(String),
}

impl CatalogError {
    pub fn message(&self) -> String {
        match self {
            CatalogError::NoData => {
                "No data found in API response. Please upload a CSV file.".to_string()
            }
            CatalogError::NoMatches => "No results found matching the current filters.".to_string(),
            CatalogError::Fetch(reason) => format!(
                "Error fetching data: {reason}. Make sure the Database API URL is correct."
            ),
            CatalogError::Upload(reason) => format!("Error uploading CSV: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogSnapshot {
    pub loading: bool,
    pub loaded: bool,
    pub search: String,
    pub status: String,
    /// 缓存总数
    pub total: usize,
    /// 过滤后数量
    pub filtered: usize,
    pub displayed: Vec<VendorProductRecord>,
    pub has_more: bool,
    pub error: Option<CatalogError>,
    pub error_message: Option<String>,
}

struct CatalogView {
    search: String,
    status: String,
    filtered: Arc<Vec<VendorProductRecord>>,
    pager: Pager,
    loading: bool,
    error: Option<CatalogError>,
}

/// 请求期间置 loading；请求完成或被取消时复位
struct LoadingGuard<'a>(&'a Mutex<CatalogView>);

impl<'a> LoadingGuard<'a> {
    fn start(view: &'a Mutex<CatalogView>) -> Self {
        let mut state = view.lock();
        state.loading = true;
        state.error = None;
        Self(view)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().loading = false;
    }
}

/// 供应商商品库的会话级缓存 + 过滤分页视图
///
/// 缓存只在成功拉取后整体替换；拉取失败只清空视图，保留上一次的数据。
pub struct ProductCatalog {
    backend: Arc<dyn Backend>,
    counter: Counter,
    page_size: usize,
    cache: Mutex<Arc<Vec<VendorProductRecord>>>,
    loaded: AtomicBool,
    view: Mutex<CatalogView>,
    debounce: Timer,
    refresh: Timer,
}

fn filter_active(search: &str, status: &str) -> bool {
    !search.trim().is_empty() || status != ALL_STATUSES
}

fn record_matches(record: &VendorProductRecord, term: &str, status: &str) -> bool {
    let matches_search = term.is_empty()
        || record.item_description().to_lowercase().contains(term)
        || record.primary_buyer().to_lowercase().contains(term)
        || record.id().to_lowercase().contains(term);
    let matches_status = status == ALL_STATUSES || record.status().eq_ignore_ascii_case(status);
    matches_search && matches_status
}

impl ProductCatalog {
    pub fn new(backend: Arc<dyn Backend>, counter: Counter, page_size: usize) -> Self {
        Self {
            backend,
            counter,
            page_size,
            cache: Mutex::new(Arc::new(Vec::new())),
            loaded: AtomicBool::new(false),
            view: Mutex::new(CatalogView {
                search: String::new(),
                status: ALL_STATUSES.to_string(),
                filtered: Arc::new(Vec::new()),
                pager: Pager::empty(page_size),
                loading: false,
                error: None,
            }),
            debounce: Timer::new(),
            refresh: Timer::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    /// 当前缓存快照
    pub fn cached(&self) -> Arc<Vec<VendorProductRecord>> {
        self.cache.lock().clone()
    }

    /// 拉取全量商品；已加载且非强制刷新时直接返回
    pub async fn fetch_all(&self, force_refresh: bool) -> DeskResult<()> {
        if self.is_loaded() && !force_refresh {
            return Ok(());
        }

        let fetched = {
            let _loading = LoadingGuard::start(&self.view);
            self.backend.fetch_products().await
        };

        match fetched {
            Ok(body) => {
                let records = extract_records(body, PRODUCT_ENVELOPE);
                let total = records.len();
                *self.cache.lock() = Arc::new(records);
                self.loaded.store(true, Ordering::SeqCst);
                self.counter.set(total);
                info!("Product cache loaded: {} records", total);

                let mut view = self.view.lock();
                self.refilter(&mut view);
                Ok(())
            }
            Err(e) => {
                // 缓存保留上一次成功拉取的数据
                warn!("Product fetch failed: {}", e);
                let mut view = self.view.lock();
                view.filtered = Arc::new(Vec::new());
                view.pager = Pager::empty(self.page_size);
                view.error = Some(CatalogError::Fetch(e.to_string()));
                Err(e)
            }
        }
    }

    /// 按当前条件重新过滤并回到第一页
    pub fn filter_and_page(&self, search: &str, status: &str) {
        let mut view = self.view.lock();
        view.search = search.to_string();
        view.status = status.to_string();
        self.refilter(&mut view);
    }

    /// 300ms 防抖后再过滤
    pub fn set_filter(self: &Arc<Self>, search: String, status: String) {
        let catalog = Arc::clone(self);
        self.debounce.schedule(FILTER_DEBOUNCE, async move {
            if catalog.cached().is_empty() {
                return;
            }
            catalog.filter_and_page(&search, &status);
        });
    }

    fn refilter(&self, view: &mut CatalogView) {
        let cache = self.cached();
        let term = view.search.trim().to_lowercase();
        let status = view.status.clone();

        let filtered: Vec<VendorProductRecord> = cache
            .par_iter()
            .filter(|record| record_matches(record, &term, &status))
            .cloned()
            .collect();

        view.pager = Pager::first_page(self.page_size, filtered.len());
        view.error = if cache.is_empty() {
            Some(CatalogError::NoData)
        } else if filtered.is_empty() && filter_active(&view.search, &view.status) {
            Some(CatalogError::NoMatches)
        } else {
            None
        };
        view.filtered = Arc::new(filtered);
    }

    /// 追加下一页，返回是否有新增
    pub fn load_more(&self) -> bool {
        let mut view = self.view.lock();
        if view.loading {
            return false;
        }
        let total = view.filtered.len();
        view.pager.load_more(total)
    }

    /// 滚动到接近底部时加载更多
    pub fn on_scroll(&self, metrics: ScrollMetrics) -> bool {
        metrics.remaining() <= SCROLL_THRESHOLD && self.load_more()
    }

    /// 上传 CSV；成功后标记未加载并在 1 秒后强制刷新
    pub async fn upload_csv(self: &Arc<Self>, file_name: String, bytes: Vec<u8>) -> DeskResult<()> {
        if bytes.is_empty() {
            return Err(DeskError::Validation("No file selected.".to_string()));
        }

        let result = {
            let _loading = LoadingGuard::start(&self.view);
            self.backend.upload_csv(file_name, bytes).await
        };

        match result {
            Ok(()) => {
                self.loaded.store(false, Ordering::SeqCst);
                let catalog = Arc::clone(self);
                self.refresh.schedule(REFRESH_AFTER_UPLOAD, async move {
                    if let Err(e) = catalog.fetch_all(true).await {
                        warn!("Refresh after upload failed: {}", e);
                    }
                });
                Ok(())
            }
            Err(e) => {
                let reason = match &e {
                    DeskError::Upstream(message) => message.clone(),
                    other => other.to_string(),
                };
                warn!("CSV upload failed: {}", reason);
                self.view.lock().error = Some(CatalogError::Upload(reason));
                Err(e)
            }
        }
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        let total = self.cached().len();
        let view = self.view.lock();
        let filtered = view.filtered.len();
        CatalogSnapshot {
            loading: view.loading,
            loaded: self.is_loaded(),
            search: view.search.clone(),
            status: view.status.clone(),
            total,
            filtered,
            displayed: view.pager.window(&view.filtered).to_vec(),
            has_more: view.pager.has_more(filtered),
            error: view.error.clone(),
            error_message: view.error.as_ref().map(CatalogError::message),
        }
    }
}
