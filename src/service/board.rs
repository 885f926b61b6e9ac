use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::notice::Prompt;
use super::offer;
use super::rfq::{rfq_key, RfqDispatcher};
use super::shell::Counter;
use super::timers::Timer;
use crate::client::envelope::REQUEST_ENVELOPE;
use crate::client::{extract_items, Backend, Webhooks};
use crate::error::{DeskError, DeskResult};
use crate::models::{
    derive_mock_response, BulkOutcome, CustomerDetails, MainRow, MatchData, MatchingRequestGroup,
    ResponseView, RfqStatus, RfqSummary, VendorMatchEntry,
};

/// 新条目高亮时长
pub const HIGHLIGHT_DURATION: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize)]
pub struct VendorView {
    pub index: usize,
    #[serde(flatten)]
    pub entry: VendorMatchEntry,
    pub rfq_status: Option<RfqStatus>,
    pub selected: bool,
    pub has_response: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupView {
    /// 未过滤列表中的位置 (仅用于展示，轮询后会变化)
    pub index: usize,
    /// 后续操作都用匹配号寻址
    pub match_id: String,
    pub is_new: bool,
    pub main_row: MainRow,
    pub rfq_summary: RfqSummary,
    pub rfq_status: String,
    pub can_expand: bool,
    pub selected_count: usize,
    pub vendors: Vec<VendorView>,
}

/// 供应商回复弹窗
#[derive(Debug, Clone, Serialize)]
pub struct ResponseModal {
    pub match_id: String,
    pub vendor: usize,
    pub match_data: MatchData,
    pub response: ResponseView,
    pub offer_price: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardSnapshot {
    pub loading: bool,
    pub error: Option<String>,
    /// 配置错误不可重试
    pub retryable: bool,
    pub total: usize,
    pub filter: String,
    pub groups: Vec<GroupView>,
    pub modal: Option<ResponseModal>,
}

#[derive(Debug, Default)]
struct BoardState {
    groups: Arc<Vec<MatchingRequestGroup>>,
    new_entries: BTreeSet<usize>,
    loading: bool,
    error: Option<String>,
    retryable: bool,
    /// 匹配号 -> 已勾选的供应商位置
    selected: HashMap<String, BTreeSet<usize>>,
    modal: Option<ResponseModal>,
}

/// 拉取期间置 loading；完成或被取消时复位
struct LoadingGuard<'a>(&'a Mutex<BoardState>);

impl<'a> LoadingGuard<'a> {
    fn start(state: &'a Mutex<BoardState>) -> Self {
        let mut board = state.lock();
        board.loading = true;
        board.error = None;
        Self(state)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().loading = false;
    }
}

/// 客户需求匹配看板
pub struct MatchingBoard {
    backend: Arc<dyn Backend>,
    webhooks: Arc<dyn Webhooks>,
    dispatcher: RfqDispatcher,
    counter: Counter,
    poll_interval: Duration,
    state: Arc<Mutex<BoardState>>,
    highlight: Timer,
    poll: Timer,
}

fn load_error(e: &DeskError) -> String {
    match e {
        DeskError::Config(_) => e.to_string(),
        other => format!(
            "Failed to load data. Ensure API is running and URL is correct. Error: {other}"
        ),
    }
}

impl MatchingBoard {
    pub fn new(
        backend: Arc<dyn Backend>,
        webhooks: Arc<dyn Webhooks>,
        counter: Counter,
        poll_interval: Duration,
    ) -> Self {
        Self {
            dispatcher: RfqDispatcher::new(Arc::clone(&webhooks)),
            backend,
            webhooks,
            counter,
            poll_interval,
            state: Arc::new(Mutex::new(BoardState {
                retryable: true,
                ..BoardState::default()
            })),
            highlight: Timer::new(),
            poll: Timer::new(),
        }
    }

    pub fn dispatcher(&self) -> &RfqDispatcher {
        &self.dispatcher
    }

    /// 拉取全部客户需求，最新的排在最前
    pub async fn fetch(&self) -> DeskResult<usize> {
        let fetched = {
            let _loading = LoadingGuard::start(&self.state);
            self.backend.fetch_customer_requests().await
        };

        let body = match fetched {
            Ok(body) => body,
            Err(e) => {
                warn!("Customer request fetch failed: {}", e);
                let mut state = self.state.lock();
                state.retryable = !matches!(e, DeskError::Config(_));
                state.error = Some(load_error(&e));
                return Err(e);
            }
        };

        let mut items = extract_items(body, REQUEST_ENVELOPE);
        items.reverse();
        let groups: Vec<MatchingRequestGroup> = items
            .iter()
            .filter_map(Value::as_object)
            .map(MatchingRequestGroup::from_request)
            .collect();
        let total = groups.len();

        let highlighted = {
            let mut state = self.state.lock();
            let previous = state.groups.len();
            let grew = previous > 0 && total > previous;
            if grew {
                // 按位置标记，新条目在最前
                state.new_entries = (0..total - previous).collect();
            }
            state
                .selected
                .retain(|match_id, _| groups.iter().any(|g| g.main_row.match_id == *match_id));
            state.groups = Arc::new(groups);
            state.retryable = true;
            grew
        };

        if highlighted {
            info!("{} new customer requests", self.state.lock().new_entries.len());
            let state = Arc::clone(&self.state);
            self.highlight.schedule(HIGHLIGHT_DURATION, async move {
                state.lock().new_entries.clear();
            });
        }
        self.counter.set(total);
        Ok(total)
    }

    /// 立即拉取一次，之后按间隔轮询
    pub fn start_polling(self: &Arc<Self>) {
        let board = Arc::downgrade(self);
        info!("Polling customer requests every {:?}", self.poll_interval);
        self.poll.repeat(self.poll_interval, move || {
            let board = board.clone();
            async move {
                if let Some(board) = board.upgrade() {
                    // 错误已记录在看板状态中
                    let _ = board.fetch().await;
                }
            }
        });
    }

    pub fn stop_polling(&self) {
        self.poll.cancel();
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_pending()
    }

    fn group(&self, match_id: &str) -> DeskResult<MatchingRequestGroup> {
        self.state
            .lock()
            .groups
            .iter()
            .find(|group| group.main_row.match_id == match_id)
            .cloned()
            .ok_or_else(|| DeskError::NotFound(format!("request {match_id}")))
    }

    fn entry(&self, match_id: &str, vendor: usize) -> DeskResult<VendorMatchEntry> {
        self.group(match_id)?
            .vendors
            .get(vendor)
            .cloned()
            .ok_or_else(|| DeskError::NotFound(format!("vendor #{vendor} of request {match_id}")))
    }

    pub fn snapshot(&self, filter: &str) -> BoardSnapshot {
        let state = self.state.lock();
        let groups = state
            .groups
            .iter()
            .enumerate()
            .filter(|(_, group)| group.matches_filter(filter))
            .map(|(index, group)| {
                let selected = state.selected.get(&group.main_row.match_id);
                let vendors = group
                    .vendors
                    .iter()
                    .enumerate()
                    .map(|(v, entry)| VendorView {
                        index: v,
                        rfq_status: self.dispatcher.status(&rfq_key(entry)),
                        selected: selected.is_some_and(|s| s.contains(&v)),
                        has_response: entry.response.has_response(),
                        entry: entry.clone(),
                    })
                    .collect();
                let summary = group.rfq_summary();
                GroupView {
                    index,
                    match_id: group.main_row.match_id.clone(),
                    is_new: state.new_entries.contains(&index),
                    main_row: group.main_row.clone(),
                    rfq_summary: summary,
                    rfq_status: summary.to_string(),
                    can_expand: group.can_expand(),
                    selected_count: selected.map_or(0, BTreeSet::len),
                    vendors,
                }
            })
            .collect();

        BoardSnapshot {
            loading: state.loading,
            error: state.error.clone(),
            retryable: state.retryable,
            total: state.groups.len(),
            filter: filter.to_string(),
            groups,
            modal: state.modal.clone(),
        }
    }

    pub fn customer_details(&self, match_id: &str) -> DeskResult<CustomerDetails> {
        Ok(self.group(match_id)?.customer_details())
    }

    /// 切换勾选，返回切换后的状态
    pub fn toggle_select(&self, match_id: &str, vendor: usize) -> DeskResult<bool> {
        self.entry(match_id, vendor)?;
        let mut state = self.state.lock();
        let selected = state.selected.entry(match_id.to_string()).or_default();
        if selected.remove(&vendor) {
            Ok(false)
        } else {
            selected.insert(vendor);
            Ok(true)
        }
    }

    pub async fn send_rfq(&self, match_id: &str, vendor: usize, prompt: &dyn Prompt) -> DeskResult<()> {
        let entry = self.entry(match_id, vendor)?;
        self.dispatcher.send_single(&entry, prompt).await
    }

    pub async fn send_all(&self, match_id: &str, prompt: &dyn Prompt) -> DeskResult<Option<BulkOutcome>> {
        let vendors = self.group(match_id)?.vendors;
        self.dispatcher.send_bulk(&vendors, prompt).await
    }

    /// 发送已勾选的供应商，结束后清空所有勾选
    pub async fn send_selected(
        &self,
        match_id: &str,
        prompt: &dyn Prompt,
    ) -> DeskResult<Option<BulkOutcome>> {
        let vendors = self.group(match_id)?.vendors;
        let chosen: Vec<VendorMatchEntry> = {
            let state = self.state.lock();
            let selected = state.selected.get(match_id).cloned().unwrap_or_default();
            vendors
                .into_iter()
                .enumerate()
                .filter(|(v, _)| selected.contains(v))
                .map(|(_, entry)| entry)
                .collect()
        };
        if chosen.is_empty() {
            return Err(DeskError::Validation("No vendors selected.".to_string()));
        }

        let result = self.dispatcher.send_bulk(&chosen, prompt).await;
        self.state.lock().selected.clear();
        result
    }

    pub fn open_response(&self, match_id: &str, vendor: usize) -> DeskResult<ResponseModal> {
        let entry = self.entry(match_id, vendor)?;
        let modal = ResponseModal {
            match_id: match_id.to_string(),
            vendor,
            match_data: MatchData::from_entry(&entry),
            response: derive_mock_response(&entry.record),
            offer_price: String::new(),
        };
        self.state.lock().modal = Some(modal.clone());
        Ok(modal)
    }

    pub fn close_response(&self) {
        self.state.lock().modal = None;
    }

    /// 发送报价；成功后关闭弹窗，失败保留弹窗和输入
    pub async fn send_offer(&self, price: &str, prompt: &dyn Prompt) -> DeskResult<bool> {
        let modal = {
            let mut state = self.state.lock();
            let modal = state
                .modal
                .as_mut()
                .ok_or_else(|| DeskError::NotFound("open response view".to_string()))?;
            modal.offer_price = price.to_string();
            modal.clone()
        };

        let sent = offer::send_offer(
            &*self.webhooks,
            &modal.match_data,
            &modal.response,
            price,
            prompt,
        )
        .await?;
        if sent {
            self.state.lock().modal = None;
        }
        Ok(sent)
    }
}
