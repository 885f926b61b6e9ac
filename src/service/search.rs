use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use super::shell::Counter;
use crate::client::envelope::SEARCH_ENVELOPE;
use crate::client::{extract_records, Backend};
use crate::error::{DeskError, DeskResult};
use crate::models::SearchResultRecord;

/// 搜索词最短长度 (字符)
pub const MIN_TERM_LEN: usize = 3;

pub const EMPTY_TERMS_MESSAGE: &str =
    "Please enter at least one product search term (3+ characters) separated by commas.";
pub const NO_RESULTS_MESSAGE: &str = "No API results found for the entered terms.";

fn term_failed_message(term: &str) -> String {
    format!("API Search failed for one or more terms (e.g., \"{term}\"). Check the URL or server.")
}

/// 按逗号或换行拆分，去空白，丢弃过短的词
pub fn split_terms(input: &str) -> Vec<String> {
    input
        .split([',', '\n'])
        .map(str::trim)
        .filter(|term| term.chars().count() >= MIN_TERM_LEN)
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchSnapshot {
    pub terms: Vec<String>,
    pub results: Vec<SearchResultRecord>,
    pub loading: bool,
    pub error: Option<String>,
}

/// 多词搜索: 逐词顺序请求，每个词返回后立即发布累计结果
pub struct SearchAggregator {
    backend: Arc<dyn Backend>,
    counter: Counter,
    state: watch::Sender<SearchSnapshot>,
    running: AtomicBool,
}

impl SearchAggregator {
    pub fn new(backend: Arc<dyn Backend>, counter: Counter) -> Self {
        let (state, _) = watch::channel(SearchSnapshot::default());
        Self {
            backend,
            counter,
            state,
            running: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SearchSnapshot {
        self.state.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 执行一次搜索，返回最终结果数
    ///
    /// 单个词失败只记录，不中断后续词；第一个失败的词决定错误文案。
    pub async fn run(&self, input: &str) -> DeskResult<usize> {
        let terms = split_terms(input);
        if terms.is_empty() {
            self.state.send_modify(|s| {
                s.terms.clear();
                s.results.clear();
                s.error = Some(EMPTY_TERMS_MESSAGE.to_string());
            });
            self.counter.set(0);
            return Err(DeskError::Validation(EMPTY_TERMS_MESSAGE.to_string()));
        }

        if self.running.swap(true, Ordering::SeqCst) {
            return Err(DeskError::Validation("A search is already running.".to_string()));
        }

        self.state.send_replace(SearchSnapshot {
            terms: terms.clone(),
            results: Vec::new(),
            loading: true,
            error: None,
        });
        info!("Searching {} terms: {:?}", terms.len(), terms);

        let mut first_error: Option<String> = None;
        let mut total = 0;

        for term in &terms {
            match self.backend.search(term).await {
                Ok(body) => {
                    let tagged: Vec<SearchResultRecord> = extract_records(body, SEARCH_ENVELOPE)
                        .into_iter()
                        .map(|record| SearchResultRecord::tag(record, term))
                        .collect();
                    info!("Term {:?}: {} results", term, tagged.len());
                    total += tagged.len();
                    self.counter.set(total);
                    self.state.send_modify(|s| s.results.extend(tagged));
                }
                Err(e) => {
                    warn!("Search for {:?} failed: {}", term, e);
                    if first_error.is_none() {
                        let message = term_failed_message(term);
                        self.state.send_modify(|s| s.error = Some(message.clone()));
                        first_error = Some(message);
                    }
                }
            }
        }

        let error = match first_error {
            Some(message) => Some(message),
            None if total == 0 => Some(NO_RESULTS_MESSAGE.to_string()),
            None => None,
        };
        self.state.send_modify(|s| {
            s.loading = false;
            s.error = error;
        });
        self.counter.set(total);
        self.running.store(false, Ordering::SeqCst);
        Ok(total)
    }
}
