//! 测试用的假后端 / 假 webhook

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::client::{Backend, Webhooks};
use crate::error::{DeskError, DeskResult};
use crate::models::{OfferPayload, RfqPayload};

/// 让已就绪的后台任务跑完
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

fn replay(queue: &Mutex<VecDeque<Result<Value, String>>>, fallback: &Value) -> DeskResult<Value> {
    match queue.lock().pop_front() {
        Some(Ok(value)) => Ok(value),
        Some(Err(message)) => Err(DeskError::Upstream(message)),
        None => Ok(fallback.clone()),
    }
}

#[derive(Default)]
pub struct FakeBackend {
    pub products: Mutex<VecDeque<Result<Value, String>>>,
    pub requests: Mutex<VecDeque<Result<Value, String>>>,
    pub search_results: Mutex<HashMap<String, Result<Value, String>>>,
    pub upload_result: Mutex<Option<String>>,
    pub product_calls: Mutex<usize>,
    pub search_calls: Mutex<Vec<String>>,
    pub uploads: Mutex<Vec<(String, usize)>>,
    /// 商品请求的模拟网络耗时
    pub product_delay: Mutex<Option<Duration>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_products(&self, response: Result<Value, &str>) {
        self.products
            .lock()
            .push_back(response.map_err(str::to_string));
    }

    pub fn push_requests(&self, response: Result<Value, &str>) {
        self.requests
            .lock()
            .push_back(response.map_err(str::to_string));
    }

    pub fn set_search(&self, term: &str, response: Result<Value, &str>) {
        self.search_results
            .lock()
            .insert(term.to_string(), response.map_err(str::to_string));
    }

    pub fn fail_uploads(&self, message: &str) {
        *self.upload_result.lock() = Some(message.to_string());
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn fetch_products(&self) -> DeskResult<Value> {
        *self.product_calls.lock() += 1;
        let delay = *self.product_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        replay(&self.products, &Value::Array(Vec::new()))
    }

    async fn upload_csv(&self, file_name: String, bytes: Vec<u8>) -> DeskResult<()> {
        self.uploads.lock().push((file_name, bytes.len()));
        match self.upload_result.lock().clone() {
            Some(message) => Err(DeskError::Upstream(message)),
            None => Ok(()),
        }
    }

    async fn search(&self, term: &str) -> DeskResult<Value> {
        self.search_calls.lock().push(term.to_string());
        tokio::task::yield_now().await;
        match self.search_results.lock().get(term).cloned() {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(DeskError::Upstream(message)),
            None => Ok(Value::Array(Vec::new())),
        }
    }

    async fn fetch_customer_requests(&self) -> DeskResult<Value> {
        replay(&self.requests, &Value::Array(Vec::new()))
    }
}

#[derive(Default)]
pub struct FakeWebhooks {
    pub rfqs: Mutex<Vec<RfqPayload>>,
    pub offers: Mutex<Vec<OfferPayload>>,
    pub failing_items: Mutex<HashSet<String>>,
    pub fail_offers: Mutex<bool>,
    pub unconfigured: bool,
    /// RFQ 请求的模拟网络耗时
    pub delay: Mutex<Option<Duration>>,
}

impl FakeWebhooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_item(&self, vendor_item_id: &str) {
        self.failing_items.lock().insert(vendor_item_id.to_string());
    }
}

#[async_trait]
impl Webhooks for FakeWebhooks {
    fn rfq_configured(&self) -> bool {
        !self.unconfigured
    }

    async fn send_rfq(&self, payload: &RfqPayload) -> DeskResult<()> {
        let delay = *self.delay.lock();
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        if self.failing_items.lock().contains(&payload.vendor_item_id) {
            return Err(DeskError::Status {
                status: 500,
                body: "webhook down".to_string(),
            });
        }
        self.rfqs.lock().push(payload.clone());
        Ok(())
    }

    async fn send_offer(&self, payload: &OfferPayload) -> DeskResult<()> {
        if *self.fail_offers.lock() {
            return Err(DeskError::Status {
                status: 503,
                body: String::new(),
            });
        }
        self.offers.lock().push(payload.clone());
        Ok(())
    }
}
