use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{error, info, warn};

use super::notice::Prompt;
use super::timers::{Timer, TimerGroup};
use crate::client::Webhooks;
use crate::error::{DeskError, DeskResult};
use crate::models::record::PLACEHOLDER;
use crate::models::{safe_value, BulkOutcome, RfqKey, RfqPayload, RfqStatus, VendorMatchEntry};

/// 批量发送时相邻两次请求的间隔
pub const SEND_GAP: Duration = Duration::from_millis(500);
/// 成功后状态保持多久
pub const STATUS_RESET: Duration = Duration::from_secs(3);

pub const WEBHOOK_MISSING: &str = "Webhook URL not configured!";
pub const CONTACT_MISSING: &str = "Vendor contact number not available!";
pub const ITEM_ID_MISSING: &str = "Vendor Item ID not available!";
pub const SEND_FAILED: &str = "Failed to send RFQ. Please try again.";
pub const NO_VENDORS: &str = "No vendors found!";

fn unusable(value: &str) -> bool {
    value == PLACEHOLDER || value == "Null"
}

fn vendor_contact(entry: &VendorMatchEntry) -> String {
    safe_value(entry.record.raw("Potential_Buyer_1_Contact_Detail"))
}

fn vendor_item_id(entry: &VendorMatchEntry) -> String {
    safe_value(entry.record.raw("Id"))
}

pub fn rfq_key(entry: &VendorMatchEntry) -> RfqKey {
    RfqKey::new(entry.match_id_text(), vendor_item_id(entry))
}

/// 校验联系方式与商品 ID，返回 (联系方式, 商品 ID)
fn validate(entry: &VendorMatchEntry) -> Result<(String, String), &'static str> {
    let contact = vendor_contact(entry);
    if unusable(&contact) {
        return Err(CONTACT_MISSING);
    }
    let item_id = vendor_item_id(entry);
    if unusable(&item_id) {
        return Err(ITEM_ID_MISSING);
    }
    Ok((contact, item_id))
}

fn build_payload(entry: &VendorMatchEntry, contact: String, item_id: String) -> RfqPayload {
    let record = &entry.record;
    RfqPayload {
        match_id: entry.match_id.clone(),
        customer_id: entry.customer_id.clone(),
        customer_name: entry.customer_name.clone(),
        customer_email: entry.customer_email.clone(),
        customer_whatsapp: entry.customer_whatsapp.clone(),
        product_type: entry.product_needed.clone(),
        quantity: entry.total_quantity.clone(),
        vendor_item_id: item_id,
        vendor_contact: contact,
        vendor_email: safe_value(record.raw("Potential_Buyer_1_Email")),
        vendor_name: safe_value(record.raw("Potential_Buyer_1")),
        item_description: safe_value(record.raw("Item_Description")),
        available_qty: safe_value(record.raw("Quantity")),
        price: safe_value(record.raw("Unit_Price")),
    }
}

fn sent_message(entry: &VendorMatchEntry, payload: &RfqPayload) -> String {
    format!(
        "RFQ Sent Successfully!\n\nMatch ID: {}\nVendor Item ID: {}\nTo: {}\nContact: {}\n\nProduct: {}\nQuantity: {}",
        entry.match_id_text(),
        payload.vendor_item_id,
        payload.vendor_name,
        payload.vendor_contact,
        payload.item_description,
        payload.available_qty,
    )
}

/// 批量发送前的确认文案，以第一个供应商的客户信息为准
pub fn bulk_confirmation(entries: &[VendorMatchEntry]) -> Option<String> {
    let first = entries.first()?;
    Some(format!(
        "Send RFQ to {} vendor(s)?\n\nCustomer: {}\nProduct: {}\nTotal Qty: {}",
        entries.len(),
        first.customer_name,
        first.product_needed,
        first.total_quantity
    ))
}

/// 发送中的状态: 请求未完成就被丢弃时回到空闲
struct InFlight<'a> {
    statuses: &'a DashMap<RfqKey, RfqStatus>,
    key: RfqKey,
}

impl<'a> InFlight<'a> {
    fn start(statuses: &'a DashMap<RfqKey, RfqStatus>, key: RfqKey) -> Self {
        statuses.insert(key.clone(), RfqStatus::Sending);
        Self { statuses, key }
    }

    fn sent(self) {
        self.statuses.insert(self.key.clone(), RfqStatus::Sent);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.statuses
            .remove_if(&self.key, |_, status| *status == RfqStatus::Sending);
    }
}

/// RFQ 发送与按 (匹配号, 商品ID) 的状态跟踪
///
/// 不在表中即空闲。单个发送成功后 3 秒回到空闲 (仅当仍为 Sent)，
/// 批量发送结束 3 秒后清空全部状态。
pub struct RfqDispatcher {
    webhooks: Arc<dyn Webhooks>,
    statuses: Arc<DashMap<RfqKey, RfqStatus>>,
    resets: TimerGroup,
    bulk_reset: Timer,
}

impl RfqDispatcher {
    pub fn new(webhooks: Arc<dyn Webhooks>) -> Self {
        Self {
            webhooks,
            statuses: Arc::new(DashMap::new()),
            resets: TimerGroup::new(),
            bulk_reset: Timer::new(),
        }
    }

    pub fn status(&self, key: &RfqKey) -> Option<RfqStatus> {
        self.statuses.get(key).map(|status| *status)
    }

    pub fn statuses(&self) -> Vec<(RfqKey, RfqStatus)> {
        let mut all: Vec<_> = self
            .statuses
            .iter()
            .map(|item| (item.key().clone(), *item.value()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    fn ensure_configured(&self, prompt: &dyn Prompt) -> DeskResult<()> {
        if self.webhooks.rfq_configured() {
            return Ok(());
        }
        let err = DeskError::Config(WEBHOOK_MISSING.to_string());
        prompt.alert(&err.to_string());
        Err(err)
    }

    /// 向单个供应商发送 RFQ
    pub async fn send_single(&self, entry: &VendorMatchEntry, prompt: &dyn Prompt) -> DeskResult<()> {
        self.ensure_configured(prompt)?;

        let (contact, item_id) = validate(entry).map_err(|message| {
            prompt.alert(message);
            DeskError::Validation(message.to_string())
        })?;

        let key = RfqKey::new(entry.match_id_text(), item_id.clone());
        let in_flight = match self.statuses.entry(key.clone()) {
            Entry::Occupied(_) => {
                return Err(DeskError::Validation(format!("RFQ for {key} is already in progress.")));
            }
            Entry::Vacant(slot) => {
                slot.insert(RfqStatus::Sending);
                InFlight {
                    statuses: &self.statuses,
                    key: key.clone(),
                }
            }
        };

        let payload = build_payload(entry, contact, item_id);
        match self.webhooks.send_rfq(&payload).await {
            Ok(()) => {
                in_flight.sent();
                info!("RFQ sent for {}", key);
                prompt.alert(&sent_message(entry, &payload));

                let statuses = Arc::clone(&self.statuses);
                self.resets.schedule(STATUS_RESET, async move {
                    statuses.remove_if(&key, |_, status| *status == RfqStatus::Sent);
                });
                Ok(())
            }
            Err(e) => {
                error!("RFQ for {} failed: {}", key, e);
                prompt.alert(SEND_FAILED);
                drop(in_flight);
                Err(e)
            }
        }
    }

    /// 批量顺序发送；未确认时返回 `Ok(None)`，不发出任何请求
    pub async fn send_bulk(
        &self,
        entries: &[VendorMatchEntry],
        prompt: &dyn Prompt,
    ) -> DeskResult<Option<BulkOutcome>> {
        self.ensure_configured(prompt)?;

        let Some(confirmation) = bulk_confirmation(entries) else {
            prompt.alert(NO_VENDORS);
            return Err(DeskError::Validation(NO_VENDORS.to_string()));
        };
        if !prompt.confirm(&confirmation) {
            info!("Bulk RFQ cancelled by operator");
            return Ok(None);
        }

        let mut outcome = BulkOutcome::default();
        for entry in entries {
            let Ok((contact, item_id)) = validate(entry) else {
                warn!("Skipping vendor without contact or item id: {}", rfq_key(entry));
                outcome.failed += 1;
                continue;
            };

            let key = RfqKey::new(entry.match_id_text(), item_id.clone());
            let in_flight = InFlight::start(&self.statuses, key);

            let payload = build_payload(entry, contact, item_id);
            match self.webhooks.send_rfq(&payload).await {
                Ok(()) => {
                    outcome.succeeded += 1;
                    in_flight.sent();
                }
                Err(e) => {
                    error!("RFQ to {} failed: {}", payload.vendor_name, e);
                    outcome.failed += 1;
                    drop(in_flight);
                }
            }

            tokio::time::sleep(SEND_GAP).await;
        }

        info!(
            "Bulk RFQ done: {} succeeded, {} failed",
            outcome.succeeded, outcome.failed
        );
        prompt.alert(&format!(
            "RFQ Sending Complete!\n\nSuccess: {}\nFailed: {}",
            outcome.succeeded, outcome.failed
        ));

        let statuses = Arc::clone(&self.statuses);
        self.bulk_reset.schedule(STATUS_RESET, async move {
            statuses.clear();
        });
        Ok(Some(outcome))
    }
}
