use serde::{Deserialize, Serialize};
use serde_json::Value;

/// RFQ 状态键: (匹配号, 供应商商品ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RfqKey {
    pub match_id: String,
    pub vendor_item_id: String,
}

impl RfqKey {
    pub fn new(match_id: impl Into<String>, vendor_item_id: impl Into<String>) -> Self {
        Self {
            match_id: match_id.into(),
            vendor_item_id: vendor_item_id.into(),
        }
    }
}

impl std::fmt::Display for RfqKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.match_id, self.vendor_item_id)
    }
}

/// 缺省 (不在表中) 即空闲
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RfqStatus {
    Sending,
    Sent,
}

/// RFQ webhook 请求体
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RfqPayload {
    #[serde(rename = "matchID")]
    pub match_id: Value,
    pub customer_id: Value,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_whatsapp: String,
    pub product_type: String,
    pub quantity: String,
    pub vendor_item_id: String,
    pub vendor_contact: String,
    pub vendor_email: String,
    pub vendor_name: String,
    pub item_description: String,
    pub available_qty: String,
    pub price: String,
}

/// 客户报价 webhook 请求体
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferPayload {
    #[serde(rename = "matchID")]
    pub match_id: String,
    pub customer_name: String,
    pub customer_whatsapp: String,
    pub customer_email: String,
    pub product: String,
    pub quantity: String,
    pub vendor_name: String,
    pub vendor_price: String,
    pub offer_price: String,
    pub available_qty: String,
    pub can_deliver: String,
}

/// 批量发送结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rfq_payload_uses_webhook_field_names() {
        let payload = RfqPayload {
            match_id: json!("M1"),
            customer_id: json!(3),
            customer_name: "Acme".into(),
            customer_email: "a@acme.test".into(),
            customer_whatsapp: "555".into(),
            product_type: "Bolt".into(),
            quantity: "10".into(),
            vendor_item_id: "77".into(),
            vendor_contact: "999".into(),
            vendor_email: "v@x.test".into(),
            vendor_name: "Vendor".into(),
            item_description: "Hex bolt".into(),
            available_qty: "5".into(),
            price: "1.5".into(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        for expected in [
            "matchID", "customerId", "customerName", "customerEmail", "customerWhatsapp",
            "productType", "quantity", "vendorItemId", "vendorContact", "vendorEmail",
            "vendorName", "itemDescription", "availableQty", "price",
        ] {
            assert!(keys.iter().any(|k| k == expected), "missing {expected}");
        }
        assert_eq!(keys.len(), 14);
    }

    #[test]
    fn key_display_joins_with_dash() {
        assert_eq!(RfqKey::new("M1", "42").to_string(), "M1-42");
        assert_eq!(serde_json::to_value(RfqStatus::Sending).unwrap(), json!("sending"));
    }
}
