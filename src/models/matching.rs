use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::record::{display, safe_value, VendorProductRecord, PLACEHOLDER};

/// JS 语义的真值判断 (0 / "" / null / false 为假)
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn positive_quantity(value: Option<&Value>) -> bool {
    let quantity = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    quantity.is_some_and(|q| q > 0.0)
}

/// 供应商回复视图 (占位实现，尚无实时回复接口)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseView {
    #[serde(rename = "Product_Available")]
    pub product_available: Option<String>,
    #[serde(rename = "Vendor_Price")]
    pub vendor_price: Option<Value>,
    #[serde(rename = "Available_Qty")]
    pub available_qty: Option<Value>,
    #[serde(rename = "Can_Deliver")]
    pub can_deliver: Option<String>,
    #[serde(rename = "Final_Status")]
    pub final_status: String,
    #[serde(rename = "Vendor_Phone")]
    pub vendor_phone: String,
}

impl ResponseView {
    pub fn has_response(&self) -> bool {
        self.product_available.as_deref() == Some("YES") || self.vendor_price.is_some()
    }
}

/// 根据是否带有供应商报价推导回复视图，所有展示入口共用
pub fn derive_mock_response(record: &VendorProductRecord) -> ResponseView {
    let vendor_price = record.raw("Vendor_Price");
    let quantity = record.raw("Quantity");
    let priced = truthy(vendor_price);

    ResponseView {
        product_available: priced.then(|| "YES".to_string()),
        vendor_price: vendor_price.filter(|_| priced).cloned(),
        available_qty: quantity.filter(|q| truthy(Some(*q))).cloned(),
        can_deliver: positive_quantity(quantity).then(|| "YES".to_string()),
        final_status: if priced { "Matched" } else { "Awaiting" }.to_string(),
        vendor_phone: safe_value(record.raw("Potential_Buyer_1_Contact_Detail")),
    }
}

/// 条目自带的客户字段名，序列化时会与商品行展开后的字段同级
const ENTRY_KEYS: &[&str] = &[
    "matchId",
    "customerId",
    "customerName",
    "customerEmail",
    "customerWhatsapp",
    "productNeeded",
    "totalQuantity",
    "mockVendorResponse",
];

/// 客户需求下的一条候选供应商商品，带冗余的客户字段
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorMatchEntry {
    #[serde(rename = "matchId")]
    pub match_id: Value,
    #[serde(rename = "customerId")]
    pub customer_id: Value,
    #[serde(rename = "customerName")]
    pub customer_name: String,
    #[serde(rename = "customerEmail")]
    pub customer_email: String,
    #[serde(rename = "customerWhatsapp")]
    pub customer_whatsapp: String,
    #[serde(rename = "productNeeded")]
    pub product_needed: String,
    #[serde(rename = "totalQuantity")]
    pub total_quantity: String,
    #[serde(flatten)]
    pub record: VendorProductRecord,
    #[serde(rename = "mockVendorResponse")]
    pub response: ResponseView,
}

impl VendorMatchEntry {
    pub fn match_id_text(&self) -> String {
        display(&self.match_id)
    }

    pub fn vendor_name(&self) -> String {
        safe_value(self.record.raw("Potential_Buyer_1"))
    }
}

/// 主表行的投影
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MainRow {
    #[serde(rename = "Match_ID")]
    pub match_id: String,
    #[serde(rename = "Customer_Name")]
    pub customer_name: String,
    #[serde(rename = "Whatsapp_Number")]
    pub whatsapp_number: String,
    #[serde(rename = "Product_Needed")]
    pub product_needed: String,
    #[serde(rename = "Qty_Needed")]
    pub qty_needed: String,
}

/// 已回复数 / 供应商总数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RfqSummary {
    pub responded: usize,
    pub total: usize,
}

impl std::fmt::Display for RfqSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.responded, self.total)
    }
}

/// 一个客户需求及其匹配到的供应商列表 (可为空)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchingRequestGroup {
    pub main_row: MainRow,
    pub vendors: Vec<VendorMatchEntry>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_whatsapp: String,
    pub product_needed: String,
    pub total_quantity: String,
    pub created_at: String,
}

impl MatchingRequestGroup {
    pub fn from_request(request: &Map<String, Value>) -> Self {
        let customer_name = safe_value(request.get("customerName"));
        let customer_email = safe_value(request.get("customerEmail"));
        let customer_whatsapp = safe_value(request.get("customerNumber"));
        let product_needed = safe_value(request.get("product_req"));
        let total_quantity = safe_value(request.get("qty"));
        let match_id = request.get("matchId").cloned().unwrap_or(Value::Null);
        let customer_id = request.get("customerId").cloned().unwrap_or(Value::Null);

        let vendors = request
            .get("products")
            .and_then(Value::as_array)
            .map(|products| {
                products
                    .iter()
                    .filter_map(|p| VendorProductRecord::from_value(p.clone()))
                    .map(|mut record| {
                        // 商品行里的同名字段让位于需求本身
                        for key in ENTRY_KEYS {
                            record.0.remove(*key);
                        }
                        record
                    })
                    .map(|record| VendorMatchEntry {
                        match_id: match_id.clone(),
                        customer_id: customer_id.clone(),
                        customer_name: customer_name.clone(),
                        customer_email: customer_email.clone(),
                        customer_whatsapp: customer_whatsapp.clone(),
                        product_needed: product_needed.clone(),
                        total_quantity: total_quantity.clone(),
                        response: derive_mock_response(&record),
                        record,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            main_row: MainRow {
                match_id: safe_value(request.get("matchId")),
                customer_name: customer_name.clone(),
                whatsapp_number: customer_whatsapp.clone(),
                product_needed: product_needed.clone(),
                qty_needed: total_quantity.clone(),
            },
            vendors,
            customer_name,
            customer_email,
            customer_whatsapp,
            product_needed,
            total_quantity,
            created_at: safe_value(request.get("createdAt")),
        }
    }

    pub fn rfq_summary(&self) -> RfqSummary {
        RfqSummary {
            responded: self.vendors.iter().filter(|v| v.response.has_response()).count(),
            total: self.vendors.len(),
        }
    }

    /// 无候选供应商时不可展开
    pub fn can_expand(&self) -> bool {
        !self.vendors.is_empty()
    }

    /// 客户名 / 需求产品 / 匹配号 / 任一供应商名 的大小写不敏感子串匹配
    pub fn matches_filter(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.customer_name.to_lowercase().contains(&term)
            || self.product_needed.to_lowercase().contains(&term)
            || self.main_row.match_id.to_lowercase().contains(&term)
            || self.vendors.iter().any(|v| {
                v.record
                    .raw("Potential_Buyer_1")
                    .map(display)
                    .unwrap_or_default()
                    .to_lowercase()
                    .contains(&term)
            })
    }

    pub fn customer_details(&self) -> CustomerDetails {
        CustomerDetails {
            customer_name: self.customer_name.clone(),
            customer_email: self.customer_email.clone(),
            customer_whatsapp: self.customer_whatsapp.clone(),
            product: self.product_needed.clone(),
            total_quantity: self.total_quantity.clone(),
            created_at: self.created_at.clone(),
            vendor_count: self.vendors.len(),
        }
    }
}

/// 客户详情
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerDetails {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_whatsapp: String,
    pub product: String,
    pub total_quantity: String,
    pub created_at: String,
    pub vendor_count: usize,
}

/// 回复弹窗中展示的需求信息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchData {
    pub vendor_name: String,
    pub product_req: String,
    pub model: String,
    pub quantity: String,
    pub vendor_contact: String,
    pub match_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_whatsapp: String,
}

impl MatchData {
    pub fn from_entry(entry: &VendorMatchEntry) -> Self {
        let record = &entry.record;
        Self {
            vendor_name: safe_value(record.raw("Potential_Buyer_1")),
            product_req: entry.product_needed.clone(),
            model: safe_value(record.raw("Item_Description")),
            quantity: entry.total_quantity.clone(),
            vendor_contact: safe_value(record.raw("Potential_Buyer_1_Contact_Detail")),
            match_id: safe_value(Some(&entry.match_id)),
            customer_name: entry.customer_name.clone(),
            customer_email: entry.customer_email.clone(),
            customer_whatsapp: entry.customer_whatsapp.clone(),
        }
    }

    pub fn has_customer_whatsapp(&self) -> bool {
        !self.customer_whatsapp.is_empty() && self.customer_whatsapp != PLACEHOLDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn group(value: Value) -> MatchingRequestGroup {
        MatchingRequestGroup::from_request(value.as_object().unwrap())
    }

    #[test]
    fn entry_json_has_no_duplicate_keys() {
        let g = group(json!({
            "matchId": "M1",
            "customerName": "Acme",
            "products": [{"Id": 7, "matchId": "stale", "customerName": "Other", "Potential_Buyer_1": "Boltworks"}]
        }));
        let text = serde_json::to_string(&g.vendors[0]).unwrap();
        assert_eq!(text.matches("\"matchId\"").count(), 1);
        assert_eq!(text.matches("\"customerName\"").count(), 1);

        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["matchId"], "M1");
        assert_eq!(value["customerName"], "Acme");
        assert_eq!(value["Potential_Buyer_1"], "Boltworks");
    }

    #[test]
    fn request_without_products_has_no_vendors() {
        let g = group(json!({"matchId": "M1", "customerName": "Acme", "products": []}));
        assert!(g.vendors.is_empty());
        assert_eq!(g.rfq_summary().to_string(), "0/0");
        assert!(!g.can_expand());
        assert_eq!(g.main_row.match_id, "M1");
        assert_eq!(g.main_row.whatsapp_number, PLACEHOLDER);
    }

    #[test]
    fn mock_response_follows_vendor_price() {
        let priced = VendorProductRecord::from_value(json!({
            "Vendor_Price": 120, "Quantity": "4", "Potential_Buyer_1_Contact_Detail": "999"
        }))
        .unwrap();
        let view = derive_mock_response(&priced);
        assert_eq!(view.product_available.as_deref(), Some("YES"));
        assert_eq!(view.final_status, "Matched");
        assert_eq!(view.can_deliver.as_deref(), Some("YES"));
        assert_eq!(view.vendor_phone, "999");
        assert!(view.has_response());

        let bare = VendorProductRecord::from_value(json!({"Vendor_Price": "", "Quantity": 0})).unwrap();
        let view = derive_mock_response(&bare);
        assert_eq!(view.product_available, None);
        assert_eq!(view.vendor_price, None);
        assert_eq!(view.available_qty, None);
        assert_eq!(view.can_deliver, None);
        assert_eq!(view.final_status, "Awaiting");
        assert_eq!(view.vendor_phone, PLACEHOLDER);
        assert!(!view.has_response());
    }

    #[test]
    fn entries_carry_parent_fields_and_summary_counts_responses() {
        let g = group(json!({
            "matchId": 7,
            "customerId": "C9",
            "customerName": "Acme",
            "customerNumber": "+1 555",
            "product_req": "Copper wire",
            "qty": 40,
            "products": [
                {"Id": 1, "Potential_Buyer_1": "Wirecorp", "Vendor_Price": 10},
                {"Id": 2, "Potential_Buyer_1": "Cablez"}
            ]
        }));
        assert_eq!(g.vendors.len(), 2);
        assert_eq!(g.vendors[1].customer_whatsapp, "+1 555");
        assert_eq!(g.vendors[1].total_quantity, "40");
        assert_eq!(g.vendors[0].match_id_text(), "7");
        assert_eq!(g.rfq_summary(), RfqSummary { responded: 1, total: 2 });
    }

    #[test]
    fn filter_checks_customer_product_id_and_vendor() {
        let g = group(json!({
            "matchId": "REQ-42",
            "customerName": "Acme Traders",
            "product_req": "Hex Bolt",
            "products": [{"Potential_Buyer_1": "Steelworks"}]
        }));
        assert!(g.matches_filter("acme"));
        assert!(g.matches_filter("HEX"));
        assert!(g.matches_filter("req-4"));
        assert!(g.matches_filter("steel"));
        assert!(g.matches_filter(""));
        assert!(!g.matches_filter("nylon"));
    }
}
