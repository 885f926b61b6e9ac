use serde_json::Value;
use tracing::warn;

use crate::models::VendorProductRecord;

/// 商品列表可能的外层字段
pub const PRODUCT_ENVELOPE: &[&str] = &["matches", "vendors", "data", "products", "results"];
/// 搜索结果可能的外层字段
pub const SEARCH_ENVELOPE: &[&str] = &["matches", "data"];
/// 客户需求列表的外层字段
pub const REQUEST_ENVELOPE: &[&str] = &["data"];

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// 取第一个有值的外层字段，都没有则取整个响应体；结果不是数组时视为空列表
pub fn extract_items(body: Value, envelope: &[&str]) -> Vec<Value> {
    let picked = match &body {
        Value::Object(map) => envelope
            .iter()
            .filter_map(|key| map.get(*key))
            .find(|value| truthy(value))
            .cloned(),
        _ => None,
    };

    match picked.unwrap_or(body) {
        Value::Array(items) => items,
        other => {
            if !other.is_null() {
                warn!("Response envelope did not contain an array, treating as empty");
            }
            Vec::new()
        }
    }
}

/// 解包并只保留 JSON 对象
pub fn extract_records(body: Value, envelope: &[&str]) -> Vec<VendorProductRecord> {
    let items = extract_items(body, envelope);
    let total = items.len();
    let records: Vec<_> = items
        .into_iter()
        .filter_map(VendorProductRecord::from_value)
        .collect();
    if records.len() < total {
        warn!("Skipped {} non-object items in response", total - records.len());
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn picks_first_present_envelope_key() {
        let body = json!({"matches": [], "data": [{"Id": 1}]});
        // 空数组在 JS 里为真值，优先于 data
        assert!(extract_items(body, PRODUCT_ENVELOPE).is_empty());

        let body = json!({"matches": null, "vendors": [{"Id": 1}], "data": [{"Id": 2}]});
        assert_eq!(extract_items(body, PRODUCT_ENVELOPE), vec![json!({"Id": 1})]);

        let body = json!({"results": [{"Id": 3}]});
        assert_eq!(extract_items(body, PRODUCT_ENVELOPE).len(), 1);
    }

    #[test]
    fn raw_array_body_is_accepted() {
        let body = json!([{"Id": 1}, {"Id": 2}]);
        assert_eq!(extract_items(body, SEARCH_ENVELOPE).len(), 2);
    }

    #[test]
    fn non_array_payload_becomes_empty() {
        assert!(extract_items(json!({"data": {"Id": 1}}), PRODUCT_ENVELOPE).is_empty());
        assert!(extract_items(json!("oops"), PRODUCT_ENVELOPE).is_empty());
        assert!(extract_items(json!({"message": "ok"}), REQUEST_ENVELOPE).is_empty());
    }

    #[test]
    fn records_skip_non_objects() {
        let records = extract_records(json!([{"Id": 1}, 5, "x"]), PRODUCT_ENVELOPE);
        assert_eq!(records.len(), 1);
    }
}
