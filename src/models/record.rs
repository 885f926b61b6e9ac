use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 空值展示占位符
pub const PLACEHOLDER: &str = "—";
/// 候选字段全部缺失时的返回值
pub const NOT_AVAILABLE: &str = "N/A";

/// 上游字段的多种命名 (PascalCase / camelCase / snake_case)，顺序即优先级
pub mod keys {
    pub const ID: &[&str] = &["Id"];
    pub const ITEM_DESCRIPTION: &[&str] = &["Item_Description", "itemDescription", "item_description"];
    pub const QUANTITY: &[&str] = &["Quantity", "quantity", "Qty"];
    pub const UQC: &[&str] = &["UQC", "uqc", "unit_of_quantity"];
    pub const UNIT_PRICE: &[&str] = &["Unit_Price", "unitPrice", "unit_price", "price"];
    pub const BUYER_1: &[&str] = &["Potential_Buyer_1", "potentialBuyer1", "potential_buyer_1"];
    pub const BUYER_1_CONTACT: &[&str] = &[
        "Potential_Buyer_1_Contact_Detail",
        "potentialBuyer1ContactDetail",
        "contactDetails",
        "contact_details",
        "contact",
    ];
    pub const BUYER_1_EMAIL: &[&str] = &[
        "Potential_Buyer_1_Email",
        "potentialBuyer1Email",
        "emailId",
        "email_id",
        "email",
    ];
    pub const BUYER_2: &[&str] = &["Potential_Buyer_2", "potentialBuyer2", "potential_buyer_2"];
    pub const STATUS: &[&str] = &["Status", "status"];
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// JSON 值的展示文本，字符串不带引号
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// null / 缺失 / 空字符串 -> "—"，其余原样返回
///
/// 仅用于展示；判断数据是否存在请用 [`resolve_field`]。
pub fn safe_value(value: Option<&Value>) -> String {
    match value {
        Some(v) if is_present(v) => display(v),
        _ => PLACEHOLDER.to_string(),
    }
}

/// 按顺序返回第一个非空候选字段
pub fn resolve_field<'a>(record: &'a Map<String, Value>, candidates: &[&str]) -> Option<&'a Value> {
    candidates
        .iter()
        .filter_map(|key| record.get(*key))
        .find(|value| is_present(value))
}

/// 同 [`resolve_field`]，但返回展示文本，全部缺失时为 "N/A"
pub fn get_field_value(record: &Map<String, Value>, candidates: &[&str]) -> String {
    resolve_field(record, candidates)
        .map(display)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// 供应商库存行，保留上游全部字段
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorProductRecord(pub Map<String, Value>);

impl VendorProductRecord {
    /// 只接受 JSON 对象
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn field(&self, candidates: &[&str]) -> String {
        get_field_value(&self.0, candidates)
    }

    pub fn id(&self) -> String {
        self.raw("Id").map(display).unwrap_or_default()
    }

    pub fn item_description(&self) -> String {
        self.field(keys::ITEM_DESCRIPTION)
    }

    pub fn primary_buyer(&self) -> String {
        self.field(keys::BUYER_1)
    }

    /// 状态字段缺失时视为 Active
    pub fn status(&self) -> String {
        resolve_field(&self.0, keys::STATUS)
            .map(display)
            .unwrap_or_else(|| "Active".to_string())
    }

    pub fn whatsapp_link(&self) -> Option<String> {
        let phone = resolve_field(&self.0, keys::BUYER_1_CONTACT).map(display)?;
        let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return None;
        }
        Some(format!("https://wa.me/{digits}"))
    }

    pub fn mailto_link(&self) -> Option<String> {
        resolve_field(&self.0, keys::BUYER_1_EMAIL).map(|email| format!("mailto:{}", display(email)))
    }
}
