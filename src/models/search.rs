use serde::{Deserialize, Serialize};

use super::record::VendorProductRecord;

/// 搜索结果: 库存行 + 产生它的搜索词
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultRecord {
    #[serde(rename = "sourceSearchTerm")]
    pub source_search_term: String,
    #[serde(flatten)]
    pub record: VendorProductRecord,
}

impl SearchResultRecord {
    /// 打标签，覆盖上游可能自带的同名字段
    pub fn tag(mut record: VendorProductRecord, term: &str) -> Self {
        record.0.remove("sourceSearchTerm");
        Self {
            source_search_term: term.to_string(),
            record,
        }
    }
}
