use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};

use super::pager::{Pager, ScrollMetrics};
use super::search::{SearchAggregator, SearchSnapshot};
use crate::error::{DeskError, DeskResult};
use crate::models::record::{get_field_value, NOT_AVAILABLE};
use crate::models::SearchResultRecord;

/// 详情列表距底部小于该像素时加载下一页
pub const DETAIL_SCROLL_THRESHOLD: f64 = 200.0;
/// 批量导出时相邻文件的间隔
pub const EXPORT_STAGGER: Duration = Duration::from_millis(200);

pub const NOTHING_TO_EXPORT: &str = "No search results available to export.";

const SOURCE_TERM_HEADER: &str = "Source Search Term";

/// 导出列: 表头 + 候选字段名
const EXPORT_COLUMNS: &[(&str, &[&str])] = &[
    (
        "Item Description",
        &["Item_Description", "itemDescription", "item_description", "Item Description"],
    ),
    (
        "Potential Buyer 1",
        &["Potential_Buyer_1", "potentialBuyer1", "potential_buyer_1", "Buyer 1"],
    ),
    ("Quantity", &["Quantity", "quantity", "Qty"]),
    ("UQC", &["UQC", "uqc", "unit_of_quantity"]),
    ("Unit Price", &["Unit_Price", "unitPrice", "price", "Unit Price"]),
    (
        "Potential Buyer 2",
        &["Potential_Buyer_2", "potentialBuyer2", "potential_buyer_2", "Buyer 2"],
    ),
    (
        "Buyer 1 Contact",
        &[
            "Potential_Buyer_1_Contact_Detail",
            "potentialBuyer1ContactDetail",
            "Contact_Detail",
            "contact",
            "CONTACT",
        ],
    ),
    (
        "Buyer 1 Email",
        &["Potential_Buyer_1_Email", "potentialBuyer1Email", "email_address", "email", "EMAIL"],
    ),
];

/// 按搜索词分组，保持首次出现顺序
pub fn group_by_term(results: &[SearchResultRecord]) -> IndexMap<String, Vec<SearchResultRecord>> {
    let mut groups: IndexMap<String, Vec<SearchResultRecord>> = IndexMap::new();
    for result in results {
        groups
            .entry(result.source_search_term.clone())
            .or_default()
            .push(result.clone());
    }
    groups
}

fn cell(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// 生成一组结果的 CSV 文本 (LF 换行，必要时加引号)
pub fn results_to_csv(results: &[SearchResultRecord]) -> DeskResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    let mut header = vec![SOURCE_TERM_HEADER];
    header.extend(EXPORT_COLUMNS.iter().map(|(title, _)| *title));
    writer.write_record(&header)?;

    for result in results {
        let mut row = Vec::with_capacity(EXPORT_COLUMNS.len() + 1);
        row.push(cell(&result.source_search_term));
        for (_, candidates) in EXPORT_COLUMNS {
            row.push(cell(&get_field_value(result.record.fields(), candidates)));
        }
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| DeskError::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// `Vendors_For_<词>_<日期>.csv`，词中非字母数字替换为下划线，最多 30 个字符
pub fn export_file_name(term: &str, date: NaiveDate) -> String {
    let safe: String = term
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(30)
        .collect();
    format!("Vendors_For_{}_{}.csv", safe, date.format("%Y-%m-%d"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub term: String,
    pub file_name: String,
    pub contents: String,
}

/// 导出文件的落地位置
pub trait ExportSink: Send + Sync {
    fn write(&self, file_name: &str, contents: &str) -> DeskResult<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct DirectoryExport {
    dir: PathBuf,
}

impl DirectoryExport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ExportSink for DirectoryExport {
    fn write(&self, file_name: &str, contents: &str) -> DeskResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        fs::write(&path, contents)?;
        Ok(path)
    }
}

/// 依次写出，第 i 个文件在开始后 i * 200ms 写出
pub async fn write_staggered(exports: Vec<CsvExport>, sink: Arc<dyn ExportSink>) -> Vec<PathBuf> {
    let start = Instant::now();
    let mut written = Vec::with_capacity(exports.len());
    for (index, export) in exports.into_iter().enumerate() {
        if index > 0 {
            sleep_until(start + EXPORT_STAGGER * index as u32).await;
        }
        match sink.write(&export.file_name, &export.contents) {
            Ok(path) => {
                info!("Exported {:?} to {}", export.term, path.display());
                written.push(path);
            }
            Err(e) => warn!("Export of {:?} failed: {}", export.term, e),
        }
    }
    written
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub term: String,
    pub vendor_count: usize,
}

/// 详情中的一行，附带联系方式链接
#[derive(Debug, Clone, Serialize)]
pub struct DetailRow {
    #[serde(flatten)]
    pub result: SearchResultRecord,
    pub whatsapp_link: Option<String>,
    pub mailto_link: Option<String>,
}

impl From<SearchResultRecord> for DetailRow {
    fn from(result: SearchResultRecord) -> Self {
        Self {
            whatsapp_link: result.record.whatsapp_link(),
            mailto_link: result.record.mailto_link(),
            result,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailView {
    pub term: String,
    pub total: usize,
    pub displayed: Vec<DetailRow>,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupedSnapshot {
    pub loading: bool,
    pub error: Option<String>,
    pub total_results: usize,
    pub groups: Vec<GroupSummary>,
    pub selected_term: Option<String>,
    pub detail: Option<DetailView>,
}

#[derive(Debug, Clone)]
struct DetailState {
    term: String,
    pager: Pager,
}

/// 搜索页: 聚合器 + 按词分组的汇总/详情视图
pub struct SearchWorkspace {
    aggregator: SearchAggregator,
    page_size: usize,
    detail: Mutex<Option<DetailState>>,
}

impl SearchWorkspace {
    pub fn new(aggregator: SearchAggregator, page_size: usize) -> Self {
        Self {
            aggregator,
            page_size,
            detail: Mutex::new(None),
        }
    }

    pub fn aggregator(&self) -> &SearchAggregator {
        &self.aggregator
    }

    /// 新的搜索回到汇总视图
    pub async fn search(&self, input: &str) -> DeskResult<usize> {
        *self.detail.lock() = None;
        self.aggregator.run(input).await
    }

    pub fn groups(&self) -> IndexMap<String, Vec<SearchResultRecord>> {
        group_by_term(&self.aggregator.snapshot().results)
    }

    fn group(&self, term: &str) -> DeskResult<Vec<SearchResultRecord>> {
        self.groups()
            .shift_remove(term)
            .ok_or_else(|| DeskError::NotFound(format!("search group {term:?}")))
    }

    pub fn open_group(&self, term: &str) -> DeskResult<DetailView> {
        let results = self.group(term)?;
        let state = DetailState {
            term: term.to_string(),
            pager: Pager::first_page(self.page_size, results.len()),
        };
        let view = Self::detail_view(&state, results);
        *self.detail.lock() = Some(state);
        Ok(view)
    }

    pub fn close_group(&self) {
        *self.detail.lock() = None;
    }

    /// 详情列表滚动，返回是否加载了更多
    pub fn detail_scroll(&self, metrics: ScrollMetrics) -> bool {
        if metrics.remaining() >= DETAIL_SCROLL_THRESHOLD {
            return false;
        }
        let Some(term) = self.detail.lock().as_ref().map(|d| d.term.clone()) else {
            return false;
        };
        let total = self.groups().get(&term).map_or(0, Vec::len);
        self.detail
            .lock()
            .as_mut()
            .is_some_and(|detail| detail.pager.load_more(total))
    }

    fn detail_view(state: &DetailState, results: Vec<SearchResultRecord>) -> DetailView {
        let total = results.len();
        DetailView {
            term: state.term.clone(),
            total,
            has_more: state.pager.has_more(total),
            displayed: state
                .pager
                .window(&results)
                .iter()
                .cloned()
                .map(DetailRow::from)
                .collect(),
        }
    }

    pub fn snapshot(&self) -> GroupedSnapshot {
        let SearchSnapshot {
            results,
            loading,
            error,
            ..
        } = self.aggregator.snapshot();
        let mut groups = group_by_term(&results);
        let detail = self.detail.lock().clone();

        GroupedSnapshot {
            loading,
            error,
            total_results: results.len(),
            groups: groups
                .iter()
                .map(|(term, items)| GroupSummary {
                    term: term.clone(),
                    vendor_count: items.len(),
                })
                .collect(),
            selected_term: detail.as_ref().map(|d| d.term.clone()),
            detail: detail.map(|d| {
                let items = groups.shift_remove(&d.term).unwrap_or_default();
                Self::detail_view(&d, items)
            }),
        }
    }

    /// 单个词的导出文件
    pub fn export_term(&self, term: &str, date: NaiveDate) -> DeskResult<CsvExport> {
        let results = self.group(term)?;
        Ok(CsvExport {
            term: term.to_string(),
            file_name: export_file_name(term, date),
            contents: results_to_csv(&results)?,
        })
    }

    /// 每个词一个文件；没有结果时报错
    pub fn export_all(&self, date: NaiveDate) -> DeskResult<Vec<CsvExport>> {
        let groups = self.groups();
        if groups.is_empty() {
            return Err(DeskError::Validation(NOTHING_TO_EXPORT.to_string()));
        }
        groups
            .iter()
            .map(|(term, results)| -> DeskResult<CsvExport> {
                Ok(CsvExport {
                    term: term.clone(),
                    file_name: export_file_name(term, date),
                    contents: results_to_csv(results)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VendorProductRecord;
    use crate::service::shell::Counter;
    use crate::test_support::{settle, FakeBackend};
    use serde_json::{json, Value};

    fn tagged(term: &str, value: Value) -> SearchResultRecord {
        SearchResultRecord::tag(VendorProductRecord::from_value(value).unwrap(), term)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn groups_follow_first_seen_order() {
        let results = vec![
            tagged("washer", json!({"Id": 1})),
            tagged("bolt", json!({"Id": 2})),
            tagged("washer", json!({"Id": 3})),
        ];
        let groups = group_by_term(&results);
        assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["washer", "bolt"]);
        assert_eq!(groups["washer"].len(), 2);
        assert_eq!(groups.values().map(Vec::len).sum::<usize>(), results.len());
    }

    #[test]
    fn csv_quotes_trims_and_fills_missing() {
        let results = vec![tagged(
            "bolt",
            json!({
                "Item_Description": "  Bolt, hex \"M8\"  ",
                "potentialBuyer1": "Acme",
                "Quantity": 12,
                "Contact_Detail": "line1\nline2",
                "email": ""
            }),
        )];
        let text = results_to_csv(&results).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Source Search Term,Item Description,Potential Buyer 1,Quantity,UQC,Unit Price,\
             Potential Buyer 2,Buyer 1 Contact,Buyer 1 Email"
        );
        assert!(text.starts_with("Source Search Term,"));
        assert!(text.contains("\"Bolt, hex \"\"M8\"\"\""));
        assert!(!text.contains('\r'));

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[0], "bolt");
        assert_eq!(&row[1], "Bolt, hex \"M8\"");
        assert_eq!(&row[2], "Acme");
        assert_eq!(&row[3], "12");
        assert_eq!(&row[4], "N/A");
        assert_eq!(&row[7], "line1\nline2");
        assert_eq!(&row[8], "N/A");
    }

    #[test]
    fn file_name_is_sanitized_and_dated() {
        assert_eq!(
            export_file_name("hex bolt M8/steel", date()),
            "Vendors_For_hex_bolt_M8_steel_2024-03-09.csv"
        );
        let long = "a".repeat(50);
        assert_eq!(
            export_file_name(&long, date()),
            format!("Vendors_For_{}_2024-03-09.csv", "a".repeat(30))
        );
    }

    async fn workspace(page_size: usize) -> SearchWorkspace {
        let backend = Arc::new(FakeBackend::new());
        let many: Vec<Value> = (0..120).map(|i| json!({"Id": i})).collect();
        backend.set_search("bolt", Ok(Value::Array(many)));
        backend.set_search("washer", Ok(json!([{"Id": "w1"}])));
        let ws = SearchWorkspace::new(SearchAggregator::new(backend, Counter::default()), page_size);
        ws.search("bolt, washer").await.unwrap();
        ws
    }

    #[tokio::test]
    async fn detail_view_pages_independently() {
        let ws = workspace(50).await;
        let view = ws.open_group("bolt").unwrap();
        assert_eq!(view.total, 120);
        assert_eq!(view.displayed.len(), 50);
        assert!(view.has_more);

        let far = ScrollMetrics { scroll_top: 0.0, scroll_height: 3000.0, client_height: 600.0 };
        assert!(!ws.detail_scroll(far));
        let near = ScrollMetrics { scroll_top: 2250.0, scroll_height: 3000.0, client_height: 600.0 };
        assert!(ws.detail_scroll(near));
        assert!(ws.detail_scroll(near));
        let snap = ws.snapshot();
        assert_eq!(snap.selected_term.as_deref(), Some("bolt"));
        assert_eq!(snap.detail.as_ref().unwrap().displayed.len(), 120);
        assert!(!ws.detail_scroll(near));

        assert!(matches!(ws.open_group("nylon"), Err(DeskError::NotFound(_))));
        ws.close_group();
        assert!(ws.snapshot().detail.is_none());
    }

    #[tokio::test]
    async fn new_search_returns_to_summary() {
        let ws = workspace(50).await;
        ws.open_group("washer").unwrap();
        ws.search("washer").await.unwrap();
        let snap = ws.snapshot();
        assert!(snap.selected_term.is_none());
        assert_eq!(snap.groups.len(), 1);
        assert_eq!(snap.groups[0].vendor_count, 1);
    }

    #[tokio::test]
    async fn export_all_refuses_empty_results() {
        let backend = Arc::new(FakeBackend::new());
        let ws = SearchWorkspace::new(SearchAggregator::new(backend, Counter::default()), 50);
        let err = ws.export_all(date()).unwrap_err();
        assert_eq!(err.to_string(), NOTHING_TO_EXPORT);
    }

    #[tokio::test(start_paused = true)]
    async fn export_all_writes_one_file_per_term_with_stagger() {
        let ws = workspace(50).await;
        let exports = ws.export_all(date()).unwrap();
        assert_eq!(exports.len(), 2);
        assert_eq!(exports[1].file_name, "Vendors_For_washer_2024-03-09.csv");

        let dir = tempfile::tempdir().unwrap();
        let sink: Arc<dyn ExportSink> = Arc::new(DirectoryExport::new(dir.path()));
        let task = tokio::spawn(write_staggered(exports, sink));

        settle().await;
        assert!(dir.path().join("Vendors_For_bolt_2024-03-09.csv").exists());
        assert!(!dir.path().join("Vendors_For_washer_2024-03-09.csv").exists());

        tokio::time::advance(EXPORT_STAGGER).await;
        let written = task.await.unwrap();
        assert_eq!(written.len(), 2);
        let bolt = fs::read_to_string(&written[0]).unwrap();
        assert_eq!(bolt.lines().count(), 121);
    }
}
