pub mod board;
pub mod catalog;
pub mod grouped;
pub mod notice;
pub mod offer;
pub mod pager;
pub mod rfq;
pub mod search;
pub mod shell;
pub mod storage;
pub mod timers;

pub use board::{BoardSnapshot, MatchingBoard, ResponseModal};
pub use catalog::{CatalogError, CatalogSnapshot, ProductCatalog};
pub use grouped::{DirectoryExport, ExportSink, GroupedSnapshot, SearchWorkspace};
pub use notice::{Notice, NoticeKind, Notices, Prompt};
pub use pager::{Pager, ScrollMetrics};
pub use rfq::RfqDispatcher;
pub use search::{split_terms, SearchAggregator, SearchSnapshot};
pub use shell::{Counter, CrmSubView, LoginGate, NavCounters, Panel, Shell, View};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use timers::{Timer, TimerGroup};
