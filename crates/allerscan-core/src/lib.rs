//! 过敏原扫描核心库
//!
//! 设计要点：
//! - 匹配分两级：关键词整体作为子串出现在小写全文中（短语级），否则关键词分词后任一词元出现在任一文本词元中（部分级）。
//! - 子串匹配使用 KMP，最坏线性复杂度，避免长文档上的二次退化。
//! - 单次扫描内按小写关键词去重，命中顺序即过敏原/关键词的遍历顺序，结果可复现。
//! - 存储与历史通过 trait 注入；历史写入失败不影响扫描结果。

mod error;
mod extract;
mod findings;
mod history;
mod matcher;
mod options;
mod rules;
mod scan;
mod store;
mod tokenizer;
mod types;

pub use error::{ExtractError, ScanError, StoreError};
pub use extract::{CommandExtractor, ContentKind, TextExtractor};
pub use history::{HistoryStore, JsonlHistory, MemoryHistory, NoHistory, HISTORY_FILE};
pub use matcher::{matches, KmpPattern};
pub use options::{ExtractCommands, ScanOptions, ScanStats, ServiceConfig, DEFAULT_LISTEN};
pub use rules::{import_catalog, load_catalog, parse_catalog, ImportStats};
pub use scan::{collect_dir_files, match_allergens, scan_files_and_write, ScanService};
pub use store::{parse_id, AllergenCatalog, AllergenStore, ALLERGENS_FILE};
pub use tokenizer::{is_stop_word, tokenize};
pub use types::{Allergen, AllergenId, AllergenInput, MatchPosition, MatchResult, OutputItem, ScanResult, Severity};
