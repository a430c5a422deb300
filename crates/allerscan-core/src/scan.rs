//! 扫描主流程：两级匹配、去重、结果组装，以及多文件并行扫描
use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::ScanError;
use crate::extract::{ContentKind, TextExtractor};
use crate::findings::{MatchSet, MatchTier};
use crate::history::HistoryStore;
use crate::matcher::{matches, KmpPattern};
use crate::options::{ScanOptions, ScanStats};
use crate::store::AllergenStore;
use crate::tokenizer::tokenize;
use crate::types::{Allergen, AllergenId, MatchResult, OutputItem, ScanResult};

/// 对一组过敏原执行匹配（纯计算，不做 I/O）
///
/// 遍历顺序：过敏原按给定顺序，关键词按存储顺序；每个关键词至多产生一条命中。
pub fn match_allergens(text: &str, allergens: &[Allergen]) -> Vec<MatchResult> {
    let text_lower = text.to_lowercase();
    let tokens = tokenize(&text_lower);
    let mut found = MatchSet::new();

    for allergen in allergens {
        for keyword in &allergen.keywords {
            let keyword_lower = keyword.to_lowercase();
            if found.contains(&keyword_lower) {
                continue;
            }
            if let Some(tier) = keyword_tier(&keyword_lower, &text_lower, &tokens) {
                debug!(allergen = %allergen.name, keyword = %keyword, ?tier, "keyword matched");
                found.record(allergen, keyword, keyword_lower);
            }
        }
    }

    found.into_matches()
}

/// 单个关键词的两级判定，首个命中即返回
/// 1) 短语：整个关键词是小写全文的子串
/// 2) 部分：关键词分词后的任一词元是任一文本词元的子串
fn keyword_tier(keyword_lower: &str, text_lower: &str, tokens: &[String]) -> Option<MatchTier> {
    if matches(text_lower, keyword_lower) {
        return Some(MatchTier::Phrase);
    }
    for kt in tokenize(keyword_lower) {
        let pattern = KmpPattern::new(&kt);
        if tokens.iter().any(|t| pattern.is_match(t)) {
            return Some(MatchTier::Partial);
        }
    }
    None
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// 扫描服务：注入过敏原存储与历史存储
#[derive(Clone)]
pub struct ScanService {
    store: Arc<dyn AllergenStore>,
    history: Arc<dyn HistoryStore>,
}

impl ScanService {
    pub fn new(store: Arc<dyn AllergenStore>, history: Arc<dyn HistoryStore>) -> Self {
        Self { store, history }
    }

    pub fn store(&self) -> &Arc<dyn AllergenStore> {
        &self.store
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    /// 扫描入口
    /// - 前置校验：选择非空、文本去空白后非空；失败时不做匹配也不写历史
    /// - 未知 id 不报错：跳过匹配，列入 `unresolved_ids`
    /// - 历史写入失败只记日志，不影响返回结果
    pub fn scan(&self, text: &str, selected: &[AllergenId]) -> Result<ScanResult, ScanError> {
        if selected.is_empty() {
            return Err(ScanError::NoAllergensSelected);
        }
        if text.trim().is_empty() {
            return Err(ScanError::EmptyText);
        }

        let allergens = self.store.find_by_ids(selected)?;
        let mut unresolved: Vec<AllergenId> = Vec::new();
        for id in selected {
            if !allergens.iter().any(|a| &a.id == id) && !unresolved.contains(id) {
                unresolved.push(id.clone());
            }
        }
        if !unresolved.is_empty() {
            warn!(ids = ?unresolved, "unknown allergen ids skipped");
        }

        let matches = match_allergens(text, &allergens);
        let result = ScanResult {
            safe: matches.is_empty(),
            matches,
            timestamp: now_timestamp(),
            unresolved_ids: unresolved,
        };
        info!(allergens = allergens.len(), matches = result.matches.len(), safe = result.safe, "scan finished");

        if let Err(e) = self.history.append(&result) {
            warn!(error = %e, "failed to store scan history");
        }
        Ok(result)
    }
}

/// 收集目录下的文件（单层），按文件名排序，确保输出顺序可复现
pub fn collect_dir_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = vec![];
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry { Ok(e) => e, Err(_) => continue };
        if entry.file_type().is_file() { files.push(entry.into_path()); }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files
}

/// 扫描多个文件并将结果以 JSON 数组写入 `out`
/// - 每个文件独立抽取文本并扫描，单个文件失败只产生一条 error 项
/// - 输出顺序与 `paths` 顺序一致（并行时同样保证）
pub fn scan_files_and_write(
    paths: &[PathBuf],
    selected: &[AllergenId],
    service: &ScanService,
    extractor: &dyn TextExtractor,
    out: &mut dyn Write,
    opts: &ScanOptions,
) -> Result<ScanStats> {
    if selected.is_empty() {
        return Err(ScanError::NoAllergensSelected.into());
    }

    let threads = opts.threads.unwrap_or_else(num_cpus::get);
    let outcomes: Vec<Result<ScanResult, String>> = if threads > 1 && paths.len() > 1 {
        use rayon::prelude::*;
        let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
        pool.install(|| {
            paths
                .par_iter()
                .map(|p| scan_file(p, selected, service, extractor, opts))
                .collect()
        })
    } else {
        paths.iter().map(|p| scan_file(p, selected, service, extractor, opts)).collect()
    };

    let mut stats = ScanStats::default();
    write!(out, "[")?;
    for (i, (path, outcome)) in paths.iter().zip(outcomes.iter()).enumerate() {
        if i > 0 { write!(out, ",")?; }
        let source = path.display().to_string();
        let item = match outcome {
            Ok(result) => {
                stats.files_scanned += 1;
                stats.matches_total += result.matches.len();
                OutputItem { source: &source, result: Some(result), error: None }
            }
            Err(msg) => {
                stats.files_failed += 1;
                OutputItem { source: &source, result: None, error: Some(msg.as_str()) }
            }
        };
        serde_json::to_writer(&mut *out, &item)?;
    }
    write!(out, "]")?;
    Ok(stats)
}

/// 单文件：判定类型 → 大小过滤 → 抽取 → 扫描
fn scan_file(
    path: &Path,
    selected: &[AllergenId],
    service: &ScanService,
    extractor: &dyn TextExtractor,
    opts: &ScanOptions,
) -> Result<ScanResult, String> {
    let kind = ContentKind::from_path(path).map_err(|e| e.to_string())?;
    if let Some(max) = opts.max_file_size {
        let len = std::fs::metadata(path).map_err(|e| e.to_string())?.len();
        if len > max {
            return Err(format!("file too large: {len} bytes (limit {max})"));
        }
    }
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    let text = extractor.extract(&bytes, kind);
    service.scan(&text, selected).map_err(|e| {
        warn!(path = %path.display(), error = %e, "file scan rejected");
        e.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    fn allergen(name: &str, keywords: &[&str]) -> Allergen {
        Allergen {
            id: name.to_lowercase(),
            name: name.into(),
            severity: Severity::High,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    #[test]
    fn phrase_tier_wins_first() {
        let t = tokenize("i ate peanut butter today");
        assert_eq!(keyword_tier("peanut butter", "i ate peanut butter today", &t), Some(MatchTier::Phrase));
    }

    #[test]
    fn compound_word_and_split_phrase_tiers() {
        let text = "there is heavy housedust today";
        let t = tokenize(text);
        assert_eq!(keyword_tier("dust", text, &t), Some(MatchTier::Phrase));
        // 短语不连续时退回到分词匹配
        let text = "dusty shelves and mites";
        let t = tokenize(text);
        assert_eq!(keyword_tier("dust mite", text, &t), Some(MatchTier::Partial));
        assert_eq!(keyword_tier("pollen", text, &t), None);
    }

    #[test]
    fn stop_word_keyword_tokens_do_not_fall_back() {
        // 关键词分词后为空时，只能依赖短语匹配
        let text = "nothing relevant here";
        let t = tokenize(text);
        assert_eq!(keyword_tier("the and", text, &t), None);
    }

    #[test]
    fn same_keyword_across_allergens_reported_once() {
        let allergens = vec![allergen("Milk", &["Milk", "whey"]), allergen("Dairy", &["MILK", "cream"])];
        let out = match_allergens("skim milk with cream", &allergens);
        let found: Vec<_> = out.iter().map(|m| (m.allergen.as_str(), m.keyword_found.as_str())).collect();
        assert_eq!(found, vec![("Milk", "Milk"), ("Dairy", "cream")]);
    }

    #[test]
    fn file_results_keep_input_order() {
        use crate::extract::CommandExtractor;
        use crate::history::MemoryHistory;
        use crate::store::AllergenCatalog;
        use crate::types::AllergenInput;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "oat milk").unwrap();
        std::fs::write(dir.path().join("a.txt"), "water").unwrap();
        std::fs::write(dir.path().join("c.zip"), "PK").unwrap();
        let paths = collect_dir_files(dir.path());
        let names: Vec<_> = paths.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.zip"]);

        let store = Arc::new(AllergenCatalog::in_memory());
        let milk = store
            .create(AllergenInput { name: "Milk".into(), severity: Severity::Low, keywords: vec!["milk".into()] })
            .unwrap();
        let service = ScanService::new(store, Arc::new(MemoryHistory::new()));
        let opts = ScanOptions { max_file_size: None, threads: Some(2) };
        let mut out = Vec::new();
        let stats =
            scan_files_and_write(&paths, &[milk.id], &service, &CommandExtractor::default(), &mut out, &opts).unwrap();

        assert_eq!(stats.files_scanned, 2);
        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.matches_total, 1);
        let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(v[0]["result"]["safe"], true);
        assert_eq!(v[1]["result"]["matches"][0]["keyword_found"], "milk");
        assert!(v[2]["error"].as_str().unwrap().starts_with("unsupported file type"));
    }
}
