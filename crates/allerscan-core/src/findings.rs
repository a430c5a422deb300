//! 命中收集与去重（内部使用）
use std::collections::HashSet;

use crate::types::{Allergen, MatchResult};

/// 命中层级：短语整体命中或分词后的部分命中
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MatchTier {
    Phrase,
    Partial,
}

/// 单次扫描内的命中集合
/// - 按首次命中的顺序保存
/// - 以小写关键词去重，同一关键词至多一条
#[derive(Debug, Default)]
pub(crate) struct MatchSet {
    matches: Vec<MatchResult>,
    seen: HashSet<String>,
}

impl MatchSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn contains(&self, keyword_lower: &str) -> bool {
        self.seen.contains(keyword_lower)
    }

    /// 记录命中；关键词已存在时返回 false
    pub(crate) fn record(&mut self, allergen: &Allergen, keyword: &str, keyword_lower: String) -> bool {
        if !self.seen.insert(keyword_lower) {
            return false;
        }
        self.matches.push(MatchResult {
            allergen: allergen.name.clone(),
            keyword_found: keyword.to_string(),
            severity: allergen.severity,
            position: None,
        });
        true
    }

    pub(crate) fn into_matches(self) -> Vec<MatchResult> {
        self.matches
    }
}
