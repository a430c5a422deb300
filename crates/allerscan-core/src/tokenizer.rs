//! 分词：小写化 → 按词字符切分 → 去停用词 → 去除长度 ≤ 2 的噪声词
//!
//! 纯函数，相同输入产出相同输出；保留原文顺序与重复项。

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// 最短保留长度（按字符计）
pub const MIN_TOKEN_CHARS: usize = 3;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid word regex"));

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        // 冠词
        "a", "an", "the",
        // 连词
        "and", "or", "but", "nor", "yet", "so",
        // 介词
        "in", "on", "at", "of", "for", "to", "with", "by", "from",
        "about", "against", "between", "into", "through", "during",
        "before", "after", "above", "below", "under", "over", "up",
        "down", "off", "out", "around", "near", "within", "without",
        // 代词
        "i", "me", "my", "mine", "myself",
        "we", "us", "our", "ours", "ourselves",
        "you", "your", "yours", "yourself", "yourselves",
        "he", "him", "his", "himself",
        "she", "her", "hers", "herself",
        "it", "its", "itself",
        "they", "them", "their", "theirs", "themselves",
        "this", "that", "these", "those",
        // 助动词
        "is", "am", "are", "was", "were", "be", "been", "being",
        "do", "does", "did",
        "have", "has", "had",
        "will", "would", "shall", "should",
        "can", "could", "may", "might", "must",
        // 副词 / 填充词
        "very", "too", "just", "only", "also", "not",
        // PDF 常见噪声
        "etc", "etcetera", "via", "per",
        // 量词
        "some", "any", "all", "each", "every", "few", "many", "much", "more", "most",
        // 时间 / 顺序
        "now", "then", "when", "while",
        // 比较
        "such", "same", "other", "another",
    ]
    .into_iter()
    .collect()
});

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(token)
}

/// 将文本切分为有意义的小写词元
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD.find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| !is_stop_word(t) && t.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}
