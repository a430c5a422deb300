//! 子串匹配原语（KMP 前缀表）
//!
//! - 最坏复杂度 O(|haystack| + |needle|)，长文档上不会退化为 O(n·m)。
//! - 按 UTF-8 字节匹配：合法 UTF-8 的 needle 作为字节子串出现，当且仅当它作为字符子串出现。
//! - 区分大小写；大小写归一由调用方（tokenizer / scan）负责。
//! - 空 needle 永远不命中（空关键词没有意义）。

/// 预编译的模式：持有 needle 字节与其前缀表，可对多个 haystack 复用
#[derive(Debug, Clone)]
pub struct KmpPattern {
    needle: Vec<u8>,
    lps: Vec<usize>,
}

impl KmpPattern {
    pub fn new(needle: &str) -> Self {
        let needle = needle.as_bytes().to_vec();
        let lps = prefix_table(&needle);
        Self { needle, lps }
    }

    /// 返回首个命中的起始字节偏移
    pub fn find(&self, haystack: &str) -> Option<usize> {
        let m = self.needle.len();
        if m == 0 { return None; }
        let text = haystack.as_bytes();
        if m > text.len() { return None; }

        let mut j = 0usize;
        for (i, &b) in text.iter().enumerate() {
            while j > 0 && b != self.needle[j] {
                j = self.lps[j - 1];
            }
            if b == self.needle[j] {
                j += 1;
                if j == m {
                    return Some(i + 1 - m);
                }
            }
        }
        None
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.find(haystack).is_some()
    }
}

/// 一次性匹配：needle 是否为 haystack 的连续子串
pub fn matches(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() { return false; }
    KmpPattern::new(needle).is_match(haystack)
}

/// 前缀表：lps[i] = needle[..=i] 的最长真前缀（同时也是后缀）的长度
fn prefix_table(needle: &[u8]) -> Vec<usize> {
    let mut lps = vec![0usize; needle.len()];
    let mut len = 0usize;
    let mut i = 1usize;
    while i < needle.len() {
        if needle[i] == needle[len] {
            len += 1;
            lps[i] = len;
            i += 1;
        } else if len != 0 {
            len = lps[len - 1];
        } else {
            lps[i] = 0;
            i += 1;
        }
    }
    lps
}
