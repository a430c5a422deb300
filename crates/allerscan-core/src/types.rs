//! 公共类型（对外暴露）
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// 过敏原标识（不透明字符串，由存储生成）
pub type AllergenId = String;

/// 严重程度（序列化为全大写）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HIGH" => Ok(Severity::High),
            "MEDIUM" => Ok(Severity::Medium),
            "LOW" => Ok(Severity::Low),
            other => Err(StoreError::Invalid(format!("severity must be HIGH, MEDIUM or LOW, got '{other}'"))),
        }
    }
}

/// 新建 / 更新过敏原时的输入
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllergenInput {
    pub name: String,
    pub severity: Severity,
    pub keywords: Vec<String>,
}

impl AllergenInput {
    /// 校验：名称非空，至少一个关键词，关键词均非空
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.name.trim().is_empty() {
            return Err(StoreError::Invalid("name must not be empty".into()));
        }
        if self.keywords.is_empty() {
            return Err(StoreError::Invalid("at least one keyword is required".into()));
        }
        if self.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(StoreError::Invalid("keywords must not be empty".into()));
        }
        Ok(())
    }
}

/// 已存储的过敏原记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allergen {
    pub id: AllergenId,
    pub name: String,
    pub severity: Severity,
    pub keywords: Vec<String>,
}

impl Allergen {
    pub fn from_input(id: AllergenId, input: AllergenInput) -> Self {
        Self { id, name: input.name, severity: input.severity, keywords: input.keywords }
    }
}

/// 命中位置（预留，当前始终为空）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPosition {
    pub start: usize,
    pub end: usize,
}

/// 单条命中：保存扫描时刻的名称与严重程度快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub allergen: String,
    pub keyword_found: String,
    pub severity: Severity,
    #[serde(default)]
    pub position: Option<MatchPosition>,
}

/// 扫描结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub safe: bool,
    pub matches: Vec<MatchResult>,
    /// 扫描完成时间（RFC 3339）
    pub timestamp: String,
    /// 选择中无法解析的 id（仅在非空时序列化）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved_ids: Vec<AllergenId>,
}

/// 批量输出项（对应输出 JSON 数组的单个元素）
#[derive(Debug, Clone, Serialize)]
pub struct OutputItem<'a> {
    pub source: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<&'a ScanResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}
