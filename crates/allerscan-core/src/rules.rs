//! 过敏原目录文件加载（TOML）与导入
use anyhow::Result;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::store::AllergenStore;
use crate::types::{AllergenInput, Severity};

/// 目录中的单条过敏原
#[derive(Debug, Clone, Deserialize)]
struct CatalogEntry {
    name: String,
    severity: String,
    #[serde(default)]
    keywords: Vec<String>,
}

/// 顶层目录文件结构
#[derive(Debug, Clone, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    allergens: Vec<CatalogEntry>,
}

/// 导入结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub created: usize,
    pub skipped: usize,
}

/// 从 TOML 目录文件加载；无效条目（严重程度非法、缺少关键词等）跳过并告警
pub fn load_catalog(path: &Path) -> Result<Vec<AllergenInput>> {
    let txt = std::fs::read_to_string(path)?;
    parse_catalog(&txt)
}

pub fn parse_catalog(txt: &str) -> Result<Vec<AllergenInput>> {
    let parsed: CatalogFile = toml::from_str(txt)?;
    let mut out = Vec::new();

    for e in parsed.allergens {
        let severity = match e.severity.parse::<Severity>() {
            Ok(s) => s,
            Err(err) => {
                warn!(name = %e.name, error = %err, "skipping catalog entry");
                continue;
            }
        };
        let input = AllergenInput { name: e.name, severity, keywords: e.keywords };
        if let Err(err) = input.validate() {
            warn!(name = %input.name, error = %err, "skipping catalog entry");
            continue;
        }
        out.push(input);
    }

    Ok(out)
}

/// 逐条写入存储；同名已存在时跳过
pub fn import_catalog(store: &dyn AllergenStore, inputs: Vec<AllergenInput>) -> Result<ImportStats, StoreError> {
    let mut stats = ImportStats::default();
    for input in inputs {
        match store.create(input) {
            Ok(_) => stats.created += 1,
            Err(StoreError::DuplicateName(name)) => {
                warn!(%name, "allergen already exists, skipped");
                stats.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    info!(created = stats.created, skipped = stats.skipped, "catalog imported");
    Ok(stats)
}
