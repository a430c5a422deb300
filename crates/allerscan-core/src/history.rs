//! 扫描历史（仅追加）
//!
//! 历史写入对扫描结果没有影响：失败只记录日志，见 `scan::ScanService`。
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::error::StoreError;
use crate::types::ScanResult;

/// 历史文件名（位于数据目录下）
pub const HISTORY_FILE: &str = "scans.jsonl";

pub trait HistoryStore: Send + Sync {
    fn append(&self, result: &ScanResult) -> Result<(), StoreError>;
    /// 最近的记录，新的在前
    fn recent(&self, limit: usize) -> Result<Vec<ScanResult>, StoreError>;
}

/// 内存历史（测试 / 嵌入式使用）
#[derive(Default)]
pub struct MemoryHistory {
    entries: Mutex<Vec<ScanResult>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryStore for MemoryHistory {
    fn append(&self, result: &ScanResult) -> Result<(), StoreError> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).push(result.clone());
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<ScanResult>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }
}

/// 不保存任何内容（配置 `history = false`）
pub struct NoHistory;

impl HistoryStore for NoHistory {
    fn append(&self, _result: &ScanResult) -> Result<(), StoreError> {
        Ok(())
    }

    fn recent(&self, _limit: usize) -> Result<Vec<ScanResult>, StoreError> {
        Ok(Vec::new())
    }
}

/// JSON Lines 文件：每行一个 ScanResult，整行写入
pub struct JsonlHistory {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlHistory {
    pub fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf(), lock: Mutex::new(()) }
    }
}

impl HistoryStore for JsonlHistory {
    fn append(&self, result: &ScanResult) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(result)?;
        line.push(b'\n');
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(&line)?;
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<ScanResult>, StoreError> {
        let txt = {
            let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
            match fs::read_to_string(&self.path) {
                Ok(t) => t,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            }
        };
        let lines: Vec<&str> = txt.lines().collect();
        let mut out = Vec::new();
        for (lineno, line) in lines.iter().enumerate().rev() {
            if out.len() >= limit { break; }
            if line.trim().is_empty() { continue; }
            match serde_json::from_str::<ScanResult>(line) {
                Ok(r) => out.push(r),
                Err(e) => warn!(path = %self.path.display(), line = lineno + 1, error = %e, "skipping malformed history line"),
            }
        }
        Ok(out)
    }
}
