//! 服务配置、批量扫描选项与统计信息
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::history::HISTORY_FILE;
use crate::store::ALLERGENS_FILE;

/// 默认监听地址
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8000";

/// 服务配置（TOML，可选；缺失时使用默认值）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// 数据目录：allergens.json 与 scans.jsonl 所在位置
    pub data_dir: PathBuf,
    /// HTTP 监听地址
    pub listen: String,
    /// 是否记录扫描历史
    pub history: bool,
    /// 文本抽取外部命令
    pub extract: ExtractCommands,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            listen: DEFAULT_LISTEN.to_string(),
            history: true,
            extract: ExtractCommands::default(),
        }
    }
}

impl ServiceConfig {
    /// 读取配置文件；未指定或文件不存在时返回默认配置
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else { return Ok(Self::default()) };
        if !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let txt = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let cfg = toml::from_str::<ServiceConfig>(&txt)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn allergens_path(&self) -> PathBuf {
        self.data_dir.join(ALLERGENS_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILE)
    }
}

/// 各内容类型对应的抽取命令（argv）；输入经 stdin，文本从 stdout 读取
/// 空数组表示该类型不可抽取
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractCommands {
    pub image: Vec<String>,
    pub pdf: Vec<String>,
    pub word: Vec<String>,
}

impl Default for ExtractCommands {
    fn default() -> Self {
        let argv = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            image: argv(&["tesseract", "stdin", "stdout"]),
            pdf: argv(&["pdftotext", "-", "-"]),
            word: argv(&["pandoc", "--from=docx", "--to=plain"]),
        }
    }
}

/// 批量（多文件）扫描选项
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// 最大文件大小（字节）；超过则该文件报错，不做抽取
    pub max_file_size: Option<u64>,
    /// 线程数：None 表示自动（等于 CPU 核数）；Some(1) 走串行
    pub threads: Option<usize>,
}

/// 批量扫描统计信息（便于 CLI 打印）
#[derive(Debug, Default, Clone)]
pub struct ScanStats {
    pub files_scanned: usize,
    pub files_failed: usize,
    pub matches_total: usize,
}
