//! 文本抽取（图片 OCR / PDF / Word / 纯文本）
//!
//! 抽取是尽力而为：任何失败都返回空字符串并记录告警，由扫描入口视为“无可读文本”。
//! 外部工具经 stdin 接收原始字节、从 stdout 输出文本，命令在配置中指定。
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::options::ExtractCommands;

/// 支持的内容类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Image,
    Pdf,
    Word,
    PlainText,
}

impl ContentKind {
    /// 按 MIME 类型判定（忽略参数部分，如 `; charset=utf-8`）
    pub fn from_mime(mime: &str) -> Result<Self, ExtractError> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/png" => Ok(ContentKind::Image),
            "application/pdf" => Ok(ContentKind::Pdf),
            "application/msword"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Ok(ContentKind::Word),
            "text/plain" => Ok(ContentKind::PlainText),
            _ => Err(ExtractError::UnsupportedContentType(mime.to_string())),
        }
    }

    /// 按文件扩展名判定
    pub fn from_path(path: &Path) -> Result<Self, ExtractError> {
        let ext = path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" | "png" => Ok(ContentKind::Image),
            "pdf" => Ok(ContentKind::Pdf),
            "doc" | "docx" => Ok(ContentKind::Word),
            "txt" | "text" | "md" => Ok(ContentKind::PlainText),
            _ => Err(ExtractError::UnsupportedContentType(path.display().to_string())),
        }
    }
}

pub trait TextExtractor: Send + Sync {
    /// 尽力抽取文本；失败返回空字符串，从不报错
    fn extract(&self, bytes: &[u8], kind: ContentKind) -> String;
}

/// 通过外部命令抽取
#[derive(Debug, Clone, Default)]
pub struct CommandExtractor {
    commands: ExtractCommands,
}

impl CommandExtractor {
    pub fn new(commands: ExtractCommands) -> Self {
        Self { commands }
    }

    fn argv(&self, kind: ContentKind) -> &[String] {
        match kind {
            ContentKind::Image => self.commands.image.as_slice(),
            ContentKind::Pdf => self.commands.pdf.as_slice(),
            ContentKind::Word => self.commands.word.as_slice(),
            ContentKind::PlainText => &[],
        }
    }
}

impl TextExtractor for CommandExtractor {
    fn extract(&self, bytes: &[u8], kind: ContentKind) -> String {
        if kind == ContentKind::PlainText {
            return String::from_utf8_lossy(bytes).into_owned();
        }
        let argv = self.argv(kind);
        let Some((program, args)) = argv.split_first() else {
            warn!(?kind, "no extraction command configured");
            return String::new();
        };
        match run_filter(program, args, bytes) {
            Ok(text) => {
                debug!(?kind, program = %program, chars = text.len(), "text extracted");
                text
            }
            Err(e) => {
                warn!(?kind, program = %program, error = %e, "text extraction failed");
                String::new()
            }
        }
    }
}

/// 以 stdin → stdout 方式运行外部程序
fn run_filter(program: &str, args: &[String], input: &[u8]) -> anyhow::Result<String> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // 写 stdin 放在独立线程，避免大输出时管道互相阻塞
    let mut stdin = child.stdin.take().ok_or_else(|| anyhow::anyhow!("stdin unavailable"))?;
    let input = input.to_vec();
    let writer = std::thread::spawn(move || stdin.write_all(&input));

    let output = child.wait_with_output()?;
    let _ = writer.join();
    if !output.status.success() {
        anyhow::bail!(
            "exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
