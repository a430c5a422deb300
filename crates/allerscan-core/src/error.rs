//! 错误类型
use thiserror::Error;

/// 存储层错误（含输入校验）
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid allergen id format: {0}")]
    InvalidId(String),
    #[error("allergen with id '{0}' not found")]
    NotFound(String),
    #[error("allergen with name '{0}' already exists")]
    DuplicateName(String),
    #[error("invalid allergen: {0}")]
    Invalid(String),
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// 扫描入口错误：前置校验失败在匹配之前返回
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("no allergens selected for scan")]
    NoAllergensSelected,
    #[error("could not extract any readable text from the input")]
    EmptyText,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 文本抽取边界错误
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedContentType(String),
}
