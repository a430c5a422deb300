//! 请求 / 响应 DTO
use serde::{Deserialize, Serialize};

/// 历史查询默认条数
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
/// 历史查询上限
pub const MAX_HISTORY_LIMIT: usize = 500;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self { message: message.to_string(), id: None }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

impl HistoryQuery {
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT)
    }
}
