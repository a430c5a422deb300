//! HTTP 处理函数与共享状态
//!
//! 存储读写、文本抽取（OCR 可能很慢）与扫描都放到阻塞线程池执行，不占用异步运行时。
use std::sync::Arc;

use allerscan_core::{Allergen, AllergenInput, ContentKind, ScanResult, ScanService, TextExtractor};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use crate::errors::ApiError;
use crate::models::{HealthResponse, HistoryQuery, MessageResponse};

pub const SERVICE_NAME: &str = "Allergy Detector API";

/// 每个处理函数经 `State` 获取的共享状态
#[derive(Clone)]
pub struct AppState {
    pub service: ScanService,
    pub extractor: Arc<dyn TextExtractor>,
}

async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("worker task failed: {e}")))?
}

/// `GET /api/health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok".into(), service: SERVICE_NAME.into() })
}

/// `POST /api/allergens`
pub async fn create_allergen(
    State(state): State<AppState>,
    payload: Result<Json<AllergenInput>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(input) = payload?;
    let created = blocking(move || Ok(state.service.store().create(input)?)).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse { message: "Allergen added successfully".into(), id: Some(created.id) }),
    ))
}

/// `GET /api/allergens`
pub async fn list_allergens(State(state): State<AppState>) -> Result<Json<Vec<Allergen>>, ApiError> {
    let all = blocking(move || Ok(state.service.store().list_all()?)).await?;
    Ok(Json(all))
}

/// `PUT /api/allergens/:id`
pub async fn update_allergen(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AllergenInput>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(input) = payload?;
    blocking(move || Ok(state.service.store().update(&id, input)?)).await?;
    Ok(Json(MessageResponse::new("Allergen updated successfully")))
}

/// `DELETE /api/allergens/:id`
pub async fn delete_allergen(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    blocking(move || Ok(state.service.store().delete(&id)?)).await?;
    Ok(Json(MessageResponse::new("Allergen deleted successfully")))
}

/// 上传的文件部分
struct Upload {
    content_type: Option<String>,
    file_name: Option<String>,
    data: Vec<u8>,
}

/// `POST /api/scan`（multipart）
///
/// 字段：`selected_allergen_ids`（可重复，也接受逗号分隔）、`text`、`file`。
/// 同时给出 text 与 file 时以 text 为准。
pub async fn scan(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<ScanResult>, ApiError> {
    let mut ids: Vec<String> = Vec::new();
    let mut text: Option<String> = None;
    let mut upload: Option<Upload> = None;

    let bad_form = |e: axum::extract::multipart::MultipartError| ApiError::BadRequest(format!("invalid form data: {e}"));
    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "selected_allergen_ids" => {
                let raw = field.text().await.map_err(bad_form)?;
                ids.extend(raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string));
            }
            "text" => text = Some(field.text().await.map_err(bad_form)?),
            "file" => {
                let content_type = field.content_type().map(str::to_string);
                let file_name = field.file_name().map(str::to_string);
                let data = field.bytes().await.map_err(bad_form)?.to_vec();
                upload = Some(Upload { content_type, file_name, data });
            }
            _ => {}
        }
    }

    if ids.is_empty() {
        return Err(ApiError::BadRequest("No allergens selected for scan.".into()));
    }

    let analysis_text = match (text.filter(|t| !t.is_empty()), upload) {
        (Some(t), _) => t,
        (None, Some(up)) => {
            let mime = up.content_type.unwrap_or_default();
            let kind = ContentKind::from_mime(&mime)?;
            info!(?kind, file = ?up.file_name, bytes = up.data.len(), "extracting uploaded file");
            let extractor = Arc::clone(&state.extractor);
            blocking(move || Ok(extractor.extract(&up.data, kind))).await?
        }
        (None, None) => String::new(),
    };

    if analysis_text.trim().is_empty() {
        return Err(ApiError::BadRequest("Could not extract any readable text from the input.".into()));
    }

    let service = state.service.clone();
    let result = blocking(move || Ok(service.scan(&analysis_text, &ids)?)).await?;
    Ok(Json(result))
}

/// `GET /api/scans?limit=N`
pub async fn list_scans(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ScanResult>>, ApiError> {
    let limit = query.effective_limit();
    let recent = blocking(move || Ok(state.service.history().recent(limit)?)).await?;
    Ok(Json(recent))
}
