use std::sync::Arc;

use allerscan_core::{AllergenCatalog, CommandExtractor, ExtractCommands, MemoryHistory, ScanService};
use allerscan_server::{create_router, AppState};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

async fn spawn_app() -> String {
    let store = Arc::new(AllergenCatalog::in_memory());
    let history = Arc::new(MemoryHistory::new());
    // 测试环境不依赖 OCR / PDF 工具：未配置的类型抽取结果为空
    let extractor = CommandExtractor::new(ExtractCommands { image: Vec::new(), pdf: Vec::new(), word: Vec::new() });
    let state = AppState { service: ScanService::new(store, history), extractor: Arc::new(extractor) };

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

async fn create_allergen(base_url: &str, name: &str, severity: &str, keywords: &[&str]) -> String {
    let resp = Client::new()
        .post(format!("{}/api/allergens", base_url))
        .json(&json!({ "name": name, "severity": severity, "keywords": keywords }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Allergen added successfully");
    body["id"].as_str().unwrap().to_string()
}

async fn post_scan(base_url: &str, form: Form) -> (StatusCode, Value) {
    let resp = Client::new().post(format!("{}/api/scan", base_url)).multipart(form).send().await.unwrap();
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn health_reports_service() {
    let base_url = spawn_app().await;
    let body: Value = reqwest::get(format!("{}/api/health", base_url)).await.unwrap().json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "Allergy Detector API");
}

#[tokio::test]
async fn allergen_crud_flow() {
    let base_url = spawn_app().await;
    let client = Client::new();
    let id = create_allergen(&base_url, "Peanut", "HIGH", &["peanut"]).await;

    let list: Value = client.get(format!("{}/api/allergens", base_url)).send().await.unwrap().json().await.unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["id"], id.as_str());
    assert_eq!(list[0]["severity"], "HIGH");

    let resp = client
        .put(format!("{}/api/allergens/{}", base_url, id))
        .json(&json!({ "name": "Peanut", "severity": "MEDIUM", "keywords": ["peanut", "groundnut"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Allergen updated successfully");

    let list: Value = client.get(format!("{}/api/allergens", base_url)).send().await.unwrap().json().await.unwrap();
    assert_eq!(list[0]["keywords"], json!(["peanut", "groundnut"]));

    let resp = client.delete(format!("{}/api/allergens/{}", base_url, id)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.delete(format!("{}/api/allergens/{}", base_url, id)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn allergen_errors_map_to_status_codes() {
    let base_url = spawn_app().await;
    let client = Client::new();
    create_allergen(&base_url, "Milk", "LOW", &["milk"]).await;

    let resp = client
        .post(format!("{}/api/allergens", base_url))
        .json(&json!({ "name": "Milk", "severity": "LOW", "keywords": ["dairy"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = client
        .post(format!("{}/api/allergens", base_url))
        .json(&json!({ "name": "Soy", "severity": "LOW", "keywords": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client.delete(format!("{}/api/allergens/not-an-id", base_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_allergen_payloads_are_bad_requests() {
    let base_url = spawn_app().await;
    let client = Client::new();
    let id = create_allergen(&base_url, "Egg", "LOW", &["egg"]).await;

    let bodies = [
        json!({ "name": "Soy", "severity": "high", "keywords": ["soy"] }),
        json!({ "name": "Soy", "severity": "HIGH" }),
    ];
    for body in &bodies {
        let resp = client.post(format!("{}/api/allergens", base_url)).json(body).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let err: Value = resp.json().await.unwrap();
        assert!(err["error"].as_str().is_some());
    }

    let resp = client
        .put(format!("{}/api/allergens/{}", base_url, id))
        .json(&json!({ "name": "Egg", "severity": "low", "keywords": ["egg"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err: Value = resp.json().await.unwrap();
    assert!(err["error"].as_str().unwrap().contains("severity"));

    let list: Value = client.get(format!("{}/api/allergens", base_url)).send().await.unwrap().json().await.unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn scan_text_reports_matches() {
    let base_url = spawn_app().await;
    let dust = create_allergen(&base_url, "Dust", "MEDIUM", &["dust"]).await;
    let peanut = create_allergen(&base_url, "Peanut", "HIGH", &["peanut butter"]).await;

    let form = Form::new()
        .text("selected_allergen_ids", dust)
        .text("selected_allergen_ids", peanut)
        .text("text", "There is heavy housedust today");
    let (status, body) = post_scan(&base_url, form).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["safe"], false);
    assert_eq!(body["matches"].as_array().unwrap().len(), 1);
    assert_eq!(body["matches"][0]["keyword_found"], "dust");
    assert_eq!(body["matches"][0]["allergen"], "Dust");
    assert!(body["matches"][0]["position"].is_null());
    assert!(body["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn scan_accepts_comma_separated_ids() {
    let base_url = spawn_app().await;
    let milk = create_allergen(&base_url, "Milk", "LOW", &["milk"]).await;
    let egg = create_allergen(&base_url, "Egg", "LOW", &["egg"]).await;

    let form = Form::new().text("selected_allergen_ids", format!("{milk},{egg}")).text("text", "milk and egg omelette");
    let (status, body) = post_scan(&base_url, form).await;
    assert_eq!(status, StatusCode::OK);
    let found: Vec<&str> = body["matches"].as_array().unwrap().iter().map(|m| m["keyword_found"].as_str().unwrap()).collect();
    assert_eq!(found, vec!["milk", "egg"]);
}

#[tokio::test]
async fn scan_validation_failures() {
    let base_url = spawn_app().await;
    let milk = create_allergen(&base_url, "Milk", "LOW", &["milk"]).await;

    let (status, body) = post_scan(&base_url, Form::new().text("text", "milk")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No allergens selected for scan.");

    let (status, body) = post_scan(&base_url, Form::new().text("selected_allergen_ids", milk.clone()).text("text", "   ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Could not extract any readable text from the input.");

    let zip = Part::bytes(vec![0x50, 0x4b, 0x03, 0x04]).file_name("a.zip").mime_str("application/zip").unwrap();
    let (status, body) = post_scan(&base_url, Form::new().text("selected_allergen_ids", milk.clone()).part("file", zip)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("unsupported file type"));

    // 图片抽取不可用 → 空文本 → 校验失败
    let png = Part::bytes(vec![0x89, 0x50, 0x4e, 0x47]).file_name("label.png").mime_str("image/png").unwrap();
    let (status, body) = post_scan(&base_url, Form::new().text("selected_allergen_ids", milk).part("file", png)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Could not extract any readable text from the input.");
}

#[tokio::test]
async fn scan_plain_text_upload_and_history() {
    let base_url = spawn_app().await;
    let milk = create_allergen(&base_url, "Milk", "LOW", &["milk"]).await;

    let txt = Part::bytes(b"Contains: skimmed MILK powder".to_vec()).file_name("label.txt").mime_str("text/plain").unwrap();
    let (status, body) = post_scan(&base_url, Form::new().text("selected_allergen_ids", milk.clone()).part("file", txt)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matches"][0]["keyword_found"], "milk");

    let (status, body) = post_scan(&base_url, Form::new().text("selected_allergen_ids", milk).text("text", "water")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["safe"], true);

    let history: Value = reqwest::get(format!("{}/api/scans?limit=1", base_url)).await.unwrap().json().await.unwrap();
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["safe"], true);
}

#[tokio::test]
async fn scan_reports_unknown_ids() {
    let base_url = spawn_app().await;
    let milk = create_allergen(&base_url, "Milk", "LOW", &["milk"]).await;

    let form = Form::new()
        .text("selected_allergen_ids", milk)
        .text("selected_allergen_ids", "ghost")
        .text("text", "milk");
    let (status, body) = post_scan(&base_url, form).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unresolved_ids"], json!(["ghost"]));
    assert_eq!(body["matches"].as_array().unwrap().len(), 1);
}
