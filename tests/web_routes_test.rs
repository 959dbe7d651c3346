use anyhow::bail;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use heart_risk_service::config::AppConfig;
use heart_risk_service::ledger::{ContractArtifact, PatientRegistry, PredictionRecorder, RpcClient};
use heart_risk_service::metrics::ServiceMetrics;
use heart_risk_service::models::{InferenceEngine, RiskModel};
use heart_risk_service::types::prediction::ModelKind;
use heart_risk_service::web::{self, AppState};
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const FEATURES: &str =
    "age=63&sex=1&cp=3&trestbps=145&chol=233&fbs=1&restecg=0&thalach=150&exang=0&oldpeak=2.3&slope=0&ca=0&thal=1";
const PATIENT: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

struct FixedModel(f64);

impl RiskModel for FixedModel {
    fn name(&self) -> &str {
        "fixed"
    }

    fn predict_proba(&self, features: &[f32]) -> anyhow::Result<f64> {
        assert_eq!(features.len(), 13);
        Ok(self.0)
    }
}

struct BrokenModel;

impl RiskModel for BrokenModel {
    fn name(&self) -> &str {
        "broken"
    }

    fn predict_proba(&self, _features: &[f32]) -> anyhow::Result<f64> {
        bail!("session closed")
    }
}

fn engine() -> InferenceEngine {
    InferenceEngine::from_models([
        (ModelKind::GradientBoosting, Arc::new(FixedModel(0.75)) as Arc<dyn RiskModel>),
        (ModelKind::RandomForest, Arc::new(FixedModel(0.5)) as Arc<dyn RiskModel>),
        (ModelKind::Knn, Arc::new(FixedModel(0.25)) as Arc<dyn RiskModel>),
    ])
}

fn app_with(engine: InferenceEngine, recorder: Option<PredictionRecorder>) -> (Router, Arc<ServiceMetrics>) {
    let metrics = Arc::new(ServiceMetrics::new());
    let state = AppState::new(&AppConfig::default(), engine, recorder, metrics.clone());
    (web::router(Arc::new(state)), metrics)
}

fn app() -> Router {
    app_with(engine(), None).0
}

fn post_form(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_home_lists_classifiers() {
    let (status, body) = send(app(), get("/?hhNumber=42&patientAddress=0xabc")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Heart Disease Classifier"));
    assert!(body.contains("/showknn?hhNumber=42"));
}

#[tokio::test]
async fn test_show_form_keeps_identity() {
    let (status, body) = send(app(), get("/showgb?hhNumber=42&patientAddress=0xabc")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("action=\"/predictgb\""));
    assert!(body.contains("name=\"hhNumber\" value=\"42\""));
    assert!(body.contains("name=\"thalach\""));
    assert!(!body.contains("Risk is"));
}

#[tokio::test]
async fn test_random_forest_prediction() {
    let (status, body) = send(app(), post_form("/predictrf", FEATURES.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Probability of having heart disease: 50.0"));
    assert!(body.contains("Risk is MEDIUM"));
}

#[tokio::test]
async fn test_knn_prediction() {
    let (status, body) = send(app(), post_form("/predictknn", FEATURES.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("25.0"));
    assert!(body.contains("Risk is LOW"));
}

#[tokio::test]
async fn test_primary_classifier_requires_hh_number() {
    let (status, body) = send(app(), post_form("/predictgb", FEATURES.to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Patient identifier missing");
}

#[tokio::test]
async fn test_primary_classifier_rejects_bad_address() {
    let form = format!("hhNumber=42&patientAddress=abc&{}", FEATURES);
    let (status, body) = send(app(), post_form("/predictgb", form)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Invalid or missing patient address");
}

#[tokio::test]
async fn test_primary_classifier_without_ledger() {
    let form = format!("hhNumber=42&patientAddress={}&{}", PATIENT, FEATURES);
    let (status, body) = send(app(), post_form("/predictgb", form)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Risk is HIGH"));
    assert!(body.contains("name=\"hhNumber\" value=\"42\""));
}

#[tokio::test]
async fn test_invalid_feature_value() {
    let form = FEATURES.replace("chol=233", "chol=abc");
    let (status, body) = send(app(), post_form("/predictrf", form)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Invalid input detected: chol=abc");
}

#[tokio::test]
async fn test_wrong_feature_count() {
    let (status, _) = send(app(), post_form("/predictknn", "age=63&sex=1".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_inference_failure_is_server_error() {
    let engine = InferenceEngine::from_models([(
        ModelKind::RandomForest,
        Arc::new(BrokenModel) as Arc<dyn RiskModel>,
    )]);
    let (app, metrics) = app_with(engine, None);

    let (status, body) = send(app, post_form("/predictrf", FEATURES.to_string())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("session closed"));
    assert_eq!(metrics.snapshot().inference_errors, 1);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = app_with(engine(), None);

    send(app.clone(), post_form("/predictrf", FEATURES.to_string())).await;
    send(app.clone(), post_form("/predictgb", FEATURES.to_string())).await;

    let (status, body) = send(app, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);

    let snapshot: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(snapshot["predictions"], 1);
    assert_eq!(snapshot["rejected"], 1);
    assert_eq!(snapshot["by_risk_level"]["MEDIUM"], 1);
}

#[tokio::test]
async fn test_ledger_failure_does_not_fail_request() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32000, "message": "execution reverted"}
            }));
        })
        .await;

    let artifact = ContractArtifact::from_json_str(
        r#"{
            "contractName": "PatientRegistration",
            "abi": [
                {"type": "function", "name": "getPatientDetails", "stateMutability": "view",
                 "inputs": [{"name": "_hhNumber", "type": "string"}],
                 "outputs": [{"name": "walletAddress", "type": "address"}]}
            ],
            "networks": {"5777": {"address": "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359"}}
        }"#,
    )
    .unwrap();
    let deployment = artifact.deployment(None).unwrap();
    let rpc = RpcClient::new(server.url("/"), Duration::from_secs(5)).unwrap();
    let registry = PatientRegistry::new(rpc, deployment.address, &artifact).unwrap();
    let recorder = PredictionRecorder::new(registry, &AppConfig::default().blockchain);

    let (app, metrics) = app_with(engine(), Some(recorder));
    let form = format!("hhNumber=42&patientAddress={}&{}", PATIENT, FEATURES);
    let (status, body) = send(app, post_form("/predictgb", form)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Risk is HIGH"));
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.ledger_writes, 0);
    assert_eq!(snapshot.ledger_failures, 1);
}
