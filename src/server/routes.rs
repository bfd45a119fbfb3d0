//! Route handlers.
//!
//! Handlers only translate HTTP to service calls; every service call runs on
//! the blocking pool via [`run_blocking`].

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::state::AppState;
use super::worker::run_blocking;
use crate::domain::{Domain, PredictionRecord, RiskLevel, UserId, Votes};
use crate::ports::PredictionPage;
use crate::GlimpseError;

const DEFAULT_PAGE_SIZE: usize = 20;

type AppResult<T> = Result<T, GlimpseError>;

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| GlimpseError::InvalidRequest(e.body_text()))
}

/// Resolve the caller from the `Authorization` header.
async fn authenticate(state: &Arc<AppState>, headers: &HeaderMap) -> AppResult<UserId> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(GlimpseError::Unauthenticated)?
        .to_string();
    let state = Arc::clone(state);
    run_blocking(move || state.auth.resolve(&header)).await
}

/// Stored prediction as returned to clients.
#[derive(Debug, Serialize)]
pub struct RecordView {
    pub id: String,
    pub domain: Domain,
    #[serde(flatten)]
    pub votes: Votes,
    pub risk: RiskLevel,
    pub features: Value,
    pub created_at: DateTime<Utc>,
}

impl From<PredictionRecord> for RecordView {
    fn from(record: PredictionRecord) -> Self {
        Self {
            features: record.features.to_json(),
            id: record.id,
            domain: record.domain,
            votes: record.votes,
            risk: record.risk,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryView {
    pub items: Vec<RecordView>,
    pub total_count: usize,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
    pub next_offset: Option<usize>,
}

impl From<PredictionPage> for HistoryView {
    fn from(page: PredictionPage) -> Self {
        Self {
            next_offset: page.next_offset(),
            total_count: page.total_count,
            offset: page.offset,
            limit: page.limit,
            has_more: page.has_more,
            items: page.items.into_iter().map(RecordView::from).collect(),
        }
    }
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    name: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterBody>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let body = json_body(payload)?;
    run_blocking(move || state.auth.register(&body.email, &body.name, &body.password)).await?;
    Ok((StatusCode::CREATED, Json(json!({ "msg": "ok" }))))
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginBody>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let body = json_body(payload)?;
    let token = run_blocking(move || state.auth.login(&body.email, &body.password)).await?;
    Ok(Json(json!({ "token": token.as_str() })))
}

pub async fn session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let user = authenticate(&state, &headers).await?;
    Ok(Json(json!({ "userId": user })))
}

async fn assess(
    state: Arc<AppState>,
    domain: Domain,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let raw = json_body(payload)?;
    let assessment = run_blocking(move || state.inference.assess(domain, &raw)).await?;
    Ok(Json(assessment))
}

pub async fn predict_diabetes(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    assess(state, Domain::Diabetes, payload).await
}

pub async fn predict_heart_disease(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    assess(state, Domain::HeartDisease, payload).await
}

async fn record(
    state: Arc<AppState>,
    headers: HeaderMap,
    domain: Domain,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let user = authenticate(&state, &headers).await?;
    let raw = json_body(payload)?;
    let record =
        run_blocking(move || state.inference.assess_and_record(user, domain, &raw)).await?;
    Ok((StatusCode::CREATED, Json(RecordView::from(record))))
}

pub async fn record_diabetes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    record(state, headers, Domain::Diabetes, payload).await
}

pub async fn record_heart_disease(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    record(state, headers, Domain::HeartDisease, payload).await
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    domain: Option<String>,
    offset: Option<usize>,
    limit: Option<usize>,
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let user = authenticate(&state, &headers).await?;
    let Query(query) = query.map_err(|e| GlimpseError::InvalidRequest(e.body_text()))?;
    let domain = query
        .domain
        .as_deref()
        .map(str::parse::<Domain>)
        .transpose()
        .map_err(GlimpseError::InvalidRequest)?;
    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);

    let page = run_blocking(move || state.inference.history(user, domain, offset, limit)).await?;
    Ok(Json(HistoryView::from(page)))
}

pub async fn analytics(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let user = authenticate(&state, &headers).await?;
    let report = run_blocking(move || state.analytics.report(user)).await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::SqliteStorage;
    use crate::application::test_support::stub_registry;
    use crate::application::ModelRegistry;
    use crate::domain::PasswordPolicy;
    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, Request};
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app_with(models: ModelRegistry) -> Router {
        let state = AppState::new(
            models,
            SqliteStorage::in_memory().expect("Should create db"),
            PasswordPolicy {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
        );
        crate::server::router(state, &[])
    }

    fn app() -> Router {
        app_with(stub_registry([1, 1, 0], [1, 1, 1]))
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    async fn signed_in(app: &Router) -> String {
        let (status, _) = send(
            app,
            "POST",
            "/auth/register",
            None,
            Some(json!({"email": "ana@example.com", "password": "pw", "name": "Ana"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            app,
            "POST",
            "/auth/login",
            None,
            Some(json!({"email": "ana@example.com", "password": "pw"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().expect("token").to_string()
    }

    fn diabetes_body() -> Value {
        json!({
            "Pregnancies": 6, "Glucose": 148, "BloodPressure": 72, "SkinThickness": 35,
            "Insulin": 0, "BMI": 33.6, "DiabetesPedigreeFunction": 0.627, "Age": 50
        })
    }

    fn heart_body() -> Value {
        json!({
            "age": 63, "sex": 1, "cp": 3, "trestbps": 145, "chol": 233, "fbs": 1,
            "restecg": 0, "thalach": 150, "exang": 0, "oldpeak": 2.3, "slope": 0,
            "ca": 0, "thal": 1
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_anonymous_prediction() {
        let app = app();
        let (status, body) =
            send(&app, "POST", "/ai/predict_diabetes", None, Some(diabetes_body())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"tabpfn": 1, "xgb": 1, "lgb": 0, "risk": "medium"}));

        let (status, body) =
            send(&app, "POST", "/ai/predict_heart_disease", None, Some(heart_body())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["risk"], "high");
    }

    #[tokio::test]
    async fn test_missing_feature_is_bad_request() {
        let mut body = diabetes_body();
        body.as_object_mut().expect("object").remove("Glucose");
        let (status, body) = send(&app(), "POST", "/ai/predict_diabetes", None, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().expect("error").contains("Glucose"));
    }

    #[tokio::test]
    async fn test_malformed_national_id_is_bad_request() {
        let (status, _) = send(
            &app(),
            "POST",
            "/ai/predict_heart_disease",
            None,
            Some(json!({"cnp": "12ab"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_models_not_loaded() {
        let app = app_with(ModelRegistry::empty());
        let (status, body) =
            send(&app, "POST", "/ai/predict_diabetes", None, Some(diabetes_body())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_auth_flow() {
        let app = app();
        let token = signed_in(&app).await;

        let (status, body) = send(&app, "GET", "/auth/session", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["userId"], 1);

        let (status, body) = send(
            &app,
            "POST",
            "/auth/register",
            None,
            Some(json!({"email": "ANA@example.com", "password": "x", "name": "Other"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Email already used");

        let (status, _) = send(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({"email": "ana@example.com", "password": "wrong"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, "GET", "/auth/session", Some("deadbeef"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/auth/login")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .expect("request");
        let response = app().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_recorded_predictions_require_session() {
        let (status, _) = send(
            &app(),
            "POST",
            "/predictions/diabetes",
            None,
            Some(diabetes_body()),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_record_history_analytics() {
        let app = app();
        let token = signed_in(&app).await;

        let (status, created) = send(
            &app,
            "POST",
            "/predictions/diabetes",
            Some(&token),
            Some(diabetes_body()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["risk"], "medium");
        assert_eq!(created["domain"], "diabetes");
        assert!(created["id"].is_string());
        assert!(created["created_at"].is_string());

        let (status, _) = send(
            &app,
            "POST",
            "/predictions/heart_disease",
            Some(&token),
            Some(heart_body()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, page) = send(&app, "GET", "/predictions/history", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total_count"], 2);
        assert_eq!(page["has_more"], false);

        let (status, page) = send(
            &app,
            "GET",
            "/predictions/history?domain=diabetes&limit=1",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["items"].as_array().expect("items").len(), 1);
        assert_eq!(page["items"][0]["id"], created["id"]);

        let (status, _) = send(
            &app,
            "GET",
            "/predictions/history?domain=lungs",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, report) =
            send(&app, "GET", "/predictions/analytics", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["counts"]["diabetes"]["medium"], 1);
        assert_eq!(report["counts"]["heart_disease"]["high"], 1);
        assert_eq!(report["latest"]["heart_disease"], "high");
        assert_eq!(report["trend"].as_array().expect("trend").len(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_offset_keeps_storage_usable() {
        let app = app();
        let token = signed_in(&app).await;

        let (status, _) = send(
            &app,
            "POST",
            "/predictions/diabetes",
            Some(&token),
            Some(diabetes_body()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            &app,
            "GET",
            "/predictions/history?offset=18446744073709551615",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, page) = send(&app, "GET", "/predictions/history", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total_count"], 1);

        let (status, _) = send(&app, "GET", "/auth/session", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
