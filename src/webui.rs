use crate::config::AppConfig;
use crate::dashboard::{self, DashboardSnapshot};
use crate::data::CachedProvider;
use crate::lead::{Acknowledgment, LeadForm};
use anyhow::Result;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

const INDEX_HTML: &str = include_str!("../web/index.html");
const APP_JS: &str = include_str!("../web/app.js");

#[derive(Clone)]
struct WebState {
    config: Arc<AppConfig>,
    provider: Arc<CachedProvider>,
}

#[derive(Clone, Debug, Serialize)]
struct ApiError {
    error: String,
}

#[derive(Debug, Serialize)]
struct UniverseResponse {
    symbols: Vec<String>,
    benchmark: String,
    fx: String,
    top_k: usize,
    lookback_days: i64,
}

#[derive(Debug, Deserialize)]
struct AnalysisRequest {
    symbols: Vec<String>,
}

fn router(state: WebState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/app.js", get(app_js))
        .route("/api/health", get(health))
        .route("/api/universe", get(universe))
        .route("/api/analysis", post(analysis))
        .route("/api/lead", post(lead))
        .with_state(state)
}

pub async fn run_webui_server(port: u16, config: AppConfig, provider: Arc<CachedProvider>) -> Result<()> {
    let state = WebState {
        config: Arc::new(config),
        provider,
    };

    let addr = format!("0.0.0.0:{}", port);
    info!("WebUI listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn app_js() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/javascript; charset=utf-8")], APP_JS)
}

async fn health(State(state): State<WebState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "provider": state.config.provider.as_str(),
        "cached_fetches": state.provider.len().await,
    }))
}

async fn universe(State(state): State<WebState>) -> Json<UniverseResponse> {
    let config = &state.config;
    Json(UniverseResponse {
        symbols: config.universe.clone(),
        benchmark: config.benchmark.clone(),
        fx: config.fx.clone(),
        top_k: config.top_k,
        lookback_days: config.lookback_days,
    })
}

async fn analysis(
    State(state): State<WebState>,
    Json(req): Json<AnalysisRequest>,
) -> Result<Json<DashboardSnapshot>, (StatusCode, Json<ApiError>)> {
    if req.symbols.iter().all(|s| s.trim().is_empty()) {
        return Err(api_err(StatusCode::BAD_REQUEST, "select at least one stock"));
    }

    let today = state.config.today();
    let snapshot = dashboard::analyze_selection(
        state.provider.as_ref(),
        &state.config,
        req.symbols.as_slice(),
        today,
    )
    .await
    .ok_or_else(|| api_err(StatusCode::BAD_REQUEST, "no known BIST-30 symbols in selection"))?;

    if !snapshot.has_data() {
        warn!("Analysis of {:?} returned no price data", snapshot.selected);
    }
    Ok(Json(snapshot))
}

async fn lead(Json(form): Json<LeadForm>) -> Result<Json<Acknowledgment>, (StatusCode, Json<ApiError>)> {
    form.submit()
        .map(Json)
        .map_err(|e| api_err(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()))
}

fn api_err(status: StatusCode, message: &str) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: message.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FixtureProvider;
    use crate::prices::PriceTable;

    fn state() -> WebState {
        WebState {
            config: Arc::new(AppConfig::default()),
            provider: Arc::new(CachedProvider::new(Box::new(FixtureProvider::new(PriceTable::empty())))),
        }
    }

    #[tokio::test]
    async fn test_empty_selection_is_bad_request() {
        let req = AnalysisRequest {
            symbols: vec![" ".to_string()],
        };
        let err = analysis(State(state()), Json(req)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let req = AnalysisRequest {
            symbols: vec!["AAPL".to_string()],
        };
        let err = analysis(State(state()), Json(req)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_analysis_without_data_serializes_nulls() {
        let req = AnalysisRequest {
            symbols: vec!["THYAO.IS".to_string()],
        };
        let Json(snap) = analysis(State(state()), Json(req)).await.unwrap();
        let value = serde_json::to_value(&snap).unwrap();
        assert_eq!(value["selected"], serde_json::json!(["THYAO.IS"]));
        assert!(value["metrics"]["selected_return"].is_null());
        assert_eq!(value["chart"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_lead_endpoint() {
        let ok = lead(Json(LeadForm {
            name: "Deniz".into(),
            email: "deniz@example.com".into(),
            phone: String::new(),
        }))
        .await
        .unwrap();
        assert!(ok.0.message.contains("Deniz"));

        let err = lead(Json(LeadForm::default())).await.unwrap_err();
        assert_eq!(err.0, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_universe_lists_bist30() {
        let Json(u) = universe(State(state())).await;
        assert_eq!(u.symbols.len(), 30);
        assert_eq!(u.benchmark, "XU030.IS");
    }
}
