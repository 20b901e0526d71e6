use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use oncoseek_core::rank::{DEFAULT_LIMIT, DEFAULT_SUMMARY_LEN};
use oncoseek_core::{
    Bm25Params, DocumentRecord, Language, RankRequest, RankedDocument, Ranker, SourceRecord, Store, StoreError,
    TermProcessor,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Raw query string of `/query`. Everything is optional text so that malformed numbers are
/// clamped to defaults instead of rejected.
#[derive(Debug, Default, Deserialize)]
pub struct QueryParams {
    pub query: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub max_summary_len: Option<String>,
    pub language: Option<String>,
}

impl QueryParams {
    pub fn to_request(&self) -> RankRequest {
        RankRequest {
            query: self.query.clone().unwrap_or_default(),
            language: self.language.as_deref().and_then(|value| value.parse::<Language>().ok()),
            page: lenient_int(self.page.as_deref(), 1),
            limit: lenient_int(self.limit.as_deref(), DEFAULT_LIMIT as i64),
            max_summary_len: lenient_int(self.max_summary_len.as_deref(), DEFAULT_SUMMARY_LEN as i64),
        }
    }
}

/// Integer parsing that never fails: garbage becomes `default`, out-of-range values saturate.
fn lenient_int(raw: Option<&str>, default: i64) -> i64 {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return default;
    };
    if let Ok(value) = raw.parse::<i64>() {
        return value;
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => value.trunc().clamp(i64::MIN as f64, i64::MAX as f64) as i64,
        Ok(value) if value == f64::INFINITY => i64::MAX,
        Ok(value) if value == f64::NEG_INFINITY => i64::MIN,
        _ => default,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct DocumentHit {
    pub id: u64,
    pub title: String,
    pub summary: String,
    pub document_type: String,
    pub document_url: String,
    pub document_language: String,
    pub publish_date: Option<String>,
    pub source_id: u64,
    pub length: u64,
    pub score: f64,
}

impl From<RankedDocument> for DocumentHit {
    fn from(hit: RankedDocument) -> Self {
        let DocumentRecord { id, title, summary, doc_type, publish_date, url, language, source_id, length } =
            hit.document;
        Self {
            id,
            title,
            summary,
            document_type: doc_type.to_string(),
            document_url: url,
            document_language: language.to_string(),
            publish_date: publish_date.map(|date| date.to_string()),
            source_id,
            length,
            score: hit.score,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SourceEntry {
    pub id: u64,
    pub source_name: String,
    pub base_url: String,
    /// Base64 of the raw icon bytes.
    pub icon: Option<String>,
}

impl From<SourceRecord> for SourceEntry {
    fn from(source: SourceRecord) -> Self {
        Self {
            id: source.id,
            source_name: source.name,
            base_url: source.base_url,
            icon: source.icon.map(|bytes| STANDARD.encode(bytes)),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct StatisticsEntry {
    pub document_count: u64,
    pub average_document_length: f64,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub processor: Arc<TermProcessor>,
    pub params: Bm25Params,
}

pub struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "store read failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()).into_response()
    }
}

/// Opens the store at `store_dir` and builds the router.
pub fn build_app(store_dir: impl AsRef<Path>, params: Bm25Params) -> Result<Router> {
    let store_dir = store_dir.as_ref();
    let store = Store::open(store_dir).with_context(|| format!("opening store {}", store_dir.display()))?;
    build_app_with_store(Arc::new(store), params)
}

/// Fails when no corpus has been committed yet: without statistics there is nothing to rank.
pub fn build_app_with_store(store: Arc<Store>, params: Bm25Params) -> Result<Router> {
    let statistics = store
        .statistics()?
        .ok_or(StoreError::MissingStatistics)
        .context("run an indexing pass before starting the server")?;
    tracing::info!(
        documents = statistics.document_count,
        average_length = statistics.average_document_length,
        "corpus loaded"
    );
    let state = AppState { store, processor: Arc::new(TermProcessor::default()), params };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/query", get(query_handler))
        .route("/sources", get(sources_handler))
        .route("/statistics", get(statistics_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn health_handler(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    state.store.ping()?;
    Ok("ok")
}

pub async fn query_handler(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Vec<DocumentHit>>, ApiError> {
    let request = params.to_request();
    let ranker = Ranker::new(&state.store, &state.processor, state.params);
    let page = ranker.rank(&request)?;
    tracing::debug!(
        query = %request.query,
        page = page.pagination.page,
        limit = page.pagination.limit,
        returned = page.documents.len(),
        "query served"
    );
    Ok(Json(page.documents.into_iter().map(DocumentHit::from).collect()))
}

pub async fn sources_handler(State(state): State<AppState>) -> Result<Json<Vec<SourceEntry>>, ApiError> {
    Ok(Json(state.store.sources()?.into_iter().map(SourceEntry::from).collect()))
}

pub async fn statistics_handler(State(state): State<AppState>) -> Result<Json<StatisticsEntry>, ApiError> {
    let statistics = state.store.statistics()?.ok_or(StoreError::MissingStatistics)?;
    Ok(Json(StatisticsEntry {
        document_count: statistics.document_count,
        average_document_length: statistics.average_document_length,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_integers() {
        assert_eq!(lenient_int(None, 10), 10);
        assert_eq!(lenient_int(Some(""), 10), 10);
        assert_eq!(lenient_int(Some("abc"), 10), 10);
        assert_eq!(lenient_int(Some(" 7 "), 10), 7);
        assert_eq!(lenient_int(Some("-3"), 10), -3);
        assert_eq!(lenient_int(Some("2.9"), 10), 2);
        assert_eq!(lenient_int(Some("1e30"), 10), i64::MAX);
        assert_eq!(lenient_int(Some("99999999999999999999999"), 10), i64::MAX);
    }

    #[test]
    fn params_map_to_a_rank_request() {
        let params = QueryParams {
            query: Some("breast cancer".into()),
            page: Some("x".into()),
            limit: Some("0".into()),
            max_summary_len: None,
            language: Some("es".into()),
        };
        let request = params.to_request();
        assert_eq!(request.page, 1);
        assert_eq!(request.limit, 0);
        assert_eq!(request.max_summary_len, DEFAULT_SUMMARY_LEN as i64);
        assert_eq!(request.language, Some(Language::Spanish));
        assert_eq!(QueryParams::default().to_request().query, "");
    }
}
