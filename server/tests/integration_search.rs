use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use oncoseek_core::{Bm25Params, Document, DocumentType, InvertedIndex, Language, Source, Store, TermProcessor};
use oncoseek_server::{build_app, build_app_with_store};
use serde_json::Value;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

fn seeded_store(extra: usize) -> (TempDir, Arc<Store>) {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let processor = TermProcessor::default();
    let mut index = InvertedIndex::new();
    let charity = index.stage_source(Source::new("Charity", "https://charity.test").with_icon(Some(b"ICO".to_vec())));
    let journal = index.stage_source(Source::new("Journal", "https://journal.test"));

    let mut rows = vec![
        (charity, DocumentType::Website, "Chemotherapy side effects", "Chemotherapy side effects and how to manage chemotherapy fatigue"),
        (journal, DocumentType::Paper, "Proton beam outcomes", "Proton beam therapy outcomes in paediatric tumours"),
        (journal, DocumentType::Paper, "Chemotherapy dosing", "Dosing schedules for adjuvant chemotherapy"),
    ];
    let filler: Vec<String> = (0..extra).map(|n| format!("Filler page {n}")).collect();
    for title in &filler {
        rows.push((charity, DocumentType::Website, title.as_str(), "General information about support groups"));
    }

    for (source, doc_type, title, text) in rows {
        let analysis = processor.analyze(text, Some(Language::English));
        let key = index
            .stage_document(
                Document::new(title, text, doc_type, format!("https://doc.test/{title}"), source)
                    .with_language(analysis.language),
            )
            .unwrap();
        index.record_terms(key, &analysis.terms).unwrap();
    }
    store.commit(&index).unwrap();
    (dir, Arc::new(store))
}

fn app(extra: usize) -> (TempDir, Router) {
    let (dir, store) = seeded_store(extra);
    let app = build_app_with_store(store, Bm25Params::default()).unwrap();
    (dir, app)
}

async fn call(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn query_returns_ranked_records() {
    let (_dir, app) = app(0);
    let (status, json) = call(app, "/query?query=chemotherapy&limit=10").await;
    assert_eq!(status, StatusCode::OK);

    let records = json.as_array().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["TITLE"], "Chemotherapy side effects");
    assert_eq!(records[1]["TITLE"], "Chemotherapy dosing");
    assert_eq!(records[2]["SCORE"].as_f64(), Some(0.0));
    assert_eq!(records[0]["DOCUMENT_TYPE"], "website");
    assert_eq!(records[0]["DOCUMENT_LANGUAGE"], "english");
    assert_eq!(records[0]["SOURCE_ID"], 1);
    assert!(records[0]["PUBLISH_DATE"].is_null());
}

#[tokio::test]
async fn malformed_pagination_is_clamped_not_rejected() {
    let (_dir, app) = app(22);

    let (status, json) = call(app.clone(), "/query?query=chemotherapy&limit=10&page=4").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 5);

    let (status, json) = call(app.clone(), "/query?query=chemotherapy&limit=abc&page=-7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 10);

    let (status, json) = call(app.clone(), "/query?query=chemotherapy&limit=0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);

    let (status, json) = call(app, "/query?query=proton&limit=1&max_summary_len=6").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["SUMMARY"], "Proton");
}

#[tokio::test]
async fn sources_and_statistics_are_exposed() {
    let (_dir, app) = app(0);

    let (status, json) = call(app.clone(), "/sources").await;
    assert_eq!(status, StatusCode::OK);
    let sources = json.as_array().unwrap();
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0]["SOURCE_NAME"], "Charity");
    assert_eq!(sources[0]["ICON"], "SUNP");
    assert!(sources[1]["ICON"].is_null());

    let (status, json) = call(app.clone(), "/statistics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["DOCUMENT_COUNT"], 3);
    assert!(json["AVERAGE_DOCUMENT_LENGTH"].as_f64().unwrap() > 0.0);

    let (status, _) = call(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[test]
fn missing_statistics_prevent_startup() {
    let dir = tempdir().unwrap();
    assert!(build_app(dir.path(), Bm25Params::default()).is_err());
}
