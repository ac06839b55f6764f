//! HTTP surface tests: routing, bearer auth, status codes and SSE output

mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use artgraph_discovery::config::PipelineConfig;
use artgraph_discovery::models::{Evidence, SourceKind};
use artgraph_discovery::{build_router, AppState};
use helpers::*;

const SECRET: &str = "test-shared-secret";

async fn test_app() -> (Router, Harness) {
    let ai = FakeAi::answering(analysis(vec![
        recommendation("Kieran Hebden", 0.9, "collaboration"),
        recommendation("Sun Ra", 0.8, "influence"),
    ]));
    let disc = FakeAdapter::new(SourceKind::Discography, |query| {
        let subject = query.related_to.clone().unwrap_or_default();
        report(
            SourceKind::Discography,
            query,
            vec![Evidence::new(SourceKind::Discography, subject, query.artist.clone(), "Drums")],
        )
    });
    let h = harness(ai, vec![disc], PipelineConfig::default()).await;
    let state = AppState::new(
        h.db.clone(),
        h.pipeline.clone(),
        h.store.clone(),
        SECRET.to_string(),
    );
    (build_router(state), h)
}

fn authed(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", SECRET))
}

fn json_post(uri: &str, body: Value) -> Request<Body> {
    authed("POST", uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let (app, _h) = test_app().await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "artgraph-discovery");
    assert!(json["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let (app, _h) = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/discovery/run")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"subject_name": "Steve Reid"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "missing_token");
}

#[tokio::test]
async fn test_wrong_token_is_unauthorized() {
    let (app, h) = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/artists/steve-reid")
                .header(header::AUTHORIZATION, "Bearer not-the-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "invalid_token");
    assert_eq!(h.store.count_entities().await.unwrap(), 0);
}

#[tokio::test]
async fn test_run_with_empty_subject_is_bad_request() {
    let (app, h) = test_app().await;

    let response = app
        .oneshot(json_post("/discovery/run", json!({"subject_name": "  "})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "BAD_REQUEST");
    assert_eq!(h.store.count_entities().await.unwrap(), 0);
}

#[tokio::test]
async fn test_stream_with_missing_subject_is_bad_request() {
    let (app, _h) = test_app().await;

    let response = app
        .oneshot(json_post("/discovery/stream", json!({"track_name": "Lions of Juda"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_run_returns_full_response() {
    let (app, h) = test_app().await;

    let response = app
        .oneshot(json_post(
            "/discovery/run",
            json!({"subject_name": "Steve Reid", "track_name": "Lions of Juda"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert!(json["summary"].as_str().unwrap().contains("Steve Reid"));
    assert_eq!(json["results"]["ai_recommendations"].as_array().unwrap().len(), 2);
    assert_eq!(json["results"]["cache_hit"], false);
    assert_eq!(json["results"]["relationships_created"], 4);
    assert!(json["next_actions"].as_array().is_some());
    assert_eq!(h.store.count_relationships().await.unwrap(), 4);
}

#[tokio::test]
async fn test_analysis_lookup_before_and_after_run() {
    let (app, _h) = test_app().await;
    let lookup = "/analysis?subject_name=Steve%20Reid&track_name=Lions%20of%20Juda";

    let response = app
        .clone()
        .oneshot(authed("GET", lookup).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(json_post(
            "/discovery/run",
            json!({"subject_name": "Steve Reid", "track_name": "Lions of Juda"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(authed("GET", lookup).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["subject_name"], "Steve Reid");
    assert_eq!(json["context"], "comprehensive");
    assert_eq!(json["payload"]["recommendations"][0]["artist_name"], "Kieran Hebden");
}

#[tokio::test]
async fn test_analysis_requires_subject() {
    let (app, _h) = test_app().await;

    let response = app
        .oneshot(authed("GET", "/analysis").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_artist_graph_lookup() {
    let (app, _h) = test_app().await;

    let response = app
        .clone()
        .oneshot(authed("GET", "/artists/steve-reid").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["code"], "NOT_FOUND");

    app.clone()
        .oneshot(json_post("/discovery/run", json!({"subject_name": "Steve Reid"})))
        .await
        .unwrap();

    let response = app
        .oneshot(authed("GET", "/artists/steve-reid").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["entity"]["name"], "Steve Reid");
    let outgoing = json["outgoing"].as_array().unwrap();
    assert_eq!(outgoing.len(), 4);
    assert!(outgoing
        .iter()
        .any(|r| r["target_name"] == "Kieran Hebden" && r["relation_type"] == "collaboration"));
    assert!(json["incoming"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_stream_emits_progress_then_final_result() {
    let (app, _h) = test_app().await;

    let response = app
        .oneshot(json_post("/discovery/stream", json!({"subject_name": "Steve Reid"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    let data: Vec<Value> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|payload| serde_json::from_str(payload.trim()).unwrap())
        .collect();

    assert!(data.len() >= 3);
    assert_eq!(data[0]["type"], "status");
    let last = data.last().unwrap();
    assert_eq!(last["type"], "final_result");
    assert_eq!(last["data"]["success"], true);
    assert_eq!(
        data.iter().filter(|e| e["type"] == "final_result").count(),
        1
    );
}

#[tokio::test]
async fn test_run_errors_surface_on_health() {
    let ai = FakeAi::from_model_output("no json here");
    let h = harness(ai, vec![], PipelineConfig::default()).await;
    let state = AppState::new(h.db.clone(), h.pipeline.clone(), h.store.clone(), SECRET.to_string());
    let app = build_router(state);

    app.clone()
        .oneshot(json_post("/discovery/run", json!({"subject_name": "Steve Reid"})))
        .await
        .unwrap();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(response).await;
    assert!(json["last_error"].as_str().unwrap().starts_with("ai_reasoning"));
}
