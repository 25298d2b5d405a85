use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use mediahub::config::Config;
use serde_json::{Value, json};
use tower::ServiceExt;

const API_KEY: &str = "integration-test-key";

async fn spawn_app() -> Router {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.server.api_key = API_KEY.to_string();
    config.tmdb.api_key = "tmdb-secret".to_string();

    let state = mediahub::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");
    mediahub::api::router(state).await
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Api-Key", API_KEY);

    let body = match body {
        Some(json) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn jellyfin(name: &str) -> Value {
    json!({
        "name": name,
        "kind": "jellyfin",
        "base_url": "http://jellyfin:8096/",
        "api_key": "secret-token"
    })
}

#[tokio::test]
async fn test_auth_endpoints() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/system/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/system/status")
                .header("X-Api-Key", "wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/system/status")
                .header("Authorization", format!("Bearer {API_KEY}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/system/health/live")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_system_status_and_masked_config() {
    let app = spawn_app().await;

    let (status, body) = send(&app, "GET", "/api/system/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["total_items"], 0);
    assert_eq!(body["data"]["clients"], 0);
    assert!(body["data"]["last_media_sync"].is_null());

    let (status, body) = send(&app, "GET", "/api/system/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["server"]["api_key"], "********");
    assert_eq!(body["data"]["tmdb"]["api_key"], "********");

    let mut invalid = body["data"].clone();
    invalid["sync"]["fuzzy_threshold"] = json!(2.0);
    let (status, body) = send(&app, "PUT", "/api/system/config", Some(invalid)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_clients_crud() {
    let app = spawn_app().await;

    let (status, body) = send(&app, "POST", "/api/clients", Some(jellyfin("Living Room"))).await;
    assert_eq!(status, StatusCode::OK);
    let id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["base_url"], "http://jellyfin:8096");
    assert_eq!(body["data"]["api_key"], "********");

    let (status, _) = send(&app, "POST", "/api/clients", Some(jellyfin("living room"))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let mut unknown = jellyfin("Kodi");
    unknown["kind"] = json!("kodi");
    let (status, _) = send(&app, "POST", "/api/clients", Some(unknown)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut bad_url = jellyfin("Broken");
    bad_url["base_url"] = json!("ftp://nowhere");
    let (status, _) = send(&app, "POST", "/api/clients", Some(bad_url)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut rename = jellyfin("Bedroom");
    rename["api_key"] = json!("********");
    let (status, body) = send(&app, "PUT", &format!("/api/clients/{id}"), Some(rename)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Bedroom");

    let (status, body) = send(&app, "GET", "/api/clients", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "GET", "/api/clients/0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "DELETE", &format!("/api/clients/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", &format!("/api/clients/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_media_endpoints() {
    let app = spawn_app().await;

    let (status, body) = send(&app, "GET", "/api/media?type=movie&page=1&limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 0);
    assert_eq!(body["data"]["limit"], 10);
    assert!(body["data"]["items"].as_array().unwrap().is_empty());

    let (status, _) = send(&app, "GET", "/api/media?type=podcast", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/api/media?limit=5000", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/api/media/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_disabled_providers() {
    let app = spawn_app().await;

    let (status, _) = send(&app, "GET", "/api/metadata/search?q=Heat&type=movie", None).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

    let (status, _) = send(&app, "GET", "/api/metadata/search?q=%20", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/api/recommendations/refresh", None).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

    let (status, body) = send(&app, "GET", "/api/recommendations", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_list_sync_validation() {
    let app = spawn_app().await;

    let (_, body) = send(&app, "POST", "/api/clients", Some(jellyfin("Source"))).await;
    let source = body["data"]["id"].as_i64().unwrap();

    let same = json!({
        "name": "Mirror",
        "source_client_id": source,
        "source_list_id": "abc",
        "target_client_id": source
    });
    let (status, _) = send(&app, "POST", "/api/list-syncs", Some(same)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing_target = json!({
        "name": "Mirror",
        "source_client_id": source,
        "source_list_id": "abc",
        "target_client_id": 99
    });
    let (status, _) = send(&app, "POST", "/api/list-syncs", Some(missing_target)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, "POST", "/api/clients", Some(jellyfin("Target"))).await;
    let target = body["data"]["id"].as_i64().unwrap();

    let valid = json!({
        "name": "Mirror",
        "source_client_id": source,
        "source_list_id": "abc",
        "target_client_id": target
    });
    let (status, body) = send(&app, "POST", "/api/list-syncs", Some(valid)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["target_list_id"].is_null());
    let id = body["data"]["id"].as_i64().unwrap();

    let (_, body) = send(&app, "GET", "/api/list-syncs", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "DELETE", &format!("/api/list-syncs/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "DELETE", &format!("/api/list-syncs/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_jobs_endpoints() {
    let app = spawn_app().await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/jobs/media-sync",
        Some(json!({ "client_id": 77 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "GET", "/api/jobs/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "failed");
    assert_eq!(body["data"]["job_type"], "media_sync");

    let (status, body) = send(&app, "GET", "/api/jobs?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "GET", "/api/jobs/2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/api/jobs?limit=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
