//! HTTP-level tests for `HttpSource` against a local axum server.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use reqwest::Url;
use serde_json::json;

use presetsync_core::config::AppConfig;
use presetsync_core::errors::FetchError;
use presetsync_core::events::MemorySink;
use presetsync_core::remote::{HttpSource, RemoteSource};
use presetsync_core::sync_engine::{DownloadOutcome, PresetSync};

// ===========================================================================
// Fixture server
// ===========================================================================

/// Canned responses keyed by the raw (still percent-encoded) request path.
#[derive(Clone, Default)]
struct Fixture {
    routes: Arc<HashMap<String, (StatusCode, String)>>,
    /// Authorization header seen per request path.
    auth: Arc<Mutex<Vec<(String, Option<String>)>>>,
    agents: Arc<Mutex<Vec<String>>>,
}

async fn respond(State(fixture): State<Fixture>, uri: Uri, headers: HeaderMap) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    fixture
        .auth
        .lock()
        .unwrap()
        .push((uri.path().to_string(), header("authorization")));
    if let Some(agent) = header("user-agent") {
        fixture.agents.lock().unwrap().push(agent);
    }

    match fixture.routes.get(uri.path()) {
        Some((status, body)) => (*status, body.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "{}"
}

async fn serve(routes: HashMap<String, (StatusCode, String)>) -> (SocketAddr, Fixture) {
    let fixture = Fixture {
        routes: Arc::new(routes),
        ..Fixture::default()
    };
    let app = Router::new()
        .route("/slow", get(slow))
        .fallback(respond)
        .with_state(fixture.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, fixture)
}

fn ok(body: serde_json::Value) -> (StatusCode, String) {
    (StatusCode::OK, body.to_string())
}

fn url(addr: SocketAddr, path: &str) -> Url {
    Url::parse(&format!("http://{}{}", addr, path)).unwrap()
}

// ===========================================================================
// HttpSource
// ===========================================================================

#[tokio::test]
async fn test_get_json_decodes_body() -> anyhow::Result<()> {
    let routes = HashMap::from([("/doc.json".to_string(), ok(json!({ "a": 1 })))]);
    let (addr, fixture) = serve(routes).await;

    let source = HttpSource::new(Duration::from_secs(5))?;
    let value = source.get_json(&url(addr, "/doc.json")).await?;
    assert_eq!(value, json!({ "a": 1 }));

    let agents = fixture.agents.lock().unwrap().clone();
    assert!(agents[0].starts_with("presetsync/"));
    Ok(())
}

#[tokio::test]
async fn test_non_success_status_is_an_error() -> anyhow::Result<()> {
    let (addr, _fixture) = serve(HashMap::new()).await;

    let source = HttpSource::new(Duration::from_secs(5))?;
    let err = source.get_json(&url(addr, "/missing.json")).await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 404, .. }));
    Ok(())
}

#[tokio::test]
async fn test_malformed_body_is_a_parse_error() -> anyhow::Result<()> {
    let routes = HashMap::from([(
        "/broken.json".to_string(),
        (StatusCode::OK, "{ nope".to_string()),
    )]);
    let (addr, _fixture) = serve(routes).await;

    let source = HttpSource::new(Duration::from_secs(5))?;
    let err = source.get_json(&url(addr, "/broken.json")).await.unwrap_err();
    match err {
        FetchError::ParseError { url, .. } => assert!(url.ends_with("/broken.json")),
        other => panic!("expected parse error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_slow_response_times_out() -> anyhow::Result<()> {
    let (addr, _fixture) = serve(HashMap::new()).await;

    let source = HttpSource::new(Duration::from_millis(200))?;
    let err = source.get_json(&url(addr, "/slow")).await.unwrap_err();
    assert!(matches!(err, FetchError::Timeout { timeout_ms: 200, .. }));
    Ok(())
}

#[tokio::test]
async fn test_token_only_sent_to_its_host() -> anyhow::Result<()> {
    let routes = HashMap::from([("/doc.json".to_string(), ok(json!({})))]);
    let (addr, fixture) = serve(routes).await;

    let matching = HttpSource::new(Duration::from_secs(5))?.with_token("127.0.0.1", "secret");
    matching.get_json(&url(addr, "/doc.json")).await?;

    let other = HttpSource::new(Duration::from_secs(5))?.with_token("api.github.com", "secret");
    other.get_json(&url(addr, "/doc.json")).await?;

    let auth = fixture.auth.lock().unwrap().clone();
    assert_eq!(auth[0].1.as_deref(), Some("Bearer secret"));
    assert_eq!(auth[1].1, None);
    Ok(())
}

// ===========================================================================
// Full pipeline over HTTP
// ===========================================================================

#[tokio::test]
async fn test_download_over_http() -> anyhow::Result<()> {
    let repo = "SteamGridDB/steam-rom-manager";
    let routes = HashMap::from([
        (
            format!("/raw/{}/master/files/presetsHashes.json", repo),
            ok(json!({ "1.0.0": { "commit": "c1" }, "2.0.0": { "commit": "c2" } })),
        ),
        (
            format!("/api/repos/{}/git/trees/c2", repo),
            ok(json!({
                "sha": "c2",
                "truncated": false,
                "tree": [
                    { "path": "files/presets", "type": "tree" },
                    { "path": "files/presets/Emulators.json", "type": "blob" },
                    { "path": "files/presets/Nintendo Switch.json", "type": "blob" }
                ]
            })),
        ),
        (
            format!("/raw/{}/c2/files/presets/Emulators.json", repo),
            ok(json!({ "Dolphin": { "parserType": "Glob", "configTitle": "GameCube" } })),
        ),
        (
            format!("/raw/{}/c2/files/presets/Nintendo%20Switch.json", repo),
            ok(json!({ "Yuzu": { "parserType": "Glob", "configTitle": "Switch" } })),
        ),
    ]);
    let (addr, _fixture) = serve(routes).await;

    let dir = tempfile::tempdir()?;
    let mut config = AppConfig::default();
    config.app.version = "1.5.0".into();
    config.app.data_dir = dir.path().to_path_buf();
    config.remote.raw_url = format!("http://{}/raw/", addr);
    config.remote.api_url = format!("http://{}/api/", addr);
    config.validate()?;

    let events = Arc::new(MemorySink::new());
    let sync = PresetSync::from_config(&config, events.clone())?;
    let outcome = sync.download(false).await;

    assert_eq!(
        outcome,
        DownloadOutcome::Applied {
            revision: "c2".into(),
            files: 2
        }
    );
    assert_eq!(
        *sync.data(),
        json!({
            "Dolphin": { "parserType": "Glob", "configTitle": "GameCube" },
            "Yuzu": { "parserType": "Glob", "configTitle": "Switch" }
        })
    );
    assert!(config.presets_file().exists());
    assert!(events.errors().is_empty());
    Ok(())
}
