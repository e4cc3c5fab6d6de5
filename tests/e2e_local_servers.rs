// tests/e2e_local_servers.rs
//
// Full pass through `run_once` against an in-process Axum server that plays
// both the deals site (auth handshake + paged listing) and the Telegram Bot API.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use deal_notifier::config::{AppConfig, FileConfig};
use deal_notifier::{run_once, RunError, RunStatus};

const TOKEN: &str = "s3cret";

#[derive(Default)]
struct Fake {
    pages: Mutex<Vec<Vec<(&'static str, &'static str)>>>, // (slug, image)
    sent: Mutex<Vec<Value>>,
}

fn render(items: &[(&str, &str)]) -> String {
    let mut html = String::from("<html><body><div class=\"coupons\">");
    for (slug, img) in items {
        html.push_str(&format!(
            r#"<a class="coupon-thumb" href="/deal/{slug}"><img src="/img/{img}"><div class="coupon-title">Deal {slug}</div><div class="coupon-desciption">about {slug}</div></a>"#
        ));
    }
    html.push_str("</div></body></html>");
    html
}

async fn auth(Query(q): Query<HashMap<String, String>>) -> impl IntoResponse {
    if q.get("token").map(String::as_str) == Some(TOKEN) {
        (StatusCode::OK, [(header::SET_COOKIE, "session=ok; Path=/")]).into_response()
    } else {
        StatusCode::FORBIDDEN.into_response()
    }
}

async fn listing(
    State(fake): State<Arc<Fake>>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let authed = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|c| c.contains("session=ok"));
    if !authed || q.get("sort").map(String::as_str) != Some("new") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let page: usize = q.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let pages = fake.pages.lock();
    let items = pages.get(page - 1).cloned().unwrap_or_default();
    render(&items).into_response()
}

async fn send_photo(State(fake): State<Arc<Fake>>, Json(body): Json<Value>) -> impl IntoResponse {
    let broken = body["photo"].as_str().unwrap_or_default().contains("broken");
    fake.sent.lock().push(body);
    if broken {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"ok": false, "description": "Bad Request: wrong type of the web page content"})),
        )
    } else {
        (StatusCode::OK, Json(json!({"ok": true, "result": {}})))
    }
}

async fn start(fake: Arc<Fake>) -> SocketAddr {
    let app = Router::new()
        .route("/", get(listing))
        .route("/auth", get(auth))
        .route("/botT0K/sendPhoto", post(send_photo))
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config(addr: SocketAddr, state_path: &std::path::Path, token: &str) -> AppConfig {
    let vars: HashMap<&str, String> = HashMap::from([
        ("SITE_URL", format!("http://{addr}/")),
        ("AUTH_TOKEN", token.to_string()),
        ("LISTING_PAGES", "2".to_string()),
        ("TELEGRAM_BOT_TOKEN", "T0K".to_string()),
        ("TELEGRAM_CHAT_ID", "-100".to_string()),
        ("TELEGRAM_API_BASE", format!("http://{addr}")),
        ("STATE_PATH", state_path.display().to_string()),
        ("HTTP_TIMEOUT_SECS", "5".to_string()),
    ]);
    AppConfig::resolve(FileConfig::default(), |k| vars.get(k).cloned()).unwrap()
}

fn sent_captions(fake: &Fake) -> Vec<String> {
    fake.sent
        .lock()
        .iter()
        .map(|v| v["caption"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn scrape_dedup_notify_across_runs() {
    let fake = Arc::new(Fake::default());
    *fake.pages.lock() = vec![
        vec![("d3", "3.png"), ("d2", "2.png")],
        // listing shifted between page loads: d2 shows up again
        vec![("d2", "2.png"), ("d1", "1.png")],
    ];
    let addr = start(fake.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(addr, &dir.path().join("dedup.json"), TOKEN);

    // 1) first run: everything, newest first, no duplicates
    let report = run_once(&cfg).await.unwrap();
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.fetched, 3);
    let captions = sent_captions(&fake);
    assert_eq!(captions.len(), 3);
    assert!(captions[0].starts_with("[Deal d3](http://"));
    assert!(captions[2].starts_with("[Deal d1]"));
    assert!(captions[0].ends_with("\nabout d3"));
    assert_eq!(
        fake.sent.lock()[0]["photo"],
        format!("http://{addr}/img/3.png")
    );

    // 2) nothing changed: nothing sent
    let report = run_once(&cfg).await.unwrap();
    assert!(report.outcomes.is_empty());
    assert_eq!(sent_captions(&fake).len(), 3);

    // 3) one new deal whose photo Telegram rejects: partial, cursor still moves
    fake.pages.lock()[0].insert(0, ("d4", "broken.png"));
    let report = run_once(&cfg).await.unwrap();
    assert_eq!(report.status, RunStatus::Partial);
    assert_eq!(report.failed_deliveries(), 1);

    let report = run_once(&cfg).await.unwrap();
    assert!(report.outcomes.is_empty(), "failed item is not retried on the next run");
    assert_eq!(sent_captions(&fake).len(), 4);
}

#[tokio::test]
async fn rejected_auth_aborts_the_run() {
    let fake = Arc::new(Fake::default());
    *fake.pages.lock() = vec![vec![("d1", "1.png")]];
    let addr = start(fake.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("dedup.json");
    let cfg = config(addr, &state_path, "wrong");

    let err = run_once(&cfg).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<RunError>(), Some(RunError::Fetch(_))));
    assert!(fake.sent.lock().is_empty());
    assert!(!state_path.exists(), "no state written on fetch failure");
}

#[tokio::test]
async fn dry_run_never_writes_the_state_file() {
    let fake = Arc::new(Fake::default());
    *fake.pages.lock() = vec![vec![("d1", "1.png")]];
    let addr = start(fake.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("dedup.json");
    let live = config(addr, &state_path, TOKEN);
    let mut dry = config(addr, &state_path, TOKEN);
    dry.dry_run = true;

    // nothing persisted yet: the dry run sees d1 as new but records nothing
    let report = run_once(&dry).await.unwrap();
    assert_eq!(report.outcomes.len(), 1);
    assert!(fake.sent.lock().is_empty());
    assert!(!state_path.exists());

    // the live run still delivers d1
    run_once(&live).await.unwrap();
    assert_eq!(sent_captions(&fake).len(), 1);
    let persisted = std::fs::read(&state_path).unwrap();

    // dry run starts from the persisted cursor and leaves the file as it was
    fake.pages.lock()[0].insert(0, ("d2", "2.png"));
    let report = run_once(&dry).await.unwrap();
    assert_eq!(report.outcomes.len(), 1);
    assert!(report.outcomes[0].id.ends_with("/deal/d2"));
    assert_eq!(std::fs::read(&state_path).unwrap(), persisted);

    run_once(&live).await.unwrap();
    let captions = sent_captions(&fake);
    assert_eq!(captions.len(), 2);
    assert!(captions[1].starts_with("[Deal d2]"));
}
