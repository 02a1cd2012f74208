//! End-to-end behaviour of the response cache inside a pipeline.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bytes::Bytes;
use serde_json::{Value, json};

use rttp_cache::cache::{CacheKey, CacheStore, MemoryStore, ResponseCache, StoreError, StoreFuture};
use rttp_cache::config::CacheConfig;
use rttp_cache::context::Context;
use rttp_cache::identity::{DEFAULT_PARTITION, Identity};
use rttp_cache::middleware::Pipeline;
use rttp_cache::security::CorsPolicy;
use rttp_cache::{Request, Response, StatusCode};

#[derive(Default)]
struct RecordingStore {
    inner: MemoryStore,
    gets: AtomicUsize,
    sets: Mutex<Vec<CacheKey>>,
    failing: AtomicBool,
}

impl RecordingStore {
    fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn sets(&self) -> Vec<CacheKey> {
        self.sets.lock().unwrap().clone()
    }
}

impl CacheStore for RecordingStore {
    fn get<'a>(&'a self, key: &'a CacheKey) -> StoreFuture<'a, Option<Bytes>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Box::pin(async { Err(StoreError::Unavailable("redis down".to_owned())) });
        }
        self.inner.get(key)
    }

    fn set<'a>(&'a self, key: &'a CacheKey, body: Bytes) -> StoreFuture<'a, ()> {
        self.sets.lock().unwrap().push(key.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Box::pin(async { Err(StoreError::Unavailable("redis down".to_owned())) });
        }
        self.inner.set(key, body)
    }
}

struct Harness {
    pipeline: Pipeline,
    calls: Arc<AtomicUsize>,
    store: Arc<RecordingStore>,
}

impl Harness {
    /// Endpoint echoes what it saw plus a call counter, so a replayed body is
    /// distinguishable from a fresh one.
    fn new(config: CacheConfig) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("rttp_cache=debug")
            .with_test_writer()
            .try_init();

        let calls = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(RecordingStore::default());
        let counter = Arc::clone(&calls);

        let pipeline = Pipeline::new(move |ctx: Context| {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                let request = ctx.request();
                let partition = ctx
                    .extensions()
                    .get::<Identity>()
                    .map(|identity| identity.partition().to_owned());
                Response::json(&json!({
                    "url": request.requested_url(),
                    "authorization": request.authorization(),
                    "partition": partition,
                    "call": call,
                }))
                .unwrap()
            }
        })
        .with(ResponseCache::new(config, store.clone()));

        Self {
            pipeline,
            calls,
            store,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn config() -> CacheConfig {
    CacheConfig::new("/api")
        .include_collection("posts")
        .include_global("header")
}

fn request(method: &str, path: &str, headers: &[(&str, &str)]) -> Request {
    let mut raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n");
    for (name, value) in headers {
        raw.push_str(&format!("{name}: {value}\r\n"));
    }
    raw.push_str("\r\n");
    Request::parse(raw.as_bytes()).unwrap().0
}

fn body(response: &Response) -> Value {
    serde_json::from_slice(response.payload()).unwrap()
}

fn session_cookie(collection: &str) -> String {
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"collection":"{collection}","id":"7"}}"#));
    format!("theme=dark; payload-token=eyJhbGciOiJIUzI1NiJ9.{payload}.c2ln")
}

#[tokio::test]
async fn non_get_requests_never_touch_the_cache() {
    let h = Harness::new(config());

    for method in ["POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"] {
        let response = h.pipeline.dispatch(request(method, "/api/posts/42", &[])).await;
        assert_eq!(response.status(), StatusCode::Ok);
    }

    assert_eq!(h.calls(), 6);
    assert_eq!(h.store.gets(), 0);
    assert!(h.store.sets().is_empty());
}

#[tokio::test]
async fn documented_scenario_miss_then_hit() {
    let store = Arc::new(MemoryStore::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let pipeline = Pipeline::new(move |_ctx| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Response::json(&json!({ "id": 42 })).unwrap() }
    })
    .with(ResponseCache::new(
        CacheConfig::new("/api").include_collection("posts"),
        store.clone(),
    ));

    let first = pipeline.dispatch(request("GET", "/api/posts/42", &[])).await;
    assert_eq!(first.payload(), &Bytes::from_static(b"{\"id\":42}"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let key = CacheKey::build(DEFAULT_PARTITION, "/api/posts/42", "");
    assert_eq!(
        store.get(&key).await.unwrap(),
        Some(Bytes::from_static(b"{\"id\":42}"))
    );

    let second = pipeline.dispatch(request("GET", "/api/posts/42", &[])).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.status(), StatusCode::Ok);
    assert_eq!(second.headers().get("content-type"), Some("application/json"));
    assert_eq!(second.payload(), &Bytes::from_static(b"{\"id\":42}"));
}

#[tokio::test]
async fn miss_writes_exactly_once_under_derived_key() {
    let h = Harness::new(config());
    let cookie = session_cookie("users");

    h.pipeline
        .dispatch(request(
            "GET",
            "/api/posts?page=2",
            &[("Cookie", cookie.as_str()), ("Authorization", "JWT alice")],
        ))
        .await;

    assert_eq!(h.calls(), 1);
    assert_eq!(h.store.gets(), 1);
    assert_eq!(
        h.store.sets(),
        vec![CacheKey::build("users", "/api/posts?page=2", "JWT alice")]
    );
}

#[tokio::test]
async fn repeated_request_is_idempotent_and_served_from_cache() {
    let h = Harness::new(config());

    let first = h.pipeline.dispatch(request("GET", "/api/globals/header", &[])).await;
    let second = h.pipeline.dispatch(request("GET", "/api/globals/header", &[])).await;

    assert_eq!(body(&first), body(&second));
    assert_eq!(body(&second)["call"], 1);
    assert_eq!(h.calls(), 1);
    assert_eq!(h.store.sets().len(), 1);
}

#[tokio::test]
async fn different_credentials_never_share_entries() {
    let h = Harness::new(config());
    let path = "/api/posts/42";

    let alice = h.pipeline.dispatch(request("GET", path, &[("Authorization", "JWT alice")])).await;
    let bob = h.pipeline.dispatch(request("GET", path, &[("Authorization", "JWT bob")])).await;
    let anonymous = h.pipeline.dispatch(request("GET", path, &[])).await;

    assert_eq!(h.calls(), 3);
    assert_eq!(body(&alice)["authorization"], "JWT alice");
    assert_eq!(body(&bob)["authorization"], "JWT bob");
    assert_eq!(body(&anonymous)["authorization"], Value::Null);

    let alice_again = h
        .pipeline
        .dispatch(request("GET", path, &[("Authorization", "JWT alice")]))
        .await;
    assert_eq!(h.calls(), 3);
    assert_eq!(body(&alice_again), body(&alice));
}

#[tokio::test]
async fn session_cookie_selects_partition_and_reaches_the_endpoint() {
    let h = Harness::new(config());
    let cookie = session_cookie("admins");

    let admin = h
        .pipeline
        .dispatch(request("GET", "/api/posts", &[("Cookie", cookie.as_str())]))
        .await;
    let guest = h.pipeline.dispatch(request("GET", "/api/posts", &[])).await;

    assert_eq!(body(&admin)["partition"], "admins");
    assert_eq!(body(&guest)["partition"], DEFAULT_PARTITION);
    assert_eq!(h.calls(), 2);
}

#[tokio::test]
async fn malformed_cookie_falls_back_to_default_partition() {
    let h = Harness::new(config());

    let response = h
        .pipeline
        .dispatch(request("GET", "/api/posts", &[("Cookie", "payload-token=garbage")]))
        .await;

    assert_eq!(response.status(), StatusCode::Ok);
    assert_eq!(body(&response)["partition"], DEFAULT_PARTITION);
    assert_eq!(
        h.store.sets(),
        vec![CacheKey::build(DEFAULT_PARTITION, "/api/posts", "")]
    );
}

#[tokio::test]
async fn ineligible_paths_pass_through_without_cors() {
    let h = Harness::new(config().with_cors(CorsPolicy::Wildcard));

    for _ in 0..2 {
        let response = h
            .pipeline
            .dispatch(request("GET", "/api/users/1", &[("Origin", "https://a.example")]))
            .await;
        assert!(!response.headers().contains("access-control-allow-origin"));
        assert!(!response.headers().contains("access-control-allow-methods"));
    }

    assert_eq!(h.calls(), 2);
    assert_eq!(h.store.gets(), 0);
}

#[tokio::test]
async fn wildcard_cors_on_miss_and_hit() {
    let h = Harness::new(config().with_cors(CorsPolicy::Wildcard));

    for _ in 0..2 {
        let response = h
            .pipeline
            .dispatch(request("GET", "/api/posts", &[("Origin", "https://a.example")]))
            .await;
        assert_eq!(response.headers().get("access-control-allow-origin"), Some("*"));
        assert!(!response.headers().contains("access-control-allow-credentials"));
    }
    assert_eq!(h.calls(), 1);
}

#[tokio::test]
async fn allow_list_cors() {
    let h = Harness::new(config().with_cors(CorsPolicy::allow_list(["https://a.example"])));

    let allowed = h
        .pipeline
        .dispatch(request("GET", "/api/posts", &[("Origin", "https://a.example")]))
        .await;
    assert_eq!(
        allowed.headers().get("access-control-allow-origin"),
        Some("https://a.example")
    );
    assert_eq!(allowed.headers().get("access-control-allow-credentials"), Some("true"));

    let denied = h
        .pipeline
        .dispatch(request("GET", "/api/posts", &[("Origin", "https://b.example")]))
        .await;
    assert!(!denied.headers().contains("access-control-allow-origin"));
    assert!(!denied.headers().contains("access-control-allow-credentials"));
}

#[tokio::test]
async fn store_outage_is_invisible_to_clients() {
    let h = Harness::new(config());
    h.store.failing.store(true, Ordering::SeqCst);

    for expected_call in 1..=2 {
        let response = h.pipeline.dispatch(request("GET", "/api/posts", &[])).await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(body(&response)["call"], expected_call);
    }
    assert_eq!(h.calls(), 2);
    assert_eq!(h.store.sets().len(), 2);
}

#[tokio::test]
async fn downstream_errors_are_not_cached() {
    let store = Arc::new(MemoryStore::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let pipeline = Pipeline::new(move |_ctx| {
        counter.fetch_add(1, Ordering::SeqCst);
        async {
            Response::new(StatusCode::InternalServerError)
                .header("Content-Type", "application/json")
                .body(r#"{"errors":[{"message":"boom"}]}"#)
        }
    })
    .with(ResponseCache::new(config(), store.clone()));

    for _ in 0..2 {
        let response = pipeline.dispatch(request("GET", "/api/posts", &[])).await;
        assert_eq!(response.status(), StatusCode::InternalServerError);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(store.is_empty());
}

#[tokio::test]
async fn allow_list_cors_keeps_downstream_vary() {
    let pipeline = Pipeline::new(|_ctx| async {
        Response::json(&json!({ "id": 42 }))
            .unwrap()
            .header("Vary", "Accept-Encoding")
    })
    .with(ResponseCache::new(
        config().with_cors(CorsPolicy::allow_list(["https://a.example"])),
        Arc::new(MemoryStore::new()),
    ));

    let response = pipeline
        .dispatch(request("GET", "/api/posts", &[("Origin", "https://a.example")]))
        .await;

    assert_eq!(
        response.headers().get_all("vary").collect::<Vec<_>>(),
        ["Accept-Encoding", "Origin"]
    );
}

#[tokio::test]
async fn empty_json_response_does_not_pin_the_entry() {
    let store = Arc::new(MemoryStore::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let pipeline = Pipeline::new(move |_ctx| {
        let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if call == 1 {
                Response::new(StatusCode::NoContent).header("Content-Type", "application/json")
            } else {
                Response::json(&json!({ "id": 1 })).unwrap()
            }
        }
    })
    .with(ResponseCache::new(config(), store.clone()));

    let first = pipeline.dispatch(request("GET", "/api/posts/1", &[])).await;
    assert_eq!(first.status(), StatusCode::NoContent);
    assert!(store.is_empty());

    let second = pipeline.dispatch(request("GET", "/api/posts/1", &[])).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(body(&second), json!({ "id": 1 }));

    let third = pipeline.dispatch(request("GET", "/api/posts/1", &[])).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(body(&third), json!({ "id": 1 }));
}
