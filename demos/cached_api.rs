//! A JSON endpoint behind the response cache.
//!
//! ```text
//! RUST_LOG=rttp_cache=debug cargo run --example cached_api
//! curl -i http://127.0.0.1:8080/api/posts/42      # miss, then hit on repeat
//! curl -i http://127.0.0.1:8080/api/users/1       # never cached
//! ```

use std::sync::Arc;

use rttp_cache::cache::{MemoryStore, ResponseCache};
use rttp_cache::config::CacheConfig;
use rttp_cache::context::Context;
use rttp_cache::middleware::{LoggerMiddleware, Pipeline};
use rttp_cache::security::CorsPolicy;
use rttp_cache::server::Server;
use rttp_cache::{Response, StatusCode};
use tracing_subscriber::EnvFilter;

async fn content(ctx: Context) -> Response {
    let url = ctx.request().requested_url();
    // Stand-in for a slow database read.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    match Response::json(&serde_json::json!({ "url": url, "generatedAt": now_millis() })) {
        Ok(response) => response,
        Err(e) => Response::new(StatusCode::InternalServerError).body(e.to_string()),
    }
}

fn now_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => CacheConfig::from_file(path)?,
        None => CacheConfig::new("/api")
            .include_collection("posts")
            .include_global("header")
            .with_cors(CorsPolicy::Wildcard),
    };

    let pipeline = Pipeline::new(content)
        .with(LoggerMiddleware)
        .with(ResponseCache::new(config, Arc::new(MemoryStore::new())));

    let server = Server::bind("127.0.0.1:8080").await?;
    server
        .serve_with_shutdown(pipeline, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
