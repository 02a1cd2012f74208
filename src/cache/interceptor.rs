//! Read-through interception for a single request.
//!
//! The interceptor's lifecycle is carried by ownership rather than a mutable
//! state field:
//!
//! ```text
//! ResponseInterceptor ──lookup()──▶ Lookup::Hit(Response)         downstream skipped
//!                         └──────▶ Lookup::Miss(PendingCapture)
//!                                     └──capture(response)──▶ Response (persisted)
//! ```
//!
//! Every transition consumes the previous state, so a request reads the store
//! before it can write, and a body is captured at most once.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use tokio::time;
use tracing::{debug, warn};

use super::{CacheKey, CacheStore};
use crate::{
    Response, StatusCode,
    config::{CacheConfig, WriteMode},
    context::Context,
    http::response::APPLICATION_JSON,
    middleware::Next,
};

/// Store access settings shared by the lookup and the capture.
#[derive(Debug, Clone, Copy)]
pub struct CaptureOptions {
    pub timeout: Duration,
    pub write_mode: WriteMode,
}

impl From<&CacheConfig> for CaptureOptions {
    fn from(config: &CacheConfig) -> Self {
        Self {
            timeout: config.store_timeout(),
            write_mode: config.write_mode(),
        }
    }
}

/// Outcome of checking the store.
pub enum Lookup {
    /// A ready `200 application/json` response carrying the stored body.
    Hit(Response),
    /// Nothing usable was stored; the downstream has to produce the response.
    Miss(PendingCapture),
}

/// Interceptor installed for one cache-eligible request, before the store is read.
pub struct ResponseInterceptor {
    store: Arc<dyn CacheStore>,
    key: CacheKey,
    options: CaptureOptions,
}

impl ResponseInterceptor {
    pub fn new(store: Arc<dyn CacheStore>, key: CacheKey, options: CaptureOptions) -> Self {
        Self {
            store,
            key,
            options,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Reads the store. Empty entries, read errors and timeouts count as a miss.
    pub async fn lookup(self) -> Lookup {
        let read = time::timeout(self.options.timeout, self.store.get(&self.key)).await;

        match read {
            Ok(Ok(Some(body))) if !body.is_empty() => {
                debug!(key = %self.key, bytes = body.len(), "cache hit");
                return Lookup::Hit(hit_response(body));
            }
            Ok(Ok(_)) => debug!(key = %self.key, "cache miss"),
            Ok(Err(e)) => warn!(key = %self.key, error = %e, "cache read failed; treating as miss"),
            Err(_) => warn!(
                key = %self.key,
                timeout = ?self.options.timeout,
                "cache read timed out; treating as miss"
            ),
        }

        Lookup::Miss(PendingCapture {
            store: self.store,
            key: self.key,
            options: self.options,
        })
    }
}

/// A missed request waiting for its downstream response.
pub struct PendingCapture {
    store: Arc<dyn CacheStore>,
    key: CacheKey,
    options: CaptureOptions,
}

impl PendingCapture {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Runs the rest of the chain once and captures what it returns.
    pub async fn forward(self, ctx: Context, next: Next) -> Response {
        let response = next.run(ctx).await;
        self.capture(response).await
    }

    /// Persists the body of a successful JSON response, then hands the
    /// response back untouched.
    ///
    /// Error statuses, non-JSON and empty bodies are passed through without a
    /// write. Store failures are logged and never reach the client.
    pub async fn capture(self, response: Response) -> Response {
        let capturable = response.status().is_success()
            && response.is_json()
            && !response.payload().is_empty();
        if !capturable {
            debug!(
                key = %self.key,
                status = response.status().as_u16(),
                "response not cacheable; skipping capture"
            );
            return response;
        }

        let body = response.payload().clone();
        match self.options.write_mode {
            WriteMode::Inline => persist(self.store, self.key, body, self.options.timeout).await,
            WriteMode::Detached => {
                tokio::spawn(persist(self.store, self.key, body, self.options.timeout));
            }
        }

        response
    }
}

fn hit_response(body: Bytes) -> Response {
    Response::new(StatusCode::Ok)
        .header("Content-Type", APPLICATION_JSON)
        .body_bytes(body)
}

async fn persist(store: Arc<dyn CacheStore>, key: CacheKey, body: Bytes, limit: Duration) {
    let bytes = body.len();
    match time::timeout(limit, store.set(&key, body)).await {
        Ok(Ok(())) => debug!(key = %key, bytes, "response captured"),
        Ok(Err(e)) => warn!(key = %key, error = %e, "cache write failed"),
        Err(_) => warn!(key = %key, timeout = ?limit, "cache write timed out"),
    }
}
