//! Read-through response caching.
//!
//! [`ResponseCache`] is a [`Middleware`] that answers eligible `GET` requests
//! from a [`CacheStore`] and fills the store from downstream responses on a
//! miss. For each request it:
//!
//! 1. classifies the path ([`is_cacheable`]); anything else passes straight through,
//! 2. resolves the caller's [`Identity`] from the session cookie,
//! 3. builds a [`CacheKey`] from partition, requested URL and `Authorization`,
//! 4. reads the store through a [`ResponseInterceptor`], returning the stored
//!    body on a hit or capturing the downstream body on a miss,
//! 5. applies the configured CORS policy to whichever response goes out.
//!
//! Nothing in this path fails the request: store and credential problems are
//! logged and treated as "not cached".
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rttp_cache::cache::{MemoryStore, ResponseCache};
//! use rttp_cache::config::CacheConfig;
//! use rttp_cache::middleware::Pipeline;
//! use rttp_cache::Response;
//!
//! let config = CacheConfig::new("/api").include_collection("posts");
//! let cache = ResponseCache::new(config, Arc::new(MemoryStore::new()));
//!
//! let pipeline = Pipeline::new(|_ctx| async {
//!     Response::json(&serde_json::json!({ "docs": [] })).unwrap()
//! })
//! .with(cache);
//! ```

use std::sync::Arc;

use tracing::debug;

mod eligibility;
mod interceptor;
mod key;
mod store;

pub use eligibility::{Surface, classify, is_cacheable};
pub use interceptor::{CaptureOptions, Lookup, PendingCapture, ResponseInterceptor};
pub use key::CacheKey;
pub use store::{CacheStore, MemoryStore, StoreError, StoreFuture};

use crate::{
    config::CacheConfig,
    context::Context,
    identity::{Identity, IdentityResolver, TokenDecoder, UnverifiedJwtDecoder},
    middleware::{BoxFuture, Middleware, Next},
    security,
};

/// Identity-aware read-through cache middleware.
pub struct ResponseCache {
    config: Arc<CacheConfig>,
    store: Arc<dyn CacheStore>,
    resolver: Arc<IdentityResolver>,
}

impl ResponseCache {
    /// Creates the middleware with the default JWT payload decoder.
    pub fn new(config: CacheConfig, store: Arc<dyn CacheStore>) -> Self {
        Self::with_decoder(config, store, Arc::new(UnverifiedJwtDecoder))
    }

    /// Creates the middleware with a custom session token decoder.
    pub fn with_decoder(
        config: CacheConfig,
        store: Arc<dyn CacheStore>,
        decoder: Arc<dyn TokenDecoder>,
    ) -> Self {
        let resolver = IdentityResolver::new(config.token_cookie(), decoder);
        Self {
            config: Arc::new(config),
            store,
            resolver: Arc::new(resolver),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl Middleware for ResponseCache {
    fn handle(&self, mut ctx: Context, next: Next) -> BoxFuture {
        let config = Arc::clone(&self.config);
        let store = Arc::clone(&self.store);
        let resolver = Arc::clone(&self.resolver);

        Box::pin(async move {
            let request = ctx.request();
            if !is_cacheable(request.method(), request.path(), &config) {
                debug!(method = %request.method(), path = %request.path(), "not cacheable");
                return next.run(ctx).await;
            }

            let identity: Identity = resolver.resolve(request.cookie()).await;
            let key = CacheKey::build(
                identity.partition(),
                request.requested_url(),
                request.authorization().unwrap_or_default(),
            );
            let origin = request.origin().map(str::to_owned);
            ctx.extensions_mut().insert(identity);

            let interceptor = ResponseInterceptor::new(store, key, CaptureOptions::from(&*config));
            let mut response = match interceptor.lookup().await {
                Lookup::Hit(response) => response,
                Lookup::Miss(pending) => pending.forward(ctx, next).await,
            };

            security::annotate(response.headers_mut(), origin.as_deref(), config.cors());
            response
        })
    }
}
