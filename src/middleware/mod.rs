//! Middleware pipeline — composable before/after request handler logic.
//!
//! A [`Pipeline`] is an ordered middleware stack ending in a terminal endpoint.
//! Each middleware wraps the next layer, so it can inspect the request,
//! short-circuit with its own response (a cache hit), or decorate the response
//! the downstream produced (CORS headers, body capture).
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining chain; call [`Next::run`] to advance.
//! - [`MiddlewareHandler`] — type-erased, cheaply-cloneable middleware function.
//! - [`Handler`] — the type-erased terminal endpoint.
//! - [`Pipeline`] — owns the stack and dispatches requests through it.
//! - [`LoggerMiddleware`] — built-in request/response logger.

use std::{future::Future, pin::Pin, sync::Arc};
use tokio::time::Instant;

use crate::{Request, Response, context::Context};

/// Boxed future returned by middleware and endpoint handlers.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A type-erased, reference-counted middleware function.
///
/// The [`Arc`] wrapper makes handlers cheap to clone so that [`Next`] can
/// advance through the chain without copying closures.
pub type MiddlewareHandler = Arc<dyn Fn(Context, Next) -> BoxFuture + Send + Sync + 'static>;

/// Type-erased terminal handler that turns a [`Context`] into a [`Response`].
pub type Handler = Arc<dyn Fn(Context) -> BoxFuture + Send + Sync + 'static>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed by [`run`](Self::run), so a middleware can forward a
/// request at most once. Once the middleware stack is exhausted the endpoint
/// handler is invoked.
pub struct Next {
    middlewares: Vec<MiddlewareHandler>,
    endpoint: Handler,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
}

impl Next {
    /// Creates a new `Next` positioned at the start of `middlewares`.
    pub fn new(middlewares: Vec<MiddlewareHandler>, endpoint: Handler) -> Self {
        Self {
            middlewares,
            endpoint,
            index: 0,
        }
    }

    /// Invokes the next middleware, or the endpoint when none remain.
    pub async fn run(mut self, ctx: Context) -> Response {
        if self.index < self.middlewares.len() {
            let handler = self.middlewares[self.index].clone();
            self.index += 1;
            handler(ctx, self).await
        } else {
            (self.endpoint)(ctx).await
        }
    }
}

/// The core trait for all middleware.
///
/// Implementors receive a [`Context`] and a [`Next`] cursor. They may:
///
/// - **Pass through** — call `next.run(ctx).await` without modification.
/// - **Short-circuit** — return a [`Response`] directly without calling `next`.
/// - **Decorate** — call `next.run(ctx).await`, inspect the response, and return
///   a modified copy.
///
/// Implementations must be `Send + Sync` because one instance is shared by
/// every connection task, and must return a `Send` future.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture;
}

/// An ordered middleware stack in front of an endpoint.
///
/// Middleware added first runs outermost.
///
/// # Examples
///
/// ```rust,no_run
/// use rttp_cache::middleware::{LoggerMiddleware, Pipeline};
/// use rttp_cache::{Response, StatusCode};
///
/// let pipeline = Pipeline::new(|_ctx| async { Response::new(StatusCode::Ok) })
///     .with(LoggerMiddleware);
/// assert_eq!(pipeline.len(), 1);
/// ```
pub struct Pipeline {
    middlewares: Vec<MiddlewareHandler>,
    endpoint: Handler,
}

impl Pipeline {
    /// Creates a pipeline with no middleware in front of `endpoint`.
    pub fn new<H, F>(endpoint: H) -> Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let endpoint: Handler =
            Arc::new(move |ctx: Context| -> BoxFuture { Box::pin(endpoint(ctx)) });
        Self {
            middlewares: Vec::new(),
            endpoint,
        }
    }

    /// Appends a middleware to the stack.
    #[must_use]
    pub fn with<M>(mut self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.middlewares.push(from_middleware(Arc::new(middleware)));
        self
    }

    /// Appends an already shared middleware, e.g. one the caller also keeps a handle to.
    #[must_use]
    pub fn with_shared<M>(mut self, middleware: Arc<M>) -> Self
    where
        M: Middleware + 'static,
    {
        self.middlewares.push(from_middleware(middleware));
        self
    }

    /// Returns the number of middleware layers (the endpoint is not counted).
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Runs `request` through every middleware and the endpoint.
    pub async fn dispatch(&self, request: Request) -> Response {
        let next = Next::new(self.middlewares.clone(), Arc::clone(&self.endpoint));
        next.run(Context::new(request)).await
    }
}

/// Built-in middleware that logs each request's method, path, status, and duration.
///
/// Emits one `tracing::info!` record after the downstream completes. Never
/// short-circuits.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().clone();
            let url = ctx.request().requested_url();

            let response = next.run(ctx).await;

            tracing::info!(
                method = %method,
                url = %url,
                status = response.status().as_u16(),
                elapsed = ?start.elapsed(),
                "request completed"
            );

            response
        })
    }
}
