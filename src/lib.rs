//! # rttp-cache
//!
//! Identity-aware read-through response caching for an async HTTP/1.1 stack.
//!
//! [`cache::ResponseCache`] sits in a middleware [`Pipeline`](middleware::Pipeline)
//! in front of a content API. Eligible `GET` requests are answered from a
//! [`cache::CacheStore`] keyed by the caller's partition, the requested URL and
//! the `Authorization` header; misses run the endpoint and its JSON body is
//! written back to the store on the way out.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use rttp_cache::cache::{MemoryStore, ResponseCache};
//! use rttp_cache::config::CacheConfig;
//! use rttp_cache::middleware::Pipeline;
//! use rttp_cache::server::Server;
//! use rttp_cache::Response;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CacheConfig::new("/api").include_collection("posts");
//!     let pipeline = Pipeline::new(|_ctx| async {
//!         Response::json(&serde_json::json!({ "docs": [] })).unwrap()
//!     })
//!     .with(ResponseCache::new(config, Arc::new(MemoryStore::new())));
//!
//!     Server::bind("127.0.0.1:8080").await?.serve(pipeline).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod http;
pub mod identity;
pub mod middleware;
pub mod security;
pub mod server;

pub use http::{Headers, Method, Request, Response, StatusCode};
pub use server::{Server, ServerError};
