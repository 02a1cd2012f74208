//! Security middleware: cross-origin resource sharing.
//!
//! - [`CorsPolicy`] / [`annotate`]: the static policy and the header writer the
//!   response cache applies to every request it accepts.
//! - [`CorsMiddleware`]: the same policy as a standalone layer for routes the
//!   cache does not cover.

mod cors;

pub use cors::{ALLOW_HEADERS, ALLOW_METHODS, CorsMiddleware, CorsPolicy, annotate};
