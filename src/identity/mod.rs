//! Identity resolution: which cache partition a request belongs to.
//!
//! The partition is the requester's user collection, read from the session
//! token cookie. Resolution fails open: a missing cookie, a missing token or a
//! token that does not decode all land in the anonymous partition, so caching
//! keeps working for logged-out traffic and a bad cookie never becomes a 500.
//!
//! Token signature verification happens upstream of this layer; the
//! [`TokenDecoder`] port only has to turn a token into its payload.

use std::{future::Future, pin::Pin, sync::Arc};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::config::DEFAULT_TOKEN_COOKIE;

/// Partition used for every request without a usable credential.
pub const DEFAULT_PARTITION: &str = "loggedout";

/// The requester, as far as the cache is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    Authenticated { partition: String },
}

impl Identity {
    pub fn partition(&self) -> &str {
        match self {
            Self::Anonymous => DEFAULT_PARTITION,
            Self::Authenticated { partition } => partition,
        }
    }
}

/// Claims the cache needs from a session token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenPayload {
    pub collection: String,
}

/// Boxed future returned by [`TokenDecoder::decode`].
pub type DecodeFuture<'a> = Pin<Box<dyn Future<Output = Option<TokenPayload>> + Send + 'a>>;

/// Turns a raw session token into its payload.
///
/// Implementations must not fail loudly: anything that cannot be decoded is
/// `None`. Decoding may suspend (e.g. a session-store lookup).
pub trait TokenDecoder: Send + Sync {
    fn decode<'a>(&'a self, token: &'a str) -> DecodeFuture<'a>;
}

/// Reads the JSON payload segment of a JWT without checking its signature.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnverifiedJwtDecoder;

impl UnverifiedJwtDecoder {
    fn decode_payload(token: &str) -> Option<TokenPayload> {
        let mut segments = token.split('.');
        let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
        if segments.next().is_some() {
            return None;
        }

        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

impl TokenDecoder for UnverifiedJwtDecoder {
    fn decode<'a>(&'a self, token: &'a str) -> DecodeFuture<'a> {
        Box::pin(async move { Self::decode_payload(token) })
    }
}

/// Returns the value of cookie `name` from a `Cookie` header, if present and non-empty.
pub fn extract_cookie<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        let value = value.trim();
        (key.trim() == name && !value.is_empty()).then_some(value)
    })
}

/// Maps a request's `Cookie` header to an [`Identity`].
pub struct IdentityResolver {
    cookie_name: String,
    decoder: Arc<dyn TokenDecoder>,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_COOKIE, Arc::new(UnverifiedJwtDecoder))
    }
}

impl IdentityResolver {
    pub fn new(cookie_name: impl Into<String>, decoder: Arc<dyn TokenDecoder>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            decoder,
        }
    }

    pub async fn resolve(&self, cookie_header: Option<&str>) -> Identity {
        let Some(token) = cookie_header.and_then(|h| extract_cookie(h, &self.cookie_name)) else {
            return Identity::Anonymous;
        };

        match self.decoder.decode(token).await {
            Some(payload) if !payload.collection.is_empty() => Identity::Authenticated {
                partition: payload.collection,
            },
            Some(_) => {
                tracing::debug!(
                    cookie = %self.cookie_name,
                    "token has no collection; using default partition"
                );
                Identity::Anonymous
            }
            None => {
                tracing::debug!(
                    cookie = %self.cookie_name,
                    "token did not decode; using default partition"
                );
                Identity::Anonymous
            }
        }
    }
}
