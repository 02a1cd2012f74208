//! Which requests the cache is allowed to answer.

use crate::{Method, config::CacheConfig};

/// Path segment that introduces a global under the API base URL.
const GLOBALS_SEGMENT: &str = "globals";

/// The configured surface a cacheable path matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Surface<'a> {
    Collection(&'a str),
    Global(&'a str),
    Path(&'a str),
}

/// Returns `true` when a request may be served from, and written to, the cache.
///
/// Only `GET` qualifies, and only for paths under the base URL that hit an
/// included collection, global or literal path.
pub fn is_cacheable(method: &Method, path: &str, config: &CacheConfig) -> bool {
    *method == Method::Get && classify(path, config).is_some()
}

/// Matches `path` (no query string) against the configured surfaces.
///
/// Matching is segment based: with base `/api`, `/api/posts/42` is collection
/// `posts`, `/api/globals/header` is global `header`, and `/apiary` is outside
/// the base entirely.
pub fn classify<'a>(path: &'a str, config: &CacheConfig) -> Option<Surface<'a>> {
    let rest = path.strip_prefix(config.api_base_url())?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }

    let mut segments = rest.split('/').filter(|s| !s.is_empty());
    match segments.next() {
        Some(GLOBALS_SEGMENT) => {
            if let Some(global) = segments.next().filter(|g| config.includes_global(g)) {
                return Some(Surface::Global(global));
            }
        }
        Some(collection) if config.includes_collection(collection) => {
            return Some(Surface::Collection(collection));
        }
        _ => {}
    }

    let literal = rest.trim_end_matches('/');
    config
        .includes_path(literal)
        .then_some(Surface::Path(literal))
}
