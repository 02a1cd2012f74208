use std::collections::BTreeSet;

use serde::Deserialize;

use crate::{
    Method, Response, StatusCode,
    context::Context,
    http::Headers,
    middleware::{BoxFuture, Middleware, Next},
};

/// Value of `Access-Control-Allow-Methods` whenever CORS is enabled.
pub const ALLOW_METHODS: &str = "PUT, PATCH, POST, GET, DELETE, OPTIONS";

/// Value of `Access-Control-Allow-Headers` whenever CORS is enabled.
pub const ALLOW_HEADERS: &str = "Origin, X-Requested-With, Content-Type, Accept, Authorization, Content-Encoding, x-apollo-tracing, x-api-key";

/// Which origins may read responses cross-origin.
///
/// Deserializes from the same shapes a CMS config uses for its `cors` field:
/// `false` (disabled), `"*"` (any origin) or an array of origins.
///
/// ```
/// use rttp_cache::security::CorsPolicy;
///
/// let policy: CorsPolicy = serde_json::from_str(r#"["https://a.example"]"#).unwrap();
/// assert!(policy.allows("https://a.example"));
/// assert!(!policy.allows("https://b.example"));
///
/// let policy: CorsPolicy = serde_json::from_str("false").unwrap();
/// assert_eq!(policy, CorsPolicy::Disabled);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawCorsPolicy")]
pub enum CorsPolicy {
    #[default]
    Disabled,
    Wildcard,
    AllowList(BTreeSet<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCorsPolicy {
    Flag(bool),
    Origin(String),
    List(Vec<String>),
}

impl TryFrom<RawCorsPolicy> for CorsPolicy {
    type Error = String;

    fn try_from(raw: RawCorsPolicy) -> Result<Self, Self::Error> {
        match raw {
            RawCorsPolicy::Flag(false) => Ok(Self::Disabled),
            RawCorsPolicy::Flag(true) => {
                Err("cors: `true` is ambiguous, use \"*\" or a list of origins".to_owned())
            }
            RawCorsPolicy::Origin(origin) if origin == "*" => Ok(Self::Wildcard),
            RawCorsPolicy::Origin(origin) => Ok(Self::allow_list([origin])),
            RawCorsPolicy::List(origins) => Ok(Self::allow_list(origins)),
        }
    }
}

impl CorsPolicy {
    pub fn allow_list<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AllowList(origins.into_iter().map(Into::into).collect())
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Returns `true` when `origin` would be granted access.
    pub fn allows(&self, origin: &str) -> bool {
        match self {
            Self::Disabled => false,
            Self::Wildcard => true,
            Self::AllowList(origins) => origins.contains(origin),
        }
    }
}

/// Writes the `Access-Control-*` headers `policy` grants to `request_origin`.
///
/// Wildcard responses never carry `Access-Control-Allow-Credentials`; an
/// allow-listed origin is echoed back together with credentials, and `Origin`
/// joins whatever `Vary` values the response already carries. Annotating twice
/// is harmless.
pub fn annotate(headers: &mut Headers, request_origin: Option<&str>, policy: &CorsPolicy) {
    match policy {
        CorsPolicy::Disabled => return,
        CorsPolicy::Wildcard => {
            headers.set("Access-Control-Allow-Origin", "*");
        }
        CorsPolicy::AllowList(origins) => {
            if let Some(origin) = request_origin.filter(|o| origins.contains(*o)) {
                headers.set("Access-Control-Allow-Credentials", "true");
                headers.set("Access-Control-Allow-Origin", origin);
                headers.append_token("Vary", "Origin");
            }
        }
    }

    headers.set("Access-Control-Allow-Methods", ALLOW_METHODS);
    headers.set("Access-Control-Allow-Headers", ALLOW_HEADERS);
}

/// CORS as a standalone layer: answers preflight requests and annotates every
/// response with the configured policy.
///
/// The response cache already annotates the requests it accepts; put this in
/// front of it when the rest of the API needs CORS too.
///
/// # Examples
///
/// ```rust,no_run
/// use rttp_cache::security::{CorsMiddleware, CorsPolicy};
///
/// let cors = CorsMiddleware::new(CorsPolicy::allow_list(["https://app.example.com"]));
/// ```
pub struct CorsMiddleware {
    policy: CorsPolicy,
}

impl CorsMiddleware {
    pub fn new(policy: CorsPolicy) -> Self {
        Self { policy }
    }
}

impl Middleware for CorsMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture {
        let policy = self.policy.clone();

        Box::pin(async move {
            if !policy.is_enabled() {
                return next.run(ctx).await;
            }

            let origin = ctx.request().origin().map(str::to_owned);

            let mut resp = if ctx.request().method() == &Method::Options {
                Response::new(StatusCode::NoContent).header("Access-Control-Max-Age", "3600")
            } else {
                next.run(ctx).await
            };

            annotate(resp.headers_mut(), origin.as_deref(), &policy);
            resp
        })
    }
}
