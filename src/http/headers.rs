//! Ordered header list with ASCII case-insensitive names.

/// Request and response headers.
///
/// Entries keep their insertion order and original casing, which is what goes
/// out on the wire. [`insert`](Self::insert) appends another value for a name,
/// [`set`](Self::set) replaces all of them and
/// [`append_token`](Self::append_token) extends a list header. The CORS layer
/// only uses the last two, so annotating a response twice leaves one line per
/// header and keeps the downstream's `Vary` values.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Vary", "Accept");
/// headers.insert("Vary", "Origin");
/// headers.set("Content-Type", "text/plain");
/// headers.set("content-type", "application/json");
///
/// assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
/// assert_eq!(headers.get_all("vary").collect::<Vec<_>>(), ["Accept", "Origin"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

fn same_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Drops every value stored under `name`, then stores `value` once.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    /// Adds `token` to a comma-separated list header such as `Vary`, unless
    /// one of the existing values already lists it.
    pub fn append_token(&mut self, name: &str, token: &str) {
        let listed = self
            .get_all(name)
            .flat_map(|value| value.split(','))
            .any(|existing| existing.trim().eq_ignore_ascii_case(token));
        if !listed {
            self.insert(name, token);
        }
    }

    /// First value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| same_name(key, name))
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(key, _)| same_name(key, name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns `true` if anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(key, _)| !same_name(key, name));
        self.entries.len() != before
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of entries, counting repeated names separately.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut h = Headers::new();
        h.insert("Authorization", "JWT abc");
        assert_eq!(h.get("authorization"), Some("JWT abc"));
        assert!(h.contains("AUTHORIZATION"));
        assert!(!h.contains("cookie"));
    }

    #[test]
    fn set_collapses_every_casing() {
        let mut h = Headers::new();
        h.insert("access-control-allow-origin", "*");
        h.insert("Access-Control-Allow-Origin", "https://a.example");
        h.set("Access-Control-Allow-Origin", "https://b.example");
        assert_eq!(
            h.get_all("access-control-allow-origin").collect::<Vec<_>>(),
            ["https://b.example"]
        );
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn remove_reports_whether_anything_went() {
        let mut h = Headers::new();
        h.insert("Set-Cookie", "a=1");
        h.insert("Set-Cookie", "b=2");
        assert!(h.remove("set-cookie"));
        assert!(h.is_empty());
        assert!(!h.remove("set-cookie"));
    }

    #[test]
    fn append_token_keeps_existing_values() {
        let mut h = Headers::new();
        h.insert("Vary", "Accept-Encoding");
        h.append_token("vary", "Origin");
        h.append_token("Vary", "origin");
        assert_eq!(h.get_all("vary").collect::<Vec<_>>(), ["Accept-Encoding", "Origin"]);

        let mut h = Headers::new();
        h.insert("Vary", "Accept-Encoding, Origin");
        h.append_token("Vary", "Origin");
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn iteration_keeps_order_and_casing() {
        let mut h = Headers::new();
        h.insert("Content-Type", "application/json");
        h.insert("vary", "Origin");
        assert_eq!(
            h.iter().collect::<Vec<_>>(),
            [("Content-Type", "application/json"), ("vary", "Origin")]
        );
    }
}
