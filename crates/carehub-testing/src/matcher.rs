use http::{HeaderMap, Method};

/// Matcher for HTTP requests
#[derive(Debug, Clone, Default)]
pub struct RequestMatcher {
    pub(crate) method: Option<Method>,
    pub(crate) path: Option<String>,
    pub(crate) headers: Vec<(String, String)>,
}

impl RequestMatcher {
    /// Create a new matcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Match a specific HTTP method
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Match a specific path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Match a specific header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Match `Authorization: Bearer <token>`
    pub fn bearer(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.header("authorization", value)
    }

    /// `GET /notification`
    pub fn list_notifications() -> Self {
        Self::new().method(Method::GET).path("/notification")
    }

    /// `PATCH /notification/{id}/seen`
    pub fn mark_seen(id: &str) -> Self {
        Self::new()
            .method(Method::PATCH)
            .path(format!("/notification/{}/seen", id))
    }

    /// `PATCH /notification/seen-all`
    pub fn mark_all_seen() -> Self {
        Self::new()
            .method(Method::PATCH)
            .path("/notification/seen-all")
    }

    /// Check if the matcher matches a request
    pub fn matches(&self, method: &Method, path: &str, headers: &HeaderMap) -> bool {
        if let Some(m) = &self.method {
            if m != method {
                return false;
            }
        }

        if let Some(p) = &self.path {
            if p != path {
                return false;
            }
        }

        self.headers
            .iter()
            .all(|(k, v)| headers.get(k.as_str()).is_some_and(|val| val == v.as_str()))
    }
}
