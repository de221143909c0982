use super::matcher::RequestMatcher;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// An expectation for a request
#[derive(Debug, Clone)]
pub struct Expectation {
    pub(crate) matcher: RequestMatcher,
    pub(crate) response: MockResponse,
    pub(crate) times: Times,
    pub(crate) call_count: usize,
}

impl Expectation {
    pub(crate) fn new(matcher: RequestMatcher) -> Self {
        Self {
            matcher,
            response: MockResponse::default(),
            times: Times::Any,
            call_count: 0,
        }
    }

    /// Whether this expectation may still answer another request.
    ///
    /// Bounded expectations stop matching once their budget is used up, so
    /// an earlier expectation for the same route can answer the next call.
    pub(crate) fn has_capacity(&self) -> bool {
        self.times.limit().map_or(true, |limit| self.call_count < limit)
    }

    /// Panic unless the call count fits `times`
    pub(crate) fn assert_satisfied(&self) {
        if let Some(limit) = self.times.limit() {
            assert_eq!(
                self.call_count, limit,
                "Expectation {:?} expected {} calls, got {}",
                self.matcher, limit, self.call_count
            );
        }
    }
}

/// How many calls an expectation should answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Times {
    Once,
    Exactly(usize),
    /// Unbounded; never fails verification
    Any,
}

impl Times {
    fn limit(self) -> Option<usize> {
        match self {
            Times::Once => Some(1),
            Times::Exactly(n) => Some(n),
            Times::Any => None,
        }
    }
}

/// A mocked response
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) delay: Option<Duration>,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            delay: None,
        }
    }
}

impl MockResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, key: &'static str, value: &'static str) -> Self {
        self.headers.insert(
            http::header::HeaderName::from_static(key),
            http::header::HeaderValue::from_static(value),
        );
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn json(mut self, body: impl serde::Serialize) -> Self {
        self.headers.insert(
            http::header::CONTENT_TYPE,
            http::header::HeaderValue::from_static("application/json"),
        );
        self.body = serde_json::to_vec(&body)
            .expect("mock body must serialize")
            .into();
        self
    }

    /// JSON body wrapped the way the backend wraps every payload: `{"data": ...}`
    pub fn data(self, data: impl serde::Serialize) -> Self {
        let data = serde_json::to_value(data).expect("mock body must serialize");
        self.json(serde_json::json!({ "data": data }))
    }

    /// Hold the response back for `delay` before answering
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}
