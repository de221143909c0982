use super::expectation::{Expectation, MockResponse, Times};
use super::matcher::RequestMatcher;
use bytes::Bytes;
use http::{HeaderMap, Method};
use http_body_util::Full;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

type SharedState = Arc<Mutex<ServerState>>;

/// A mock of the notification REST backend
pub struct MockServer {
    addr: SocketAddr,
    state: SharedState,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

#[derive(Default)]
struct ServerState {
    expectations: Vec<Expectation>,
    received: Vec<RecordedRequest>,
    unmatched: Vec<RecordedRequest>,
}

impl ServerState {
    /// Record `request` and pick the response for it.
    ///
    /// Later expectations override earlier ones until their budget is spent.
    fn answer(&mut self, request: RecordedRequest) -> Option<MockResponse> {
        self.received.push(request.clone());

        let found = self.expectations.iter_mut().rev().find(|exp| {
            exp.has_capacity()
                && exp
                    .matcher
                    .matches(&request.method, &request.path, &request.headers)
        });

        match found {
            Some(exp) => {
                exp.call_count += 1;
                Some(exp.response.clone())
            }
            None => {
                self.unmatched.push(request);
                None
            }
        }
    }
}

/// A request as the mock server saw it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
}

impl RecordedRequest {
    /// Value of the `Authorization` header, if any
    pub fn authorization(&self) -> Option<&str> {
        self.headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
    }
}

impl MockServer {
    /// Start a new mock server on a random port
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");

        let state = SharedState::default();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(accept_loop(listener, state.clone(), shutdown_rx));

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Every request the server answered, matched or not, in arrival order
    pub fn received_requests(&self) -> Vec<RecordedRequest> {
        self.lock().received.clone()
    }

    /// Requests no expectation answered
    pub fn unmatched_requests(&self) -> Vec<RecordedRequest> {
        self.lock().unmatched.clone()
    }

    /// Number of requests received for `method` on `path`
    pub fn hits(&self, method: &Method, path: &str) -> usize {
        self.lock()
            .received
            .iter()
            .filter(|r| &r.method == method && r.path == path)
            .count()
    }

    /// Register an expectation; it takes effect when the builder is dropped
    pub fn expect(&self, matcher: RequestMatcher) -> ExpectationBuilder {
        ExpectationBuilder {
            server: self.state.clone(),
            expectation: Some(Expectation::new(matcher)),
        }
    }

    /// Panic if a bounded expectation was not called exactly as often as declared
    pub fn verify(&self) {
        self.lock()
            .expectations
            .iter()
            .for_each(Expectation::assert_satisfied);
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().expect("mock server state")
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

pub struct ExpectationBuilder {
    server: SharedState,
    expectation: Option<Expectation>,
}

impl ExpectationBuilder {
    pub fn respond_with(self, response: MockResponse) -> Self {
        self.update(|exp| exp.response = response)
    }

    pub fn times(self, n: usize) -> Self {
        self.update(|exp| exp.times = Times::Exactly(n))
    }

    pub fn once(self) -> Self {
        self.update(|exp| exp.times = Times::Once)
    }

    fn update(mut self, f: impl FnOnce(&mut Expectation)) -> Self {
        if let Some(exp) = self.expectation.as_mut() {
            f(exp);
        }
        self
    }
}

impl Drop for ExpectationBuilder {
    fn drop(&mut self) {
        if let Some(exp) = self.expectation.take() {
            if let Ok(mut state) = self.server.lock() {
                state.expectations.push(exp);
            }
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    state: SharedState,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        let stream = tokio::select! {
            _ = &mut shutdown_rx => break,
            res = listener.accept() => match res {
                Ok((stream, _)) => stream,
                Err(e) => {
                    tracing::warn!("mock server accept error: {}", e);
                    continue;
                }
            },
        };

        let state = state.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(req, state.clone()));
            if let Err(err) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                tracing::debug!("mock server connection error: {:?}", err);
            }
        });
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: SharedState,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let recorded = RecordedRequest {
        method: req.method().clone(),
        path: req.uri().path().to_string(),
        headers: req.headers().clone(),
    };

    // Resolve under the lock, sleep outside of it
    let answer = match state.lock() {
        Ok(mut state) => state.answer(recorded),
        Err(_) => None,
    };

    let Some(mock) = answer else {
        let mut response = Response::new(Full::new(Bytes::from_static(b"No expectation matched")));
        *response.status_mut() = StatusCode::NOT_FOUND;
        return Ok(response);
    };

    if let Some(delay) = mock.delay {
        tokio::time::sleep(delay).await;
    }

    let mut response = Response::new(Full::new(mock.body));
    *response.status_mut() = mock.status;
    *response.headers_mut() = mock.headers;
    Ok(response)
}
