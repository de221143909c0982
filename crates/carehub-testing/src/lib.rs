//! Test doubles for the carehub notification backend
//!
//! [`MockServer`] stands in for the REST API: register expectations built
//! from a [`RequestMatcher`] and a [`MockResponse`], drive the client, then
//! [`MockServer::verify`] the call counts.
//!
//! [`MockPushServer`] stands in for the real-time channel: it accepts
//! WebSocket clients, records each handshake and lets a test push frames to
//! every connected client or drop them all.

pub mod expectation;
pub mod matcher;
pub mod push;
pub mod server;

pub use expectation::{Expectation, MockResponse, Times};
pub use matcher::RequestMatcher;
pub use push::{Handshake, MockPushServer};
pub use server::{MockServer, RecordedRequest};
