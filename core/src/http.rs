//! HTTP wire types shared by the request builder, the transport and the
//! error classifier.
//!
//! # Design
//! Requests and responses are plain data. `RecEngClient::build_*` produces an
//! `HttpRequest`, a `Transport` turns it into an `HttpResponse` or a
//! `TransportFailure`, and the classifier decides what the caller sees.
//! Keeping the descriptors free of any transport type lets callers run the
//! round trip themselves and lets tests assert on exact wire output.

use std::fmt;

/// HTTP method for a request. Bodyless calls use `Get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Post => f.write_str("POST"),
        }
    }
}

/// An HTTP request described as plain data.
///
/// `url` already carries the full query string. The body, when present, is
/// sent in one piece without an `Expect: 100-continue` handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
///
/// The body is kept as raw bytes; whether it is UTF-8 or JSON is decided
/// when it is decoded, never by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }
}

/// Why a round trip failed before any HTTP status was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    HostResolution,
    Connect,
    Timeout,
    Other,
}

/// A transport-level failure together with the transport's own description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub reason: FailureReason,
    pub message: String,
}

impl TransportFailure {
    pub fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.reason, self.message)
    }
}
