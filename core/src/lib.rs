//! Blocking client for a remote recommendation engine.
//!
//! # Overview
//! Submits events, catalog items and users to the engine and fetches item
//! recommendations, one synchronous HTTP+JSON round trip per call.
//!
//! # Design
//! - `RecEngClient` holds only an immutable, validated `ClientConfig` and a
//!   `Transport`; it is safe to share between threads.
//! - Each operation is split into `build_*` (produces an `HttpRequest`) and
//!   `parse_*` (consumes an `HttpResponse`), so callers can run the I/O
//!   themselves. The blocking methods compose the two around one transport
//!   call; nothing is retried.
//! - Failures are `ClientError` values with a closed `ErrorKind`.
//! - Time enters the data model through the `Clock` trait.

pub mod classify;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod request;
pub mod transport;
pub mod types;

pub use client::{methods, RecEngClient};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ClientConfig;
pub use error::{ClientError, ErrorKind, FaultInfo, Result};
pub use http::{FailureReason, HttpMethod, HttpRequest, HttpResponse, TransportFailure};
pub use transport::{ReqwestTransport, Transport};
pub use types::{
    Event, Identifier, Item, ItemRecommendation, NameValue, RecEngException, RecommendationContext, User,
};
