//! Error types for the recommendation engine client.
//!
//! # Design
//! Every failure surfaces as a `ClientError`. Callers branch on
//! `ClientError::kind()`, a closed enumeration, rather than on message text.
//! Transport failures keep the transport's description for debugging; HTTP
//! failures keep the status code and, when the engine sent one, its decoded
//! fault body.

use std::fmt;

use crate::types::RecEngException;

/// Closed set of failure kinds exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid `ClientConfig`, detected before any network call.
    Config,
    /// The engine's host name could not be resolved.
    HostResolution,
    /// A connection to the engine could not be established.
    Connect,
    /// The call exceeded the configured timeout.
    Timeout,
    /// Any other transport-layer failure.
    OtherTransport,
    /// The engine answered with a status other than 200.
    Http,
    /// A 200 response body did not match the expected shape.
    Decode,
    /// The request body could not be encoded as JSON.
    Serialization,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Config => "ConfigError",
            ErrorKind::HostResolution => "HostResolutionError",
            ErrorKind::Connect => "ConnectError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::OtherTransport => "OtherTransportError",
            ErrorKind::Http => "HttpError",
            ErrorKind::Decode => "DecodeError",
            ErrorKind::Serialization => "SerializationError",
        };
        f.write_str(name)
    }
}

/// Describes a client-side or transport failure by kind alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultInfo {
    pub error_code: ErrorKind,
}

/// Errors returned by `RecEngClient`.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("could not resolve host: {0}")]
    HostResolution(String),

    #[error("could not connect: {0}")]
    Connect(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("transport failure: {0}")]
    OtherTransport(String),

    #[error("HTTP {status}{}", describe_fault(.fault))]
    Http {
        status: u16,
        fault: Option<RecEngException>,
    },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("could not encode request: {0}")]
    Serialization(String),
}

fn describe_fault(fault: &Option<RecEngException>) -> String {
    match fault {
        Some(f) => format!(": {} ({})", f.message, f.rec_eng_error_code),
        None => String::new(),
    }
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Config(_) => ErrorKind::Config,
            ClientError::HostResolution(_) => ErrorKind::HostResolution,
            ClientError::Connect(_) => ErrorKind::Connect,
            ClientError::Timeout(_) => ErrorKind::Timeout,
            ClientError::OtherTransport(_) => ErrorKind::OtherTransport,
            ClientError::Http { .. } => ErrorKind::Http,
            ClientError::Decode(_) => ErrorKind::Decode,
            ClientError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    pub fn fault_info(&self) -> FaultInfo {
        FaultInfo {
            error_code: self.kind(),
        }
    }

    /// HTTP status of an `Http` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Engine fault decoded from an error body, if any.
    pub fn rec_eng_exception(&self) -> Option<&RecEngException> {
        match self {
            ClientError::Http { fault, .. } => fault.as_ref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
