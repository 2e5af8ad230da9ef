//! Executes `HttpRequest` values against the network.
//!
//! # Design
//! `Transport` is the single I/O seam of the crate. `ReqwestTransport` is the
//! blocking implementation used by default; tests and embedding hosts can
//! substitute their own. A transport runs each request exactly once and
//! reports either the raw response (any status) or a `TransportFailure`.
//! Status interpretation is left to the classifier.
//!
//! With `verify_peer_tls` off, the certificate chain is not validated but the
//! host name in the certificate must still match the URL.

use std::error::Error as StdError;
use std::io::{self, Read};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::blocking::{Client, Response};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::ParsedCertificate;
use rustls::{DigitallySignedStruct, SignatureScheme};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::http::{FailureReason, HttpMethod, HttpRequest, HttpResponse, TransportFailure};

/// Upper bound on how much of a non-200 body is read. Larger fault bodies are
/// dropped and the call reports the status alone.
pub const MAX_FAULT_BODY_BYTES: u64 = 1024 * 1024;

/// Performs one HTTP round trip.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportFailure>;
}

/// Blocking transport backed by a `reqwest::blocking::Client`.
///
/// The client may keep idle connections alive between calls; that is
/// invisible to callers. Redirects are not followed.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Configure timeouts and TLS verification from `config`.
    ///
    /// `timeout_seconds` bounds both connection setup and the whole call.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let timeout = config.timeout();
        let mut builder = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none());
        if config.is_secure() && !config.verify_peer_tls {
            builder = builder.use_preconfigured_tls(name_only_tls()?);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportFailure> {
        debug!(method = %request.method, url = %request.url, "sending request");

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let mut response = builder.send().map_err(to_failure)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        // The whole-call timeout also covers reading the body.
        let body = if status == 200 {
            response.bytes().map_err(to_failure)?.to_vec()
        } else {
            read_fault_body(&mut response)
        };

        debug!(status, bytes = body.len(), "received response");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Read at most `MAX_FAULT_BODY_BYTES` of an error response. Anything that
/// goes wrong here leaves the body empty; the status alone is still reported.
fn read_fault_body(response: &mut Response) -> Vec<u8> {
    let mut body = Vec::new();
    let read = response
        .take(MAX_FAULT_BODY_BYTES + 1)
        .read_to_end(&mut body);
    match read {
        Ok(n) if n as u64 > MAX_FAULT_BODY_BYTES => {
            warn!(limit = MAX_FAULT_BODY_BYTES, "fault body too large, ignored");
            Vec::new()
        }
        Ok(_) => body,
        Err(err) => {
            warn!(error = %err, "fault body unreadable, ignored");
            Vec::new()
        }
    }
}

/// `Authorization` header value for HTTP Basic authentication.
pub fn basic_auth(user: &str, password: Option<&str>) -> String {
    let credentials = format!("{user}:{}", password.unwrap_or_default());
    format!("Basic {}", STANDARD.encode(credentials))
}

fn name_only_tls() -> Result<rustls::ClientConfig, ClientError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| ClientError::Config(format!("cannot configure TLS: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NameOnlyVerifier { provider }))
        .with_no_client_auth();
    Ok(config)
}

/// Accepts any certificate chain whose leaf names the server being contacted.
/// Handshake signatures are still checked against the leaf key.
#[derive(Debug)]
struct NameOnlyVerifier {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for NameOnlyVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let cert = ParsedCertificate::try_from(end_entity)?;
        rustls::client::verify_server_name(&cert, server_name)?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

fn to_failure(err: reqwest::Error) -> TransportFailure {
    let reason = classify_error(&err, err.is_timeout(), err.is_connect());
    warn!(?reason, error = %err, "transport failure");
    TransportFailure::new(reason, error_chain(&err))
}

/// Resolution failures surface as connect errors, so the source chain is
/// searched for the resolver's message before the connect flag is trusted.
fn classify_error(err: &(dyn StdError + 'static), timeout: bool, connect: bool) -> FailureReason {
    if timeout {
        return FailureReason::Timeout;
    }
    let chain = || std::iter::successors(Some(err), |e: &&(dyn StdError + 'static)| (*e).source());
    let resolver_failed = chain().any(|e| {
        let text = e.to_string();
        text.contains("dns error") || text.contains("failed to lookup address")
    });
    if resolver_failed {
        return FailureReason::HostResolution;
    }
    if connect {
        return FailureReason::Connect;
    }
    chain()
        .find_map(|e| e.downcast_ref::<io::Error>())
        .map_or(FailureReason::Other, io_reason)
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    std::iter::successors(Some(err), |e: &&(dyn StdError + 'static)| (*e).source())
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}

fn io_reason(err: &io::Error) -> FailureReason {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => FailureReason::Timeout,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::AddrNotAvailable => FailureReason::Connect,
        _ => FailureReason::Other,
    }
}
