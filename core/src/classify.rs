//! Maps transport outcomes onto `ClientError`.
//!
//! Order matters: a transport failure wins and the body is never looked at;
//! otherwise any status other than 200 is an `Http` error, enriched with the
//! engine's fault body when that body happens to decode.

use crate::error::ClientError;
use crate::http::{FailureReason, HttpResponse, TransportFailure};
use crate::types::RecEngException;

/// Convert a transport failure into the matching error kind.
pub fn from_failure(failure: TransportFailure) -> ClientError {
    let TransportFailure { reason, message } = failure;
    match reason {
        FailureReason::HostResolution => ClientError::HostResolution(message),
        FailureReason::Connect => ClientError::Connect(message),
        FailureReason::Timeout => ClientError::Timeout(message),
        FailureReason::Other => ClientError::OtherTransport(message),
    }
}

/// Accept a 200 response; turn anything else into `ClientError::Http`.
pub fn check_status(response: &HttpResponse) -> Result<(), ClientError> {
    if response.status == 200 {
        return Ok(());
    }
    Err(ClientError::Http {
        status: response.status,
        fault: decode_fault(&response.body),
    })
}

/// Classify the full outcome of one round trip.
pub fn classify(outcome: Result<HttpResponse, TransportFailure>) -> Result<HttpResponse, ClientError> {
    let response = outcome.map_err(from_failure)?;
    check_status(&response)?;
    Ok(response)
}

/// Best-effort decode of an engine fault body. Never fails; a body that is
/// not a JSON object with `message` or `recEngErrorCode` yields `None`.
pub fn decode_fault(body: &[u8]) -> Option<RecEngException> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let object = value.as_object()?;
    if !object.contains_key("message") && !object.contains_key("recEngErrorCode") {
        return None;
    }
    let text = |key: &str| {
        object
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    Some(RecEngException {
        message: text("message"),
        rec_eng_error_code: text("recEngErrorCode"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse::new(status, body)
    }

    #[test]
    fn failure_reasons_map_to_kinds() {
        let cases = [
            (FailureReason::HostResolution, ErrorKind::HostResolution),
            (FailureReason::Connect, ErrorKind::Connect),
            (FailureReason::Timeout, ErrorKind::Timeout),
            (FailureReason::Other, ErrorKind::OtherTransport),
        ];
        for (reason, kind) in cases {
            let err = classify(Err(TransportFailure::new(reason, "x"))).unwrap_err();
            assert_eq!(err.kind(), kind, "{reason:?}");
        }
    }

    #[test]
    fn dns_failure_keeps_transport_message() {
        let err = from_failure(TransportFailure::new(
            FailureReason::HostResolution,
            "DNS resolution failed",
        ));
        assert!(matches!(err, ClientError::HostResolution(ref m) if m == "DNS resolution failed"));
    }

    #[test]
    fn server_fault_body_is_recovered() {
        let err = classify(Ok(response(
            500,
            r#"{"message":"boom","recEngErrorCode":"ERR_INTERNAL_ERROR"}"#,
        )))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Http);
        assert_eq!(err.status(), Some(500));
        let fault = err.rec_eng_exception().unwrap();
        assert_eq!(fault.message, "boom");
        assert_eq!(fault.rec_eng_error_code, "ERR_INTERNAL_ERROR");
    }

    #[test]
    fn unparsable_error_body_degrades_to_status_only() {
        for body in ["", "<html>Bad Gateway</html>", "[1,2]", r#"{"other":1}"#, "\"text\""] {
            let err = classify(Ok(response(502, body))).unwrap_err();
            assert!(matches!(err, ClientError::Http { status: 502, fault: None }), "{body}");
        }
    }

    #[test]
    fn binary_error_body_degrades_to_status_only() {
        let err = classify(Ok(HttpResponse::new(500, vec![0xff, 0xfe, 0x00, 0x41]))).unwrap_err();
        assert!(matches!(err, ClientError::Http { status: 500, fault: None }));
    }

    #[test]
    fn partial_fault_body_fills_missing_fields_with_empty() {
        let fault = decode_fault(br#"{"recEngErrorCode":"ERR_ITEM_NOT_FOUND"}"#).unwrap();
        assert_eq!(fault.message, "");
        assert_eq!(fault.rec_eng_error_code, "ERR_ITEM_NOT_FOUND");
    }

    #[test]
    fn non_200_success_codes_are_errors() {
        let err = classify(Ok(response(204, ""))).unwrap_err();
        assert_eq!(err.status(), Some(204));
    }

    #[test]
    fn ok_response_passes_through_untouched() {
        let resp = classify(Ok(response(200, "\"Hello\""))).unwrap();
        assert_eq!(resp.body, b"\"Hello\"");
    }
}
