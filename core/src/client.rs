//! Blocking client for the recommendation engine.
//!
//! # Design
//! `RecEngClient` holds a validated `ClientConfig` and a `Transport`, and no
//! mutable state, so one instance can be shared across threads. Each engine
//! operation is available in two forms:
//!
//! - `build_*` / `parse_*` pairs that only produce and consume plain
//!   `HttpRequest` / `HttpResponse` values, for hosts that run the round
//!   trip themselves;
//! - blocking methods (`add_events`, `test`, ...) that compose build, one
//!   transport call, classification and parse.

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::classify;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::request::{build_request, encode_body, encode_flag};
use crate::transport::{basic_auth, ReqwestTransport, Transport};
use crate::types::{Event, Item, ItemRecommendation, RecommendationContext, User};

/// Engine method names as exposed on the wire.
pub mod methods {
    pub const ADD_EVENTS: &str = "addEvents";
    pub const ADD_ITEMS: &str = "addItems";
    pub const ADD_USERS: &str = "addUsers";
    pub const GET_ITEM_RECOMMENDATION: &str = "getItemRecommendation";
    pub const TEST: &str = "test";
    /// The engine really spells it with two n's.
    pub const TEST_EXCEPTION: &str = "testExceptionn";
}

/// Client for one recommendation engine endpoint.
pub struct RecEngClient<T = ReqwestTransport> {
    config: ClientConfig,
    base_url: String,
    transport: T,
}

impl RecEngClient<ReqwestTransport> {
    /// Validate `config` and create a client using the reqwest transport.
    ///
    /// Fails with `ClientError::Config` without touching the network.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::assemble(config, transport))
    }
}

impl<T: Transport> RecEngClient<T> {
    /// Validate `config` and create a client that runs requests on `transport`.
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, transport))
    }

    fn assemble(config: ClientConfig, transport: T) -> Self {
        let base_url = config.base_url().to_string();
        Self {
            config,
            base_url,
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // -----------------------------------------------------------------------
    // Request builders
    // -----------------------------------------------------------------------

    pub fn build_add_events(&self, events: &[Event], asynchronous: bool) -> Result<HttpRequest> {
        self.build_add(methods::ADD_EVENTS, events, asynchronous)
    }

    pub fn build_add_items(&self, items: &[Item], asynchronous: bool) -> Result<HttpRequest> {
        self.build_add(methods::ADD_ITEMS, items, asynchronous)
    }

    pub fn build_add_users(&self, users: &[User], asynchronous: bool) -> Result<HttpRequest> {
        self.build_add(methods::ADD_USERS, users, asynchronous)
    }

    fn build_add<B: serde::Serialize>(&self, method_name: &str, records: &[B], asynchronous: bool) -> Result<HttpRequest> {
        let body = encode_body(records)?;
        Ok(build_request(
            &self.base_url,
            method_name,
            &[("async", Some(encode_flag(asynchronous)))],
            Some(body),
        ))
    }

    pub fn build_get_item_recommendation(
        &self,
        user_id: Option<&str>,
        cookie_id: Option<&str>,
        context: &RecommendationContext,
    ) -> Result<HttpRequest> {
        let body = encode_body(context)?;
        Ok(build_request(
            &self.base_url,
            methods::GET_ITEM_RECOMMENDATION,
            &[("userId", user_id), ("cookieId", cookie_id)],
            Some(body),
        ))
    }

    pub fn build_test(&self, name: &str) -> Result<HttpRequest> {
        let body = encode_body(name)?;
        Ok(build_request(&self.base_url, methods::TEST, &[("name", Some(name))], Some(body)))
    }

    pub fn build_test_exception(&self) -> HttpRequest {
        build_request(&self.base_url, methods::TEST_EXCEPTION, &[], None)
    }

    // -----------------------------------------------------------------------
    // Response parsers
    // -----------------------------------------------------------------------

    /// Accept the reply of an `add*` call. The body is ignored.
    pub fn parse_acknowledgement(&self, response: HttpResponse) -> Result<()> {
        classify::check_status(&response)
    }

    pub fn parse_item_recommendation(&self, response: HttpResponse) -> Result<ItemRecommendation> {
        decode(response)
    }

    pub fn parse_test(&self, response: HttpResponse) -> Result<String> {
        decode(response)
    }

    // -----------------------------------------------------------------------
    // Blocking operations
    // -----------------------------------------------------------------------

    pub fn add_event(&self, event: &Event, asynchronous: bool) -> Result<()> {
        self.add_events(std::slice::from_ref(event), asynchronous)
    }

    /// Submit events. With `asynchronous` the engine may acknowledge before
    /// the events are durably stored; the call itself blocks either way.
    pub fn add_events(&self, events: &[Event], asynchronous: bool) -> Result<()> {
        let request = self.build_add_events(events, asynchronous)?;
        let response = self.invoke(request)?;
        self.parse_acknowledgement(response)
    }

    pub fn add_item(&self, item: &Item, asynchronous: bool) -> Result<()> {
        self.add_items(std::slice::from_ref(item), asynchronous)
    }

    pub fn add_items(&self, items: &[Item], asynchronous: bool) -> Result<()> {
        let request = self.build_add_items(items, asynchronous)?;
        let response = self.invoke(request)?;
        self.parse_acknowledgement(response)
    }

    pub fn add_user(&self, user: &User, asynchronous: bool) -> Result<()> {
        self.add_users(std::slice::from_ref(user), asynchronous)
    }

    pub fn add_users(&self, users: &[User], asynchronous: bool) -> Result<()> {
        let request = self.build_add_users(users, asynchronous)?;
        let response = self.invoke(request)?;
        self.parse_acknowledgement(response)
    }

    pub fn get_item_recommendation(
        &self,
        user_id: Option<&str>,
        cookie_id: Option<&str>,
        context: &RecommendationContext,
    ) -> Result<ItemRecommendation> {
        let request = self.build_get_item_recommendation(user_id, cookie_id, context)?;
        let response = self.invoke(request)?;
        self.parse_item_recommendation(response)
    }

    /// Connectivity check; the engine answers `"Hello " + name`.
    pub fn test(&self, name: &str) -> Result<String> {
        let request = self.build_test(name)?;
        let response = self.invoke(request)?;
        self.parse_test(response)
    }

    /// Ask the engine to fail on purpose. Useful to check error plumbing.
    pub fn test_exception(&self) -> Result<()> {
        let response = self.invoke(self.build_test_exception())?;
        self.parse_acknowledgement(response)
    }

    /// Attach credentials, run `request` exactly once and classify the outcome.
    ///
    /// Returns the response only for status 200.
    pub fn invoke(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        if let Some(user) = &self.config.user {
            request
                .headers
                .push(("authorization".to_string(), basic_auth(user, self.config.password.as_deref())));
        }

        let outcome = self.transport.execute(&request);
        match classify::classify(outcome) {
            Ok(response) => {
                debug!(url = %request.url, status = response.status, "call succeeded");
                Ok(response)
            }
            Err(err) => {
                match err.rec_eng_exception() {
                    Some(fault) => warn!(
                        url = %request.url,
                        code = %fault.rec_eng_error_code,
                        message = %fault.message,
                        "engine rejected call"
                    ),
                    None => warn!(url = %request.url, error = %err, "call failed"),
                }
                Err(err)
            }
        }
    }
}

/// Check the status, then decode the body as `R`.
fn decode<R: DeserializeOwned>(response: HttpResponse) -> Result<R> {
    classify::check_status(&response)?;
    serde_json::from_slice(&response.body).map_err(|e| ClientError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::ErrorKind;
    use crate::http::{FailureReason, HttpMethod, TransportFailure};
    use crate::types::Identifier;

    /// Records every request and replays a canned outcome.
    struct StubTransport {
        outcome: std::result::Result<HttpResponse, TransportFailure>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl StubTransport {
        fn replying(status: u16, body: &str) -> Self {
            Self {
                outcome: Ok(HttpResponse::new(status, body)),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(reason: FailureReason) -> Self {
            Self {
                outcome: Err(TransportFailure::new(reason, "stub failure")),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Transport for StubTransport {
        fn execute(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportFailure> {
            self.seen.lock().unwrap().push(request.clone());
            self.outcome.clone()
        }
    }

    fn client(transport: StubTransport) -> RecEngClient<StubTransport> {
        RecEngClient::with_transport(ClientConfig::new("http://engine.local/receng/"), transport).unwrap()
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse::new(status, body)
    }

    #[test]
    fn invalid_config_fails_before_any_call() {
        let err = RecEngClient::new(ClientConfig::new("http://x").with_timeout_seconds(0)).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = RecEngClient::with_transport(ClientConfig::new(""), StubTransport::replying(200, "")).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn add_events_posts_once_with_async_flag() {
        let c = client(StubTransport::replying(200, ""));
        let events = vec![
            Event::at("VIEW", 100).with_item_id("1").with_cookie_id("c1"),
            Event::at("BUY", 101).with_item_id("2").with_cookie_id("c1"),
        ];
        c.add_events(&events, true).unwrap();

        let requests = c.transport().requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://engine.local/receng/addEvents?method=addEvents&async=1");
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[1]["eventType"], "BUY");
    }

    #[test]
    fn single_record_helpers_send_one_element_arrays() {
        let c = client(StubTransport::replying(200, ""));
        c.add_event(&Event::at("VIEW", 1), false).unwrap();
        c.add_item(&Item::new("i1"), false).unwrap();
        c.add_user(&User::new("u1"), false).unwrap();

        let requests = c.transport().requests();
        let urls: Vec<&str> = requests.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "http://engine.local/receng/addEvents?method=addEvents&async=0",
                "http://engine.local/receng/addItems?method=addItems&async=0",
                "http://engine.local/receng/addUsers?method=addUsers&async=0",
            ]
        );
        for req in &requests {
            let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
            assert_eq!(body.as_array().unwrap().len(), 1);
        }
    }

    #[test]
    fn get_item_recommendation_round_trip() {
        let c = client(StubTransport::replying(200, r#"{"itemIds":[1,2,3],"recommendationId":"r1"}"#));
        let ctx = RecommendationContext::new("HOMEPAGE_MAIN").with_number_limit(5);
        let rec = c.get_item_recommendation(Some("u1"), Some("c1"), &ctx).unwrap();

        assert_eq!(rec.item_ids, vec![Identifier::from(1), Identifier::from(2), Identifier::from(3)]);
        assert_eq!(rec.recommendation_id, "r1");
        assert!(rec.items.is_none());

        let req = &c.transport().requests()[0];
        assert_eq!(
            req.url,
            "http://engine.local/receng/getItemRecommendation?method=getItemRecommendation&userId=u1&cookieId=c1"
        );
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["numberLimit"], 5);
        assert_eq!(body["scenarioId"], "HOMEPAGE_MAIN");
    }

    #[test]
    fn missing_user_id_is_left_out_of_query() {
        let c = client(StubTransport::replying(200, ""));
        let req = c
            .build_get_item_recommendation(None, Some("c1"), &RecommendationContext::new("S"))
            .unwrap();
        assert!(req.url.ends_with("?method=getItemRecommendation&cookieId=c1"));
    }

    #[test]
    fn test_decodes_echo() {
        let c = client(StubTransport::replying(200, "\"Hello Alice\""));
        assert_eq!(c.test("Alice").unwrap(), "Hello Alice");

        let req = &c.transport().requests()[0];
        assert_eq!(req.url, "http://engine.local/receng/test?method=test&name=Alice");
        assert_eq!(req.body.as_deref(), Some("\"Alice\""));
    }

    #[test]
    fn test_exception_is_bodyless_and_surfaces_fault() {
        let c = client(StubTransport::replying(
            500,
            r#"{"message":"test exception","recEngErrorCode":"ERR_INTERNAL_ERROR"}"#,
        ));
        let err = c.test_exception().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Http);
        assert_eq!(err.rec_eng_exception().unwrap().rec_eng_error_code, "ERR_INTERNAL_ERROR");

        let req = &c.transport().requests()[0];
        assert_eq!(req.url, "http://engine.local/receng/testExceptionn?method=testExceptionn");
        assert!(req.body.is_none());
    }

    #[test]
    fn credentials_add_basic_auth_header() {
        let config = ClientConfig::new("http://engine.local").with_credentials("admin", "secret");
        let c = RecEngClient::with_transport(config, StubTransport::replying(200, "\"Hello x\"")).unwrap();
        c.test("x").unwrap();
        let req = &c.transport().requests()[0];
        assert_eq!(req.header("Authorization"), Some("Basic YWRtaW46c2VjcmV0"));
    }

    #[test]
    fn no_credentials_means_no_auth_header() {
        let c = client(StubTransport::replying(200, "\"Hello x\""));
        c.test("x").unwrap();
        assert!(c.transport().requests()[0].header("authorization").is_none());
    }

    #[test]
    fn transport_failures_are_not_retried() {
        let c = client(StubTransport::failing(FailureReason::Timeout));
        let err = c.add_items(&[Item::new("1")], false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(c.transport().requests().len(), 1);
    }

    #[test]
    fn padded_remote_url_is_trimmed_once() {
        let config = ClientConfig::new("  https://engine.local/receng/ ");
        let c = RecEngClient::with_transport(config, StubTransport::replying(200, "\"Hello x\"")).unwrap();
        assert!(c.config().is_secure());
        c.test("x").unwrap();
        assert_eq!(c.transport().requests()[0].url, "https://engine.local/receng/test?method=test&name=x");
    }

    #[test]
    fn binary_success_body_is_a_decode_error() {
        let c = client(StubTransport {
            outcome: Ok(HttpResponse::new(200, vec![0xff, 0xfe, 0x00, 0x41])),
            seen: Mutex::new(Vec::new()),
        });
        let err = c.test("x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn bad_success_body_is_a_decode_error() {
        let c = client(StubTransport::replying(200, "not json"));
        let err = c.test("x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn parse_methods_classify_status_for_host_driven_io() {
        let c = client(StubTransport::replying(200, ""));
        let err = c.parse_item_recommendation(response(404, "")).unwrap_err();
        assert!(matches!(err, ClientError::Http { status: 404, fault: None }));
        assert!(c.parse_acknowledgement(response(200, "ignored")).is_ok());
    }

    #[test]
    fn client_is_shareable_across_threads() {
        fn assert_send_sync<S: Send + Sync>() {}
        assert_send_sync::<RecEngClient>();
    }
}
