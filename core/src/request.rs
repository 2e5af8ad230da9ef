//! Wire request construction.
//!
//! Every engine call targets `{base}/{method}?method={method}[&k=v...]`. The
//! `method` query parameter repeats the path segment and always comes first;
//! the engine's router depends on it.

use serde::Serialize;
use url::form_urlencoded;

use crate::error::ClientError;
use crate::http::{HttpMethod, HttpRequest};

pub const CLIENT_VERSION_HEADER: &str = "X-RecEng-Client-Version";
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Encode a request body as JSON.
pub fn encode_body<B: Serialize + ?Sized>(body: &B) -> Result<String, ClientError> {
    serde_json::to_string(body).map_err(|e| ClientError::Serialization(e.to_string()))
}

/// Build the query string. Parameters whose value is `None` are left out.
pub fn query_string(method_name: &str, params: &[(&str, Option<&str>)]) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("method", method_name);
    for (key, value) in params {
        if let Some(value) = value {
            query.append_pair(key, value);
        }
    }
    query.finish()
}

/// Describe a call to `method_name`.
///
/// A present `body` makes the call a JSON POST; otherwise nothing is sent and
/// the engine treats the call as read-only.
pub fn build_request(
    base_url: &str,
    method_name: &str,
    params: &[(&str, Option<&str>)],
    body: Option<String>,
) -> HttpRequest {
    let url = format!(
        "{}/{method_name}?{}",
        base_url.trim_end_matches('/'),
        query_string(method_name, params)
    );
    let mut headers = vec![(CLIENT_VERSION_HEADER.to_string(), CLIENT_VERSION.to_string())];
    let method = match body {
        Some(_) => {
            headers.push(("content-type".to_string(), "application/json".to_string()));
            HttpMethod::Post
        }
        None => HttpMethod::Get,
    };
    HttpRequest {
        method,
        url,
        headers,
        body,
    }
}

/// Wire encoding of the engine's `async` durability flag.
pub fn encode_flag(flag: bool) -> &'static str {
    if flag {
        "1"
    } else {
        "0"
    }
}
