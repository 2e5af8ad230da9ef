use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NameValue {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_type: String,
    pub item_id: Option<String>,
    pub recommendation_id: Option<String>,
    pub time: i64,
    pub user_id: Option<String>,
    pub cookie_id: Option<String>,
    #[serde(default)]
    pub name_values: Vec<NameValue>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub item_id: String,
    pub title: Option<String>,
    pub item_type: Option<String>,
    pub hidden: Option<bool>,
    #[serde(default)]
    pub from_date: i64,
    #[serde(default = "default_to_date")]
    pub to_date: i64,
    #[serde(default)]
    pub name_values: Vec<NameValue>,
}

fn default_to_date() -> i64 {
    2_147_483_647
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    #[serde(default)]
    pub name_values: Vec<NameValue>,
    pub hidden: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationContext {
    #[serde(default)]
    pub number_limit: usize,
    pub scenario_id: String,
}

/// Number of ids returned when a context leaves `numberLimit` at 0.
pub const DEFAULT_NUMBER_LIMIT: usize = 10;

/// Everything the stub engine has been sent.
#[derive(Debug, Default)]
pub struct Engine {
    pub events: Vec<Event>,
    pub items: Vec<Item>,
    pub users: Vec<User>,
    /// `async` flag of every `add*` call, in arrival order.
    pub async_flags: Vec<String>,
    /// Required basic-auth credentials, if any.
    pub credentials: Option<(String, String)>,
}

impl Engine {
    pub fn with_credentials(user: &str, password: &str) -> Self {
        Self {
            credentials: Some((user.to_string(), password.to_string())),
            ..Self::default()
        }
    }
}

pub type SharedEngine = Arc<RwLock<Engine>>;

/// An engine-style error reply: status plus `{message, recEngErrorCode}`.
#[derive(Debug)]
pub struct Fault {
    status: StatusCode,
    message: String,
    code: &'static str,
}

impl Fault {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code,
        }
    }

    fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }
}

impl IntoResponse for Fault {
    fn into_response(self) -> Response {
        tracing::warn!(status = %self.status, code = self.code, message = %self.message, "rejecting call");
        let body = json!({ "message": self.message, "recEngErrorCode": self.code });
        (self.status, Json(body)).into_response()
    }
}

type Params = Query<HashMap<String, String>>;

pub fn app() -> Router {
    app_with(Arc::new(RwLock::new(Engine::default())))
}

pub fn app_with(engine: SharedEngine) -> Router {
    Router::new()
        .route("/addEvents", post(add_events))
        .route("/addItems", post(add_items))
        .route("/addUsers", post(add_users))
        .route("/getItemRecommendation", post(get_item_recommendation))
        .route("/test", post(test))
        .route("/testExceptionn", post(test_exception).get(test_exception))
        .with_state(engine)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, engine: SharedEngine) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(engine)).await
}

/// The `method` query parameter must repeat the path segment.
fn check_method(params: &HashMap<String, String>, expected: &str) -> Result<(), Fault> {
    match params.get("method") {
        Some(method) if method == expected => Ok(()),
        other => Err(Fault::bad_request(
            "ERR_INVALID_METHOD",
            format!("method parameter {other:?} does not match {expected}"),
        )),
    }
}

fn check_auth(engine: &Engine, headers: &HeaderMap) -> Result<(), Fault> {
    let Some((user, password)) = &engine.credentials else {
        return Ok(());
    };
    let expected = format!("Basic {}", STANDARD.encode(format!("{user}:{password}")));
    let given = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    if given == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(Fault::new(StatusCode::UNAUTHORIZED, "ERR_UNAUTHORIZED", "bad credentials"))
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, Fault> {
    serde_json::from_str(body).map_err(|e| Fault::bad_request("ERR_INVALID_JSON", e.to_string()))
}

async fn add_events(
    State(engine): State<SharedEngine>,
    Query(params): Params,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, Fault> {
    check_method(&params, "addEvents")?;
    let mut engine = engine.write().await;
    check_auth(&engine, &headers)?;
    let events: Vec<Event> = parse_body(&body)?;
    if let Some(event) = events.iter().find(|e| e.cookie_id.is_none()) {
        return Err(Fault::bad_request(
            "ERR_COOKIEID_MISSING",
            format!("event {} has no cookieId", event.event_type),
        ));
    }
    tracing::info!(count = events.len(), "stored events");
    engine.async_flags.push(params.get("async").cloned().unwrap_or_default());
    engine.events.extend(events);
    Ok(StatusCode::OK)
}

async fn add_items(
    State(engine): State<SharedEngine>,
    Query(params): Params,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, Fault> {
    check_method(&params, "addItems")?;
    let mut engine = engine.write().await;
    check_auth(&engine, &headers)?;
    let items: Vec<Item> = parse_body(&body)?;
    if let Some(item) = items.iter().find(|i| i.from_date > i.to_date) {
        return Err(Fault::bad_request(
            "ERR_ITEMID_INVALID_FROMTODATE",
            format!("item {} has fromDate after toDate", item.item_id),
        ));
    }
    tracing::info!(count = items.len(), "stored items");
    engine.async_flags.push(params.get("async").cloned().unwrap_or_default());
    for item in items {
        engine.items.retain(|existing| existing.item_id != item.item_id);
        engine.items.push(item);
    }
    Ok(StatusCode::OK)
}

async fn add_users(
    State(engine): State<SharedEngine>,
    Query(params): Params,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, Fault> {
    check_method(&params, "addUsers")?;
    let mut engine = engine.write().await;
    check_auth(&engine, &headers)?;
    let users: Vec<User> = parse_body(&body)?;
    tracing::info!(count = users.len(), "stored users");
    engine.async_flags.push(params.get("async").cloned().unwrap_or_default());
    engine.users.extend(users);
    Ok(StatusCode::OK)
}

async fn get_item_recommendation(
    State(engine): State<SharedEngine>,
    Query(params): Params,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, Fault> {
    check_method(&params, "getItemRecommendation")?;
    let engine = engine.read().await;
    check_auth(&engine, &headers)?;
    let context: RecommendationContext = parse_body(&body)?;
    if context.scenario_id.is_empty() {
        return Err(Fault::bad_request("ERR_SCENARIO_NOT_FOUND", "scenarioId is empty"));
    }
    let limit = match context.number_limit {
        0 => DEFAULT_NUMBER_LIMIT,
        n => n,
    };
    let item_ids: Vec<&str> = engine
        .items
        .iter()
        .filter(|i| i.hidden != Some(true))
        .take(limit)
        .map(|i| i.item_id.as_str())
        .collect();
    tracing::info!(scenario = %context.scenario_id, count = item_ids.len(), "recommending");
    Ok(Json(json!({
        "itemIds": item_ids,
        "recommendationId": Uuid::new_v4().to_string(),
    })))
}

async fn test(
    State(engine): State<SharedEngine>,
    Query(params): Params,
    headers: HeaderMap,
    body: String,
) -> Result<Json<String>, Fault> {
    check_method(&params, "test")?;
    check_auth(&*engine.read().await, &headers)?;
    let name: String = parse_body(&body)?;
    Ok(Json(format!("Hello {name}")))
}

async fn test_exception(Query(params): Params) -> Result<StatusCode, Fault> {
    check_method(&params, "testExceptionn")?;
    Err(Fault::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "ERR_INTERNAL_ERROR",
        "Test exception",
    ))
}
