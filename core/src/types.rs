//! Domain DTOs exchanged with the recommendation engine.
//!
//! # Design
//! Field names follow the engine's camelCase JSON schema. Optional fields
//! are omitted from the wire when unset, and every `name_values` sequence
//! is serialized in insertion order: the engine relies on the relative order
//! of values sharing one name.
//!
//! The mock engine defines its own copies of these shapes; integration
//! tests catch schema drift between the two crates.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};

/// Default upper bound of an item's validity window (`i32::MAX`).
pub const DEFAULT_TO_DATE: i64 = 2_147_483_647;

/// A repeatable name/value annotation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NameValue {
    pub name: String,
    pub value: String,
}

impl NameValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A behavioral event (view, purchase, click, ...).
///
/// `event_type` is engine-defined and passed through unchecked. The engine
/// may reject events without a `cookie_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation_id: Option<String>,
    /// Unix seconds.
    pub time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_id: Option<String>,
    #[serde(default)]
    pub name_values: Vec<NameValue>,
}

impl Event {
    /// Create an event stamped with `clock.now()`.
    pub fn new(event_type: impl Into<String>, clock: &dyn Clock) -> Self {
        Self::at(event_type, clock.now())
    }

    /// Create an event stamped with the system clock.
    pub fn now(event_type: impl Into<String>) -> Self {
        Self::new(event_type, &SystemClock)
    }

    pub fn at(event_type: impl Into<String>, time: i64) -> Self {
        Self {
            event_type: event_type.into(),
            item_id: None,
            recommendation_id: None,
            time,
            user_id: None,
            cookie_id: None,
            name_values: Vec::new(),
        }
    }

    pub fn with_item_id(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    pub fn with_recommendation_id(mut self, recommendation_id: impl Into<String>) -> Self {
        self.recommendation_id = Some(recommendation_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_cookie_id(mut self, cookie_id: impl Into<String>) -> Self {
        self.cookie_id = Some(cookie_id.into());
        self
    }

    pub fn with_name_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.name_values.push(NameValue::new(name, value));
        self
    }
}

/// A catalog item.
///
/// `from_date <= to_date` is checked by the engine, not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default)]
    pub from_date: i64,
    #[serde(default = "default_to_date")]
    pub to_date: i64,
    #[serde(default)]
    pub name_values: Vec<NameValue>,
}

fn default_to_date() -> i64 {
    DEFAULT_TO_DATE
}

impl Item {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            title: None,
            item_type: None,
            hidden: None,
            from_date: 0,
            to_date: DEFAULT_TO_DATE,
            name_values: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_item_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = Some(item_type.into());
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = Some(hidden);
        self
    }

    pub fn with_validity(mut self, from_date: i64, to_date: i64) -> Self {
        self.from_date = from_date;
        self.to_date = to_date;
        self
    }

    pub fn with_name_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.name_values.push(NameValue::new(name, value));
        self
    }
}

/// A user record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    #[serde(default)]
    pub name_values: Vec<NameValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
}

impl User {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name_values: Vec::new(),
            hidden: None,
        }
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = Some(hidden);
        self
    }

    pub fn with_name_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.name_values.push(NameValue::new(name, value));
        self
    }
}

/// Parameters of a recommendation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation_time: Option<i64>,
    /// 0 lets the scenario decide.
    #[serde(default)]
    pub number_limit: u32,
    pub scenario_id: String,
    #[serde(default)]
    pub name_values: Vec<NameValue>,
    /// `None` returns the scenario's default result attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_name_values: Option<Vec<NameValue>>,
}

impl RecommendationContext {
    pub fn new(scenario_id: impl Into<String>) -> Self {
        Self {
            recommendation_time: None,
            number_limit: 0,
            scenario_id: scenario_id.into(),
            name_values: Vec::new(),
            result_name_values: None,
        }
    }

    pub fn with_number_limit(mut self, number_limit: u32) -> Self {
        self.number_limit = number_limit;
        self
    }

    pub fn with_recommendation_time(mut self, time: i64) -> Self {
        self.recommendation_time = Some(time);
        self
    }

    pub fn with_name_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.name_values.push(NameValue::new(name, value));
        self
    }

    pub fn with_result_name_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.result_name_values
            .get_or_insert_with(Vec::new)
            .push(NameValue::new(name, value));
        self
    }
}

/// An item identifier as returned by the engine, which emits either JSON
/// numbers or strings depending on the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum Identifier {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Number(n) => write!(f, "{n}"),
            Identifier::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Identifier {
    fn from(n: i64) -> Self {
        Identifier::Number(n.into())
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Identifier::Text(s.to_string())
    }
}

/// Decoded reply of `getItemRecommendation`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecommendation {
    #[serde(default)]
    pub items: Option<Vec<Item>>,
    #[serde(default)]
    pub item_ids: Vec<Identifier>,
    pub recommendation_id: String,
}

/// Business-validation fault reported by the engine in an error body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecEngException {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub rec_eng_error_code: String,
}
