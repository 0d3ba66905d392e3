//! Normalization of the MFDS food nutrient database search responses.
//!
//! The API answers in two JSON shapes: `{header, body}` at the top level, or
//! the same wrapped in `{response: {...}}`. `body.items` may be an array, an
//! object holding `item` (array or single object), or a single object. Item
//! field names differ between the two shapes too, so each target field is
//! resolved through an ordered alias list.
//!
//! An unregistered service key makes the gateway reply with a plain-text
//! (XML-ish) body instead of JSON.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{NutrientRecord, coerce_number};

pub const DEFAULT_BASE_URL: &str =
    "https://apis.data.go.kr/1471000/FoodNtrCpntDbInfo02/getFoodNtrCpntDbInq02";

const SERVICE_KEY_NOT_REGISTERED: &str = "SERVICE KEY IS NOT REGISTERED";
const RESULT_CODE_OK: &str = "00";

pub const ID_FIELDS: &[&str] = &["FOOD_CD", "foodCd"];
pub const NAME_FIELDS: &[&str] = &["FOOD_NM_KR", "foodNm"];
pub const MAKER_FIELDS: &[&str] = &["MAKER_NM", "mkrNm"];
pub const SERVING_FIELDS: &[&str] = &["SERVING_SIZE"];
pub const CALORIE_FIELDS: &[&str] = &["AMT_NUM1", "enerc"];
pub const PROTEIN_FIELDS: &[&str] = &["AMT_NUM3", "prot"];
pub const FAT_FIELDS: &[&str] = &["AMT_NUM4", "fatce"];
pub const CARB_FIELDS: &[&str] = &["AMT_NUM6", "chocdf"];

/// Which column an external query filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchField {
    Name,
    Maker,
}

impl SearchField {
    /// Query-string parameter the API expects for this filter.
    #[must_use]
    pub fn param(self) -> &'static str {
        match self {
            SearchField::Name => "FOOD_NM_KR",
            SearchField::Maker => "MAKER_NM",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExternalError {
    #[error("nutrition database unreachable: {0}")]
    Network(String),
    #[error("no service key configured for the nutrition database")]
    MissingServiceKey,
    #[error("nutrition database rejected the service key")]
    InvalidServiceKey,
    #[error("nutrition database returned result code {0}")]
    ResultCode(String),
    #[error("malformed nutrition database response: {0}")]
    Malformed(String),
}

/// One normalized item from an external page.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalFood {
    pub id: Option<String>,
    pub record: NutrientRecord,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExternalPage {
    pub items: Vec<ExternalFood>,
    pub total_count: u64,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    header: Option<Header>,
    body: Option<Body>,
    response: Option<Box<Envelope>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Header {
    result_code: Option<Value>,
    result_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Body {
    items: Option<Value>,
    total_count: Option<Value>,
}

/// Parse a raw response body into a normalized page.
#[allow(clippy::cast_sign_loss)]
pub fn parse_search_body(body: &str) -> Result<ExternalPage, ExternalError> {
    if body.contains(SERVICE_KEY_NOT_REGISTERED) {
        return Err(ExternalError::InvalidServiceKey);
    }
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| ExternalError::Malformed(e.to_string()))?;
    let (header, body) = match envelope {
        Envelope {
            header: Some(header),
            body,
            ..
        } => (header, body),
        Envelope {
            response: Some(inner),
            ..
        } => match *inner {
            Envelope {
                header: Some(header),
                body,
                ..
            } => (header, body),
            _ => return Err(ExternalError::Malformed("missing response header".into())),
        },
        _ => return Err(ExternalError::Malformed("missing response header".into())),
    };

    let code = header
        .result_code
        .as_ref()
        .map(value_to_string)
        .unwrap_or_default();
    if code != RESULT_CODE_OK {
        let msg = header.result_msg.unwrap_or_default();
        tracing::debug!(code = %code, msg = %msg, "nutrition database returned non-OK result");
        return Err(ExternalError::ResultCode(code));
    }

    let Some(body) = body else {
        return Ok(ExternalPage::default());
    };

    let total_count = coerce_number(body.total_count.as_ref()) as u64;
    let items = body
        .items
        .map(flatten_items)
        .unwrap_or_default()
        .iter()
        .filter_map(normalize_item)
        .collect();

    Ok(ExternalPage { items, total_count })
}

fn flatten_items(items: Value) -> Vec<Value> {
    match items {
        Value::Array(list) => list,
        Value::Object(mut map) => match map.remove("item") {
            Some(Value::Array(list)) => list,
            Some(single @ Value::Object(_)) => vec![single],
            Some(_) => Vec::new(),
            None if map.is_empty() => Vec::new(),
            None => vec![Value::Object(map)],
        },
        _ => Vec::new(),
    }
}

/// First alias holding a non-null, non-empty value.
fn first_present<'a>(item: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|key| item.get(*key))
        .find(|v| match v {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
}

fn first_text(item: &Value, aliases: &[&str]) -> Option<String> {
    first_present(item, aliases).map(value_to_string)
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Normalize one raw item. Items without a name are dropped.
#[must_use]
pub fn normalize_item(item: &Value) -> Option<ExternalFood> {
    let name = first_text(item, NAME_FIELDS)?;
    let record = NutrientRecord {
        name,
        calories: coerce_number(first_present(item, CALORIE_FIELDS)),
        carbs: coerce_number(first_present(item, CARB_FIELDS)),
        protein: coerce_number(first_present(item, PROTEIN_FIELDS)),
        fat: coerce_number(first_present(item, FAT_FIELDS)),
        serving_size: first_text(item, SERVING_FIELDS),
        source_label: first_text(item, MAKER_FIELDS).unwrap_or_default(),
    };
    Some(ExternalFood {
        id: first_text(item, ID_FIELDS),
        record,
    })
}
