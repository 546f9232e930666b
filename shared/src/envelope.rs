//! Canonicalises the list shapes the API returns.
//!
//! Accepted forms, in lookup order:
//! - a bare array
//! - an object with the endpoint's named key (`{"groups": [...]}`)
//! - an object with a generic key (`results`, `data`, `items`)
//! - any of the above one level down (`{"data": {"results": [...]}}`)
//!
//! `null` decodes to an empty page. Items that fail to decode are skipped
//! and counted rather than failing the whole page.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::AppError;

pub const GENERIC_LIST_KEYS: [&str; 3] = ["results", "data", "items"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub count: Option<u64>,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub skipped: usize,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: None,
            next: None,
            previous: None,
            skipped: 0,
        }
    }
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The raw list plus whatever pagination metadata sat next to it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawList {
    pub items: Vec<Value>,
    pub count: Option<u64>,
    pub next: Option<String>,
    pub previous: Option<String>,
}

pub fn normalize_list(payload: Value, named_key: Option<&str>) -> Result<RawList, AppError> {
    match payload {
        Value::Null => Ok(RawList::default()),
        Value::Array(items) => Ok(RawList {
            items,
            ..RawList::default()
        }),
        Value::Object(map) => from_object(map, named_key, true),
        other => Err(AppError::decode(format!(
            "expected a list payload, got {}",
            kind_of(&other)
        ))),
    }
}

fn from_object(
    mut map: Map<String, Value>,
    named_key: Option<&str>,
    allow_nested: bool,
) -> Result<RawList, AppError> {
    let count = map.get("count").and_then(Value::as_u64);
    let next = map.get("next").and_then(Value::as_str).map(str::to_string);
    let previous = map
        .get("previous")
        .and_then(Value::as_str)
        .map(str::to_string);

    let keys = named_key.into_iter().chain(GENERIC_LIST_KEYS);
    for key in keys {
        match map.remove(key) {
            Some(Value::Array(items)) => {
                return Ok(RawList {
                    items,
                    count,
                    next,
                    previous,
                })
            }
            Some(Value::Null) => {
                return Ok(RawList {
                    count,
                    next,
                    previous,
                    ..RawList::default()
                })
            }
            Some(Value::Object(inner)) if allow_nested => {
                let mut nested = from_object(inner, named_key, false)?;
                nested.count = nested.count.or(count);
                nested.next = nested.next.or(next);
                nested.previous = nested.previous.or(previous);
                return Ok(nested);
            }
            Some(_) | None => {}
        }
    }

    Err(AppError::decode(match named_key {
        Some(key) => format!("no '{key}' or generic list key in response"),
        None => "no list key in response".to_string(),
    }))
}

pub fn decode_page<T: DeserializeOwned>(
    payload: Value,
    named_key: Option<&str>,
) -> Result<Page<T>, AppError> {
    let raw = normalize_list(payload, named_key)?;
    let mut items = Vec::with_capacity(raw.items.len());
    let mut skipped = 0;

    for (index, item) in raw.items.into_iter().enumerate() {
        match serde_json::from_value::<T>(item) {
            Ok(decoded) => items.push(decoded),
            Err(e) => {
                skipped += 1;
                warn!(
                    index,
                    list = named_key.unwrap_or("results"),
                    error = %e,
                    "skipping malformed list item"
                );
            }
        }
    }

    Ok(Page {
        items,
        count: raw.count,
        next: raw.next,
        previous: raw.previous,
        skipped,
    })
}

pub fn decode_list<T: DeserializeOwned>(
    payload: Value,
    named_key: Option<&str>,
) -> Result<Vec<T>, AppError> {
    decode_page(payload, named_key).map(|page| page.items)
}

/// Decodes a single object, unwrapping `{"<named_key>": {...}}` or
/// `{"data": {...}}` when the server wraps it.
pub fn decode_item<T: DeserializeOwned>(
    payload: Value,
    named_key: Option<&str>,
) -> Result<T, AppError> {
    let payload = match payload {
        Value::Object(mut map) => {
            let wrapped = named_key
                .into_iter()
                .chain(["data"])
                .find(|key| matches!(map.get(*key), Some(Value::Object(_))));
            match wrapped.and_then(|key| map.remove(key)) {
                Some(inner) => inner,
                None => Value::Object(map),
            }
        }
        other => other,
    };

    serde_json::from_value(payload).map_err(|e| AppError::decode(format!("unexpected response shape: {e}")))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
