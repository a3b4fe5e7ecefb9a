//! Field values.
//!
//! A [`Value`] is what an entity field holds: a primitive, a list, or a
//! handle to a nested entity or collection. Primitives and lists compare by
//! value; nested handles compare by identity, so replacing a nested
//! collection with another one holding the same members still counts as a
//! change.

use std::fmt;

use serde_json::Value as JsonValue;

use super::entity::Entity;
use crate::reactive::Collection;

/// The value of a single entity field.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Entity(Entity),
    Collection(Collection),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            Value::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Value::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// Render the value the way it is shown to (and searched by) users.
    ///
    /// Integral numbers drop their fractional part, lists join their items
    /// with commas. Null and nested handles have no text form.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null | Value::Entity(_) | Value::Collection(_) => None,
            Value::Bool(flag) => Some(flag.to_string()),
            Value::Number(number) => Some(format_number(*number)),
            Value::Text(text) => Some(text.clone()),
            Value::List(items) => Some(
                items
                    .iter()
                    .map(|item| item.to_text().unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
        }
    }

    /// Convert decoded JSON into a field value.
    ///
    /// Objects become nested entities. Arrays whose items are all objects,
    /// including the empty array, become nested collections; any other array
    /// becomes a list.
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(flag) => Value::Bool(flag),
            JsonValue::Number(number) => number.as_f64().map_or(Value::Null, Value::Number),
            JsonValue::String(text) => Value::Text(text),
            JsonValue::Array(items) if items.iter().all(JsonValue::is_object) => {
                Value::Collection(Collection::with_entities(
                    items.into_iter().filter_map(Entity::from_json),
                ))
            }
            JsonValue::Array(items) => Value::List(items.into_iter().map(Value::from_json).collect()),
            JsonValue::Object(_) => Entity::from_json(json).map_or(Value::Null, Value::Entity),
        }
    }

    /// Encode the value as JSON.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(flag) => JsonValue::Bool(*flag),
            Value::Number(number) => number_to_json(*number),
            Value::Text(text) => JsonValue::String(text.clone()),
            Value::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Entity(entity) => entity.to_json(),
            Value::Collection(collection) => collection.to_json(),
        }
    }
}

fn is_integral(number: f64) -> bool {
    number.fract() == 0.0 && number.abs() < 9.0e15
}

fn format_number(number: f64) -> String {
    if is_integral(number) {
        format!("{}", number as i64)
    } else {
        format!("{}", number)
    }
}

fn number_to_json(number: f64) -> JsonValue {
    if is_integral(number) {
        JsonValue::from(number as i64)
    } else {
        serde_json::Number::from_f64(number).map_or(JsonValue::Null, JsonValue::Number)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Entity(a), Value::Entity(b)) => a.ptr_eq(b),
            (Value::Collection(a), Value::Collection(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(flag) => write!(f, "Bool({flag})"),
            Value::Number(number) => write!(f, "Number({number})"),
            Value::Text(text) => write!(f, "Text({text:?})"),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Entity(entity) => write!(f, "Entity({})", entity.client_id()),
            Value::Collection(collection) => write!(f, "Collection(len={})", collection.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Bool(flag)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Number(number)
    }
}

impl From<i64> for Value {
    fn from(number: i64) -> Self {
        Value::Number(number as f64)
    }
}

impl From<i32> for Value {
    fn from(number: i32) -> Self {
        Value::Number(f64::from(number))
    }
}

impl From<u64> for Value {
    fn from(number: u64) -> Self {
        Value::Number(number as f64)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_owned())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Entity> for Value {
    fn from(entity: Entity) -> Self {
        Value::Entity(entity)
    }
}

impl From<Collection> for Value {
    fn from(collection: Collection) -> Self {
        Value::Collection(collection)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
