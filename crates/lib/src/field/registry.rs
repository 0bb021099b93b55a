//! Type registry for reconstructing fields from their tagged JSON form.
//!
//! Composite field types are serialized as tagged objects: a `"__type"`
//! member naming the registered type plus type-specific members. Primitives
//! are stored as plain JSON scalars.
//!
//! ```text
//! {"__type": "list",  "fields": [ ... ]}
//! {"__type": "proxy", "fieldId": "<doc id>"}
//! {"__type": "date",  "date": "2024-01-01T00:00:00.000Z"}
//! ```
//!
//! A [`FieldRegistry`] maps each type name to a decoder. Decoders produce
//! unowned fields; the container that receives them re-attaches ownership and
//! update wiring on insertion.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value as JsonValue};

use super::{FieldError, List, ProxyField, Slot, Value};
use crate::store::Store;

/// Member naming the concrete type of a tagged object.
pub const TYPE_TAG: &str = "__type";

/// Trait for types that can be registered in a [`FieldRegistry`].
///
/// ```
/// use docbranch::field::Registered;
///
/// struct Marker;
///
/// impl Registered for Marker {
///     fn type_id() -> &'static str {
///         "marker"
///     }
/// }
///
/// assert_eq!(Marker::type_id(), "marker");
/// assert!(Marker::supports_type_id("marker"));
/// assert!(!Marker::supports_type_id("list"));
/// ```
pub trait Registered {
    /// Returns the unique type name written under `"__type"`.
    fn type_id() -> &'static str;

    /// Check if this type can decode data tagged with `type_id`.
    ///
    /// Override to accept legacy names.
    fn supports_type_id(type_id: &str) -> bool {
        Self::type_id() == type_id
    }
}

/// Decodes the members of a tagged object into a slot.
pub type Decoder =
    fn(&Map<String, JsonValue>, &FieldRegistry, &Store) -> Result<Slot, FieldError>;

struct Entry {
    supports: fn(&str) -> bool,
    decode: Decoder,
}

/// Registry of tagged field types.
pub struct FieldRegistry {
    entries: HashMap<&'static str, Entry>,
}

impl FieldRegistry {
    /// An empty registry. Most callers want [`FieldRegistry::with_builtin`].
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// A registry with the built-in `list`, `proxy` and `date` types.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register::<List>(decode_list);
        registry.register::<ProxyField>(decode_proxy);
        registry.register_named("date", |name| name == "date", decode_date);
        registry
    }

    /// Registers `T` under its [`Registered::type_id`].
    pub fn register<T: Registered>(&mut self, decode: Decoder) {
        self.register_named(T::type_id(), T::supports_type_id, decode);
    }

    /// Registers a decoder under an explicit name.
    pub fn register_named(
        &mut self,
        name: &'static str,
        supports: fn(&str) -> bool,
        decode: Decoder,
    ) {
        self.entries.insert(name, Entry { supports, decode });
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.lookup(type_name).is_some()
    }

    fn lookup(&self, type_name: &str) -> Option<&Entry> {
        self.entries
            .get(type_name)
            .or_else(|| self.entries.values().find(|e| (e.supports)(type_name)))
    }

    /// Reconstructs a slot from its JSON form.
    ///
    /// Placeholders for documents already held by `store` come back resolved
    /// to the canonical instance.
    pub fn decode(&self, json: &JsonValue, store: &Store) -> Result<Slot, FieldError> {
        match json {
            JsonValue::Null => Ok(Slot::Value(Value::Null)),
            JsonValue::Bool(b) => Ok(Slot::Value(Value::Bool(*b))),
            JsonValue::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(int), _) => Ok(Slot::Value(Value::Int(int))),
                (None, Some(float)) => Ok(Slot::Value(Value::Float(float))),
                (None, None) => Err(FieldError::Decode {
                    reason: format!("unsupported number {n}"),
                }),
            },
            JsonValue::String(s) => Ok(Slot::Value(Value::Text(s.clone()))),
            JsonValue::Array(_) => Err(FieldError::Decode {
                reason: "untagged array".to_string(),
            }),
            JsonValue::Object(map) => {
                let type_name = map
                    .get(TYPE_TAG)
                    .and_then(JsonValue::as_str)
                    .ok_or_else(|| FieldError::Decode {
                        reason: format!("object without {TYPE_TAG}"),
                    })?;
                let entry = self
                    .lookup(type_name)
                    .ok_or_else(|| FieldError::UnknownType {
                        type_name: type_name.to_string(),
                    })?;
                (entry.decode)(map, self, store)
            }
        }
    }

    /// Serializes a slot. The inverse of [`FieldRegistry::decode`].
    pub fn encode(&self, slot: &Slot) -> JsonValue {
        encode_slot(slot)
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl std::fmt::Debug for FieldRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("FieldRegistry").field("types", &names).finish()
    }
}

/// Tagged JSON form of a slot.
pub fn encode_slot(slot: &Slot) -> JsonValue {
    match slot {
        Slot::Value(Value::Null) => JsonValue::Null,
        Slot::Value(Value::Bool(b)) => JsonValue::Bool(*b),
        Slot::Value(Value::Int(n)) => JsonValue::from(*n),
        Slot::Value(Value::Float(n)) => JsonValue::from(*n),
        Slot::Value(Value::Text(s)) => JsonValue::String(s.clone()),
        Slot::Value(Value::Date(d)) => tagged(
            "date",
            "date",
            JsonValue::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
        ),
        Slot::List(list) => tagged(
            List::type_id(),
            "fields",
            JsonValue::Array(list.slots().iter().map(encode_slot).collect()),
        ),
        Slot::Proxy(proxy) => tagged(
            ProxyField::type_id(),
            "fieldId",
            JsonValue::String(proxy.id().to_string()),
        ),
    }
}

fn tagged(type_name: &str, member: &str, value: JsonValue) -> JsonValue {
    let mut map = Map::new();
    map.insert(TYPE_TAG.to_string(), JsonValue::String(type_name.to_string()));
    map.insert(member.to_string(), value);
    JsonValue::Object(map)
}

fn member<'a>(
    map: &'a Map<String, JsonValue>,
    name: &str,
    type_name: &str,
) -> Result<&'a JsonValue, FieldError> {
    map.get(name).ok_or_else(|| FieldError::Decode {
        reason: format!("{type_name} is missing '{name}'"),
    })
}

fn decode_list(
    map: &Map<String, JsonValue>,
    registry: &FieldRegistry,
    store: &Store,
) -> Result<Slot, FieldError> {
    let items = member(map, "fields", "list")?
        .as_array()
        .ok_or_else(|| FieldError::Decode {
            reason: "list 'fields' is not an array".to_string(),
        })?;
    let slots = items
        .iter()
        .map(|item| registry.decode(item, store))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Slot::List(List::from_slots(slots)))
}

fn decode_proxy(
    map: &Map<String, JsonValue>,
    _registry: &FieldRegistry,
    store: &Store,
) -> Result<Slot, FieldError> {
    let id = member(map, "fieldId", "proxy")?
        .as_str()
        .ok_or_else(|| FieldError::Decode {
            reason: "proxy 'fieldId' is not a string".to_string(),
        })?;
    let proxy = match store.cached(&id.into()) {
        Some(doc) => ProxyField::resolved(&doc),
        None => ProxyField::new(id),
    };
    Ok(Slot::Proxy(proxy))
}

fn decode_date(
    map: &Map<String, JsonValue>,
    _registry: &FieldRegistry,
    _store: &Store,
) -> Result<Slot, FieldError> {
    let raw = member(map, "date", "date")?;
    let date = match raw {
        JsonValue::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| FieldError::Decode {
                reason: format!("invalid date '{s}': {e}"),
            })?,
        JsonValue::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .ok_or_else(|| FieldError::Decode {
                reason: format!("invalid date {n}"),
            })?,
        other => {
            return Err(FieldError::Decode {
                reason: format!("invalid date {other}"),
            });
        }
    };
    Ok(Slot::Value(Value::Date(date)))
}
