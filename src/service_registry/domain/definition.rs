//! Definitions and the metadata a service advertises.

use super::{MetadataDecodeError, TypedName};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Property naming the type a definition handles.
pub const HANDLER_FOR_PROPERTY: &str = "handlerFor";

/// Insertion-ordered definition properties.
pub type Properties = Map<String, Value>;

/// Immutable description of one loadable unit advertised by a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    service_id: TypedName,
    identifier: TypedName,
    #[serde(default)]
    properties: Properties,
}

impl Definition {
    /// Creates a definition without properties.
    #[must_use]
    pub fn new(service_id: TypedName, identifier: TypedName) -> Self {
        Self {
            service_id,
            identifier,
            properties: Properties::new(),
        }
    }

    /// Adds or replaces one property, keeping first-insertion order.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Replaces all properties.
    #[must_use]
    pub fn with_properties(mut self, values: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.properties = values.into_iter().collect();
        self
    }

    /// Returns the identifier of the owning service.
    #[must_use]
    pub const fn service_id(&self) -> &TypedName {
        &self.service_id
    }

    /// Returns the identifier of this definition.
    #[must_use]
    pub const fn identifier(&self) -> &TypedName {
        &self.identifier
    }

    /// Returns all properties in insertion order.
    #[must_use]
    pub const fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Returns one property value.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Returns the name of the type this definition handles, if any.
    ///
    /// The `handlerFor` property is either the type name itself or a type
    /// object carrying a `name` string.
    #[must_use]
    pub fn handler_for(&self) -> Option<&str> {
        let handled = match self.property(HANDLER_FOR_PROPERTY)? {
            Value::String(name) => Some(name.as_str()),
            Value::Object(object) => object.get("name").and_then(Value::as_str),
            _ => None,
        };
        handled.filter(|name| !name.is_empty())
    }
}

/// Opaque type set advertised alongside a service's definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSet {
    name: String,
    #[serde(default)]
    body: Value,
}

impl TypeSet {
    /// Creates a type set.
    #[must_use]
    pub fn new(name: impl Into<String>, body: Value) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    /// Returns the type-set name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the raw type-set body.
    #[must_use]
    pub const fn body(&self) -> &Value {
        &self.body
    }
}

/// Type set and definitions reported by one service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceMetadata {
    type_set: Option<TypeSet>,
    definitions: Vec<Definition>,
}

impl ServiceMetadata {
    /// Creates metadata from its parts.
    #[must_use]
    pub const fn new(type_set: Option<TypeSet>, definitions: Vec<Definition>) -> Self {
        Self {
            type_set,
            definitions,
        }
    }

    /// Returns the advertised type set.
    #[must_use]
    pub const fn type_set(&self) -> Option<&TypeSet> {
        self.type_set.as_ref()
    }

    /// Returns the advertised definitions.
    #[must_use]
    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    /// Returns whether no definitions were advertised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Returns the owning service of the first definition.
    #[must_use]
    pub fn service_id(&self) -> Option<&TypedName> {
        self.definitions.first().map(Definition::service_id)
    }

    /// Decodes a `[typeSet, definitions]` reply from a hosting service.
    ///
    /// Either element may be missing or `null`. A type set that does not
    /// decode is dropped, and a definitions element that is not a list is
    /// treated as missing.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataDecodeError`] when the reply is not a list or one of
    /// its definitions cannot be decoded.
    pub fn from_reply(reply: Value) -> Result<Self, MetadataDecodeError> {
        let Value::Array(elements) = reply else {
            return Err(MetadataDecodeError::NotAList(kind_of(&reply).to_owned()));
        };
        let mut parts = elements.into_iter();

        let type_set = match parts.next() {
            None | Some(Value::Null) => None,
            Some(raw) => match serde_json::from_value::<TypeSet>(raw) {
                Ok(type_set) => Some(type_set),
                Err(err) => {
                    tracing::debug!(error = %err, "ignoring undecodable type set");
                    None
                }
            },
        };

        let definitions = match parts.next() {
            Some(Value::Array(raw_definitions)) => raw_definitions
                .into_iter()
                .enumerate()
                .map(|(index, raw)| {
                    serde_json::from_value(raw).map_err(|err| {
                        MetadataDecodeError::InvalidDefinition {
                            index,
                            reason: err.to_string(),
                        }
                    })
                })
                .collect::<Result<Vec<Definition>, _>>()?,
            Some(other) if !other.is_null() => {
                tracing::debug!(kind = kind_of(&other), "ignoring definitions that are not a list");
                Vec::new()
            }
            _ => Vec::new(),
        };

        Ok(Self::new(type_set, definitions))
    }
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
