//! JSON schemas of function parameters.
//!
//! A [`JsonSchema`] is always an object schema whose `required` keys are declared in
//! `properties`. Arguments are validated by a compiled [`jsonschema::Validator`] with
//! format assertions enabled.

use jsonschema::{Validator, error::ValidationErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use smallvec::SmallVec;
use std::{
    fmt,
    sync::{Arc, LazyLock},
};

/// Schema of functions without parameters.
static EMPTY_SCHEMA: LazyLock<JsonSchema> = LazyLock::new(|| {
    let mut schema = Map::new();
    schema.insert("type".to_owned(), "object".into());
    schema.insert("properties".to_owned(), Value::Object(Map::new()));
    schema.insert("required".to_owned(), Value::Array(Vec::new()));
    JsonSchema::try_new(schema).expect("fail to compile the empty schema")
});

/// Errors raised by JSON schemas.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The top-level type is not `object`.
    #[error("the schema should have `type = \"object\"`, found `{0}`")]
    NotAnObject(String),

    /// A required key is not declared in `properties`.
    #[error("the required property `{0}` is not declared")]
    UndeclaredRequired(String),

    /// The schema is malformed.
    #[error("malformed schema: {0}")]
    Malformed(String),

    /// The arguments do not conform to the schema.
    #[error("invalid arguments: {0}")]
    Validation(Validation),
}

/// A record of validation failures keyed by the JSON pointer of the instance.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Validation {
    failed_entries: SmallVec<[(String, String); 4]>,
}

impl Validation {
    /// Creates a new instance.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an entry with the supplied message.
    #[inline]
    pub fn record(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.failed_entries.push((key.into(), message.into()));
    }

    /// Returns `true` if the validation contains a failure for the key.
    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.failed_entries.iter().any(|(field, _)| field == key)
    }

    /// Returns `true` if the validation is success.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.failed_entries.is_empty()
    }

    /// Returns the failed entries.
    #[inline]
    pub fn failed_entries(&self) -> &[(String, String)] {
        &self.failed_entries
    }

    /// Collects the errors of validating the instance.
    fn collect(validator: &Validator, instance: &Value) -> Self {
        let mut validation = Self::new();
        for err in validator.iter_errors(instance) {
            let mut key = err.instance_path.to_string();
            if let ValidationErrorKind::Required { property } = &err.kind {
                if let Some(property) = property.as_str() {
                    key.push('/');
                    key.push_str(property);
                }
            }
            validation.record(key, err.to_string());
        }
        validation
    }

    #[inline]
    fn into_result(self) -> Result<(), SchemaError> {
        self.is_success()
            .then_some(())
            .ok_or(SchemaError::Validation(self))
    }
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, message)) in self.failed_entries.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            let key = if key.is_empty() { "/" } else { key.as_str() };
            write!(f, "`{key}`: {message}")?;
        }
        Ok(())
    }
}

/// The JSON schema of function parameters.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct JsonSchema {
    schema: Map<String, Value>,
    validator: Arc<Validator>,
    present_validator: Arc<Validator>,
}

impl JsonSchema {
    /// Creates a new instance, checking that it describes an object whose
    /// required properties are all declared.
    pub fn try_new(schema: Map<String, Value>) -> Result<Self, SchemaError> {
        match schema.get("type") {
            Some(Value::String(s)) if s == "object" => {}
            Some(value) => return Err(SchemaError::NotAnObject(value.to_string())),
            None => return Err(SchemaError::NotAnObject("null".to_owned())),
        }

        let properties = match schema.get("properties") {
            Some(Value::Object(properties)) => Some(properties),
            Some(_) => {
                return Err(SchemaError::Malformed(
                    "`properties` should be an object".to_owned(),
                ));
            }
            None => None,
        };
        match schema.get("required") {
            Some(Value::Array(required)) => {
                for key in required {
                    let Some(key) = key.as_str() else {
                        return Err(SchemaError::Malformed(
                            "`required` should be an array of strings".to_owned(),
                        ));
                    };
                    if !properties.is_some_and(|properties| properties.contains_key(key)) {
                        return Err(SchemaError::UndeclaredRequired(key.to_owned()));
                    }
                }
            }
            Some(_) => {
                return Err(SchemaError::Malformed(
                    "`required` should be an array".to_owned(),
                ));
            }
            None => {}
        }

        let mut present_schema = schema.clone();
        present_schema.remove("required");
        present_schema.insert("additionalProperties".to_owned(), Value::Bool(false));
        let validator = compile(Value::Object(schema.clone()))?;
        let present_validator = compile(Value::Object(present_schema))?;
        Ok(Self {
            schema,
            validator: Arc::new(validator),
            present_validator: Arc::new(present_validator),
        })
    }

    /// Creates a schema without parameters.
    #[inline]
    pub fn empty() -> Self {
        EMPTY_SCHEMA.clone()
    }

    /// Returns a reference to the underlying object.
    #[inline]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.schema
    }

    /// Converts `self` to a JSON value.
    #[inline]
    pub fn to_value(&self) -> Value {
        Value::Object(self.schema.clone())
    }

    /// Returns the declared properties.
    #[inline]
    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.schema.get("properties").and_then(|v| v.as_object())
    }

    /// Returns the schema of a property.
    #[inline]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties().and_then(|properties| properties.get(name))
    }

    /// Returns the property names in declaration order.
    pub fn property_names(&self) -> Vec<&str> {
        self.properties()
            .map(|properties| properties.keys().map(|key| key.as_str()).collect())
            .unwrap_or_default()
    }

    /// Returns `true` if at least one property is declared.
    #[inline]
    pub fn has_properties(&self) -> bool {
        self.properties()
            .is_some_and(|properties| !properties.is_empty())
    }

    /// Returns the required property names.
    pub fn required(&self) -> Vec<&str> {
        self.schema
            .get("required")
            .and_then(|v| v.as_array())
            .map(|keys| keys.iter().filter_map(|key| key.as_str()).collect())
            .unwrap_or_default()
    }

    /// Returns `true` if the property is required.
    #[inline]
    pub fn is_required(&self, name: &str) -> bool {
        self.required().contains(&name)
    }

    /// Validates the arguments, enforcing required properties.
    pub fn validate(&self, arguments: &Map<String, Value>) -> Result<(), SchemaError> {
        let instance = Value::Object(arguments.clone());
        Validation::collect(&self.validator, &instance).into_result()
    }

    /// Validates each present argument against its property schema,
    /// without enforcing required properties.
    pub fn validate_present(&self, arguments: &Map<String, Value>) -> Result<(), SchemaError> {
        let instance = Value::Object(arguments.clone());
        Validation::collect(&self.present_validator, &instance).into_result()
    }

    /// Renders the parameters as Python type hints such as
    /// `to: str, limit: Optional[int]`.
    pub fn render_parameters(&self) -> String {
        let Some(properties) = self.properties() else {
            return String::new();
        };
        let required = self.required();
        properties
            .iter()
            .map(|(name, schema)| {
                let hint = python_type_hint(schema);
                if required.contains(&name.as_str()) {
                    format!("{name}: {hint}")
                } else {
                    format!("{name}: Optional[{hint}]")
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("JsonSchema").field(&self.schema).finish()
    }
}

impl PartialEq for JsonSchema {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema
    }
}

impl Default for JsonSchema {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

impl TryFrom<Map<String, Value>> for JsonSchema {
    type Error = SchemaError;

    #[inline]
    fn try_from(schema: Map<String, Value>) -> Result<Self, Self::Error> {
        Self::try_new(schema)
    }
}

impl TryFrom<Value> for JsonSchema {
    type Error = SchemaError;

    fn try_from(schema: Value) -> Result<Self, Self::Error> {
        match schema {
            Value::Object(map) => Self::try_new(map),
            _ => Err(SchemaError::NotAnObject(schema.to_string())),
        }
    }
}

impl From<JsonSchema> for Map<String, Value> {
    #[inline]
    fn from(schema: JsonSchema) -> Self {
        schema.schema
    }
}

fn compile(schema: Value) -> Result<Validator, SchemaError> {
    jsonschema::options()
        .should_validate_formats(true)
        .build(&schema)
        .map_err(|err| SchemaError::Malformed(err.to_string()))
}

fn python_type_hint(schema: &Value) -> String {
    let format = schema.get("format").and_then(|v| v.as_str());
    match schema_type(schema) {
        Some("string") => match format {
            Some("date-time") => "datetime".to_owned(),
            Some("date") => "date".to_owned(),
            _ => "str".to_owned(),
        },
        Some("integer") => "int".to_owned(),
        Some("number") => "float".to_owned(),
        Some("boolean") => "bool".to_owned(),
        Some("array") => {
            let item = schema
                .get("items")
                .map(python_type_hint)
                .unwrap_or_else(|| "Any".to_owned());
            format!("List[{item}]")
        }
        Some("object") => "Dict[str, Any]".to_owned(),
        _ => "Any".to_owned(),
    }
}

/// Returns the first non-null type of the schema.
fn schema_type(schema: &Value) -> Option<&str> {
    match schema.get("type")? {
        Value::String(s) => Some(s.as_str()),
        Value::Array(types) => types
            .iter()
            .filter_map(|v| v.as_str())
            .find(|s| *s != "null"),
        _ => None,
    }
}

/// Builds the schema of a string parameter restricted to the entities.
pub(crate) fn one_of_consts<'a>(
    entities: impl IntoIterator<Item = (&'a str, Option<&'a str>)>,
) -> Value {
    let variants = entities
        .into_iter()
        .map(|(identity, description)| match description {
            Some(description) => json!({ "const": identity, "description": description }),
            None => json!({ "const": identity }),
        })
        .collect::<Vec<_>>();
    json!({ "oneOf": variants })
}
