//! Signature descriptors: declared parameter types, defaults and return shapes
//!
//! Pure data. The validator and the registry read these; nothing here executes
//! handler code.

use std::{collections::BTreeMap, fmt};

use serde_json::{json, Map, Number, Value};

/// Semantic type of a parameter or a return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Number,
    Integer,
    String,
    Boolean,
    List(Box<ParamType>),
    /// `mapping<string, string>`
    Mapping,
}

impl ParamType {
    pub fn list_of(inner: ParamType) -> Self {
        Self::List(Box::new(inner))
    }

    /// Whether an already-typed value fits this type. Integers widen to numbers.
    pub fn accepts(&self, value: &ArgValue) -> bool {
        match (self, value) {
            (Self::Number, ArgValue::Number(_) | ArgValue::Integer(_)) => true,
            (Self::Integer, ArgValue::Integer(_)) => true,
            (Self::String, ArgValue::String(_)) => true,
            (Self::Boolean, ArgValue::Boolean(_)) => true,
            (Self::List(inner), ArgValue::List(items)) => {
                items.iter().all(|item| inner.accepts(item))
            }
            (Self::Mapping, ArgValue::Mapping(_)) => true,
            _ => false,
        }
    }

    pub fn json_schema(&self) -> Value {
        match self {
            Self::Number => json!({ "type": "number" }),
            Self::Integer => json!({ "type": "integer" }),
            Self::String => json!({ "type": "string" }),
            Self::Boolean => json!({ "type": "boolean" }),
            Self::List(inner) => json!({ "type": "array", "items": inner.json_schema() }),
            Self::Mapping => json!({
                "type": "object",
                "additionalProperties": { "type": "string" }
            }),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number => write!(f, "number"),
            Self::Integer => write!(f, "integer"),
            Self::String => write!(f, "string"),
            Self::Boolean => write!(f, "boolean"),
            Self::List(inner) => write!(f, "list<{inner}>"),
            Self::Mapping => write!(f, "mapping<string,string>"),
        }
    }
}

/// A typed argument or result value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Explicit absence, used by optional parameters declared without a default.
    Null,
    Number(f64),
    Integer(i64),
    String(String),
    Boolean(bool),
    List(Vec<ArgValue>),
    Mapping(BTreeMap<String, String>),
}

impl ArgValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Number(value) => Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Integer(value) => json!(value),
            Self::String(value) => Value::String(value.clone()),
            Self::Boolean(value) => Value::Bool(*value),
            Self::List(items) => Value::Array(items.iter().map(ArgValue::to_json).collect()),
            Self::Mapping(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }

    /// Text rendering used for content blocks: strings verbatim, everything
    /// else as compact JSON.
    pub fn to_text(&self) -> String {
        match self {
            Self::String(value) => value.clone(),
            other => other.to_json().to_string(),
        }
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<Vec<ArgValue>> for ArgValue {
    fn from(items: Vec<ArgValue>) -> Self {
        Self::List(items)
    }
}

impl From<BTreeMap<String, String>> for ArgValue {
    fn from(entries: BTreeMap<String, String>) -> Self {
        Self::Mapping(entries)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    pub default: Option<ArgValue>,
    pub description: Option<String>,
}

impl ParameterSpec {
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            default: None,
            description: None,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        param_type: ParamType,
        default: impl Into<ArgValue>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            default: Some(default.into()),
            description: None,
        }
    }

    /// Optional parameter that resolves to [`ArgValue::Null`] when omitted.
    pub fn nullable(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            default: None,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn resolved_default(&self) -> ArgValue {
        self.default.clone().unwrap_or(ArgValue::Null)
    }

    fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("parameter names must not be empty".to_string());
        }

        match (&self.default, self.required) {
            (Some(_), true) => Err(format!(
                "required parameter `{}` must not declare a default",
                self.name
            )),
            (Some(default), false) if !default.is_null() && !self.param_type.accepts(default) => {
                Err(format!(
                    "default for `{}` does not fit declared type {}",
                    self.name, self.param_type
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Everything the engine knows about a capability besides its handler.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerDescriptor {
    /// Tool or prompt name, or the URI template of a resource.
    pub name: String,
    pub title: Option<String>,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
    pub returns: ParamType,
    pub mime_type: Option<String>,
}

impl HandlerDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, returns: ParamType) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: description.into(),
            parameters: Vec::new(),
            returns,
            mime_type: None,
        }
    }

    pub fn param(mut self, spec: ParameterSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|spec| spec.name == name)
    }

    /// JSON Schema object describing the argument bag.
    pub fn input_schema(&self) -> Value {
        let properties = self
            .parameters
            .iter()
            .map(|spec| {
                let mut schema = spec.param_type.json_schema();
                if let Some(object) = schema.as_object_mut() {
                    if let Some(description) = &spec.description {
                        object.insert("description".to_string(), json!(description));
                    }
                    if let Some(default) = spec.default.as_ref().filter(|value| !value.is_null()) {
                        object.insert("default".to_string(), default.to_json());
                    }
                }
                (spec.name.clone(), schema)
            })
            .collect::<Map<String, Value>>();

        let required = self
            .parameters
            .iter()
            .filter(|spec| spec.required)
            .map(|spec| json!(spec.name))
            .collect::<Vec<_>>();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }

    /// Parameter-level invariants: unique names, defaults only on optional
    /// parameters, defaults that fit their type.
    pub fn check_parameters(&self) -> Result<(), String> {
        for (position, spec) in self.parameters.iter().enumerate() {
            spec.check()?;
            if self.parameters[..position]
                .iter()
                .any(|earlier| earlier.name == spec.name)
            {
                return Err(format!("parameter `{}` is declared twice", spec.name));
            }
        }
        Ok(())
    }
}
