//! Declarative tool contracts and argument coercion.
//!
//! A [`ToolSchema`] is built once from static definitions and never mutated.
//! [`ToolSchema::coerce`] turns loosely typed caller input into a
//! [`CoercedArgs`] value: numeric strings are parsed, numbers are clamped to
//! declared bounds, booleans are normalized, absent parameters fall back to
//! their declared default and undeclared parameters are dropped.

use crate::domain::error::ToolError;
use rmcp::model::{JsonObject, Tool, ToolAnnotations};
use serde_json::{Number, Value};
use std::sync::Arc;

const TRUTHY: &[&str] = &["true", "yes", "1", "t", "y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Binary,
}

impl ParamType {
    /// JSON-Schema `type` keyword. Binary payloads travel as strings.
    pub fn json_type(&self) -> &'static str {
        match self {
            ParamType::String | ParamType::Binary => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ParamType::Integer | ParamType::Number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Read => "read",
            Access::Write => "write",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamType,
    pub description: &'static str,
    pub default: Option<Value>,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
}

impl ParamSpec {
    fn new(name: &'static str, kind: ParamType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            default: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::String, description)
    }

    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::Integer, description)
    }

    pub fn number(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::Number, description)
    }

    pub fn boolean(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::Boolean, description)
    }

    pub fn binary(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::Binary, description)
    }

    /// Declares a default. `Value::Null` is a legitimate default.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn bounds(mut self, minimum: i64, maximum: i64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    pub fn at_least(mut self, minimum: i64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn schema(&self) -> Value {
        let mut prop = JsonObject::new();
        prop.insert("type".into(), self.kind.json_type().into());
        if self.kind == ParamType::Binary {
            prop.insert("format".into(), "binary".into());
        }
        prop.insert("description".into(), self.description.into());
        if let Some(default) = &self.default {
            prop.insert("default".into(), default.clone());
        }
        if let Some(minimum) = self.minimum {
            prop.insert("minimum".into(), minimum.into());
        }
        if let Some(maximum) = self.maximum {
            prop.insert("maximum".into(), maximum.into());
        }
        Value::Object(prop)
    }

    /// Normalizes one supplied value. Never fails: an unparsable numeric
    /// string is kept as supplied and left for the consumer to reject.
    pub fn coerce(&self, supplied: &Value) -> Value {
        match self.kind {
            ParamType::Integer | ParamType::Number => self.clamp(self.parse_numeric(supplied)),
            ParamType::Boolean => Value::Bool(is_truthy(supplied)),
            ParamType::String | ParamType::Binary => supplied.clone(),
        }
    }

    fn parse_numeric(&self, supplied: &Value) -> Value {
        let Value::String(text) = supplied else {
            return supplied.clone();
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return supplied.clone();
        }
        if let Ok(int) = trimmed.parse::<i64>() {
            return Value::from(int);
        }
        if self.kind == ParamType::Number {
            if let Some(num) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
                return Value::Number(num);
            }
        }
        supplied.clone()
    }

    fn clamp(&self, value: Value) -> Value {
        let Some(current) = value.as_f64() else {
            return value;
        };
        if let Some(minimum) = self.minimum {
            if current < minimum as f64 {
                return Value::from(minimum);
            }
        }
        if let Some(maximum) = self.maximum {
            if current > maximum as f64 {
                return Value::from(maximum);
            }
        }
        value
    }
}

/// Generic truthiness: strings match the truthy set case-insensitively,
/// everything else is false only for its natural empty or zero value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => TRUTHY.contains(&text.to_ascii_lowercase().as_str()),
        Value::Number(num) => num.as_f64().is_some_and(|n| n != 0.0),
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[derive(Debug, Clone)]
pub struct ToolSchema {
    name: &'static str,
    description: &'static str,
    access: Access,
    destructive: bool,
    params: Vec<ParamSpec>,
    required: Vec<&'static str>,
}

impl ToolSchema {
    fn new(name: &'static str, description: &'static str, access: Access) -> Self {
        Self {
            name,
            description,
            access,
            destructive: false,
            params: Vec::new(),
            required: Vec::new(),
        }
    }

    pub fn read(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, Access::Read)
    }

    pub fn write(name: &'static str, description: &'static str) -> Self {
        Self::new(name, description, Access::Write)
    }

    pub fn destructive(mut self) -> Self {
        self.destructive = true;
        self
    }

    pub fn required(mut self, param: ParamSpec) -> Self {
        self.required.push(param.name);
        self.params.push(param);
        self
    }

    pub fn optional(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn is_write(&self) -> bool {
        self.access == Access::Write
    }

    pub fn is_destructive(&self) -> bool {
        self.destructive
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn required_params(&self) -> &[&'static str] {
        &self.required
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.contains(&name)
    }

    pub fn input_schema(&self) -> JsonObject {
        let mut properties = JsonObject::new();
        for param in &self.params {
            properties.insert(param.name.into(), param.schema());
        }
        let mut schema = JsonObject::new();
        schema.insert("type".into(), "object".into());
        schema.insert("properties".into(), Value::Object(properties));
        if !self.required.is_empty() {
            schema.insert("required".into(), self.required.clone().into());
        }
        schema
    }

    /// Protocol descriptor advertised in `tools/list`.
    pub fn describe(&self) -> Tool {
        let mut tool = Tool::new(self.name, self.description, Arc::new(self.input_schema()));
        tool.annotations = Some(ToolAnnotations {
            title: None,
            read_only_hint: Some(!self.is_write()),
            destructive_hint: Some(self.destructive),
            idempotent_hint: None,
            open_world_hint: Some(true),
        });
        tool
    }

    pub fn coerce(&self, raw: &JsonObject) -> CoercedArgs {
        let mut values = JsonObject::new();
        for param in &self.params {
            match raw.get(param.name) {
                Some(supplied) => {
                    values.insert(param.name.into(), param.coerce(supplied));
                }
                // required parameters never fall back to a default
                None if self.is_required(param.name) => {}
                None => {
                    if let Some(default) = &param.default {
                        values.insert(param.name.into(), default.clone());
                    }
                }
            }
        }
        CoercedArgs { values }
    }

    /// First required parameter that is absent, null or blank.
    pub fn missing_required(&self, args: &CoercedArgs) -> Option<&'static str> {
        self.required.iter().copied().find(|name| match args.get(name) {
            None => true,
            Some(Value::String(text)) => text.trim().is_empty(),
            Some(_) => false,
        })
    }
}

/// Per-call argument set produced by [`ToolSchema::coerce`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoercedArgs {
    values: JsonObject,
}

impl CoercedArgs {
    pub fn from_map(values: JsonObject) -> Self {
        Self { values }
    }

    pub fn as_map(&self) -> &JsonObject {
        &self.values
    }

    /// Present and non-null.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|value| !value.is_null())
    }

    /// Text form of a parameter; `None` when absent or blank.
    pub fn str(&self, name: &str) -> Option<String> {
        let text = match self.get(name)? {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        (!text.trim().is_empty()).then_some(text)
    }

    pub fn text_or(&self, name: &str, fallback: &str) -> String {
        match self.get(name) {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => fallback.to_string(),
        }
    }

    pub fn require_str(&self, name: &str) -> Result<String, ToolError> {
        self.str(name).ok_or_else(|| ToolError::missing(name))
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.get(name).map(is_truthy)
    }

    pub fn int(&self, name: &str) -> Result<Option<i64>, ToolError> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(num) => num.as_i64().or_else(|| num.as_f64().map(|f| f as i64)),
            Value::String(text) => text.trim().parse::<i64>().ok(),
            _ => None,
        };
        parsed.map(Some).ok_or_else(|| {
            ToolError::InvalidArgument(format!("Parameter '{name}' must be a number, got {value}"))
        })
    }

    /// Non-negative count such as `limit` or `startAt`.
    pub fn count(&self, name: &str, fallback: u32) -> Result<u32, ToolError> {
        Ok(match self.int(name)? {
            Some(value) => u32::try_from(value.max(0)).unwrap_or(u32::MAX),
            None => fallback,
        })
    }

    /// Decodes a JSON-object parameter supplied either as an object or as
    /// JSON text. Blank text means an empty object.
    pub fn json_object(&self, name: &str) -> Result<JsonObject, ToolError> {
        match self.get(name) {
            None => Ok(JsonObject::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(Value::String(text)) if text.trim().is_empty() => Ok(JsonObject::new()),
            Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Err(ToolError::InvalidArgument(format!(
                    "{name} must be a JSON object"
                ))),
                Err(err) => Err(ToolError::invalid_json(name, &err)),
            },
            Some(_) => Err(ToolError::InvalidArgument(format!(
                "{name} must be a JSON object"
            ))),
        }
    }
}
