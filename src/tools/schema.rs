//! Declarative parameter specs
//!
//! A [`ToolSchema`] describes one tool: its unique name, a description for the
//! completion service and an ordered list of fields. [`ParameterSpec::validate`]
//! checks raw JSON arguments against the fields and returns a cleaned object
//! holding only declared fields, with amounts coerced to whole currency units.

use crate::calculator::parse_whole_amount;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    /// Positive money value; accepts numbers and vernacular strings ("25rb")
    Amount,
    Enum { values: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

impl FieldSpec {
    fn build(name: &str, field_type: FieldType, description: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            description: description.to_string(),
            required,
            minimum: None,
            maximum: None,
            min_length: None,
            max_length: None,
        }
    }

    pub fn required(name: &str, field_type: FieldType, description: &str) -> Self {
        Self::build(name, field_type, description, true)
    }

    pub fn optional(name: &str, field_type: FieldType, description: &str) -> Self {
        Self::build(name, field_type, description, false)
    }

    pub fn min(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn max(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    pub fn min_length(mut self, length: usize) -> Self {
        self.min_length = Some(length);
        self
    }

    pub fn max_length(mut self, length: usize) -> Self {
        self.max_length = Some(length);
        self
    }

    /// Coerce and check one present, non-null value
    fn check(&self, value: &Value) -> std::result::Result<Value, String> {
        match &self.field_type {
            FieldType::String => {
                let s = value.as_str().ok_or("must be a string")?;
                let len = s.chars().count();
                if let Some(min) = self.min_length {
                    if len < min {
                        return Err(format!("must be at least {} characters", min));
                    }
                }
                if let Some(max) = self.max_length {
                    if len > max {
                        return Err(format!("must be at most {} characters", max));
                    }
                }
                Ok(json!(s))
            }
            FieldType::Integer => {
                let n = as_integer(value).ok_or("must be an integer")?;
                self.check_range(n as f64)?;
                Ok(json!(n))
            }
            FieldType::Number => {
                let n = value.as_f64().ok_or("must be a number")?;
                self.check_range(n)?;
                Ok(json!(n))
            }
            FieldType::Boolean => {
                let b = value.as_bool().ok_or("must be a boolean")?;
                Ok(json!(b))
            }
            FieldType::Amount => {
                let amount = match value {
                    Value::Number(n) => n
                        .as_f64()
                        .filter(|f| f.is_finite() && *f > 0.0)
                        .map(|f| f.round() as i64)
                        .filter(|i| *i > 0),
                    Value::String(s) => parse_whole_amount(s),
                    _ => None,
                };
                let amount = amount.ok_or("must be a positive amount")?;
                self.check_range(amount as f64)?;
                Ok(json!(amount))
            }
            FieldType::Enum { values } => {
                let s = value.as_str().ok_or("must be a string")?;
                let wanted = s.trim().to_lowercase();
                values
                    .iter()
                    .find(|v| v.to_lowercase() == wanted)
                    .map(|v| json!(v))
                    .ok_or_else(|| format!("must be one of: {}", values.join(", ")))
            }
        }
    }

    fn check_range(&self, n: f64) -> std::result::Result<(), String> {
        if let Some(min) = self.minimum {
            if n < min {
                return Err(format!("must be >= {}", min));
            }
        }
        if let Some(max) = self.maximum {
            if n > max {
                return Err(format!("must be <= {}", max));
            }
        }
        Ok(())
    }

    fn to_json_schema(&self) -> Value {
        let mut schema = match &self.field_type {
            FieldType::String => json!({ "type": "string" }),
            FieldType::Integer => json!({ "type": "integer" }),
            FieldType::Number | FieldType::Amount => json!({ "type": "number" }),
            FieldType::Boolean => json!({ "type": "boolean" }),
            FieldType::Enum { values } => json!({ "type": "string", "enum": values }),
        };

        schema["description"] = json!(self.description);
        if let Some(min) = self.minimum {
            schema["minimum"] = json!(min);
        }
        if let Some(max) = self.maximum {
            schema["maximum"] = json!(max);
        }
        if let Some(len) = self.min_length {
            schema["minLength"] = json!(len);
        }
        if let Some(len) = self.max_length {
            schema["maxLength"] = json!(len);
        }

        schema
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

/// One rejected field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.reason)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParameterSpec {
    pub fields: Vec<FieldSpec>,
}

impl ParameterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Validate raw arguments, collecting every violation
    pub fn validate(&self, raw: &Value) -> std::result::Result<Map<String, Value>, Vec<FieldViolation>> {
        let Some(object) = raw.as_object() else {
            return Err(vec![FieldViolation {
                field: "arguments".to_string(),
                reason: "must be a JSON object".to_string(),
            }]);
        };

        let mut cleaned = Map::new();
        let mut violations = Vec::new();

        for field in &self.fields {
            match object.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        violations.push(FieldViolation {
                            field: field.name.clone(),
                            reason: "is required".to_string(),
                        });
                    }
                }
                Some(value) => match field.check(value) {
                    Ok(clean) => {
                        cleaned.insert(field.name.clone(), clean);
                    }
                    Err(reason) => violations.push(FieldViolation {
                        field: field.name.clone(),
                        reason,
                    }),
                },
            }
        }

        if violations.is_empty() {
            Ok(cleaned)
        } else {
            Err(violations)
        }
    }

    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.to_json_schema()))
            .collect();

        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Immutable once registered
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSpec,
}

impl ToolSchema {
    pub fn new(name: &str, description: &str, parameters: ParameterSpec) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }

    /// Function-calling declaration
    pub fn to_json_schema(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters.to_json_schema(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ParameterSpec {
        ParameterSpec::new()
            .field(FieldSpec::required("amount", FieldType::Amount, "Amount").max(1_000_000_000.0))
            .field(
                FieldSpec::required("description", FieldType::String, "What")
                    .min_length(1)
                    .max_length(20),
            )
            .field(FieldSpec::optional(
                "period",
                FieldType::Enum {
                    values: vec!["weekly".into(), "monthly".into()],
                },
                "Budget period",
            ))
            .field(FieldSpec::optional("count", FieldType::Integer, "Count").min(1.0))
            .field(FieldSpec::optional("urgent", FieldType::Boolean, "Flag"))
    }

    #[test]
    fn test_valid_arguments_are_cleaned() {
        let cleaned = spec()
            .validate(&json!({
                "amount": "25rb",
                "description": "kopi",
                "period": "Monthly",
                "count": 2.0,
                "extra": "dropped"
            }))
            .unwrap();

        assert_eq!(cleaned["amount"], json!(25000));
        assert_eq!(cleaned["period"], json!("monthly"));
        assert_eq!(cleaned["count"], json!(2));
        assert!(cleaned.get("extra").is_none());
        assert!(cleaned.get("urgent").is_none());
    }

    #[test]
    fn test_amount_coercion() {
        let field = FieldSpec::required("amount", FieldType::Amount, "Amount");

        assert_eq!(field.check(&json!(25000)), Ok(json!(25000)));
        assert_eq!(field.check(&json!(1499.6)), Ok(json!(1500)));
        assert_eq!(field.check(&json!("Rp 25.000")), Ok(json!(25000)));
        assert_eq!(field.check(&json!("1,5jt")), Ok(json!(1_500_000)));
        assert!(field.check(&json!(0)).is_err());
        assert!(field.check(&json!(-5)).is_err());
        assert!(field.check(&json!("gratis")).is_err());
        assert!(field.check(&json!(true)).is_err());
    }

    #[test]
    fn test_every_violation_is_reported() {
        let violations = spec()
            .validate(&json!({
                "description": "this description is far too long",
                "period": "daily",
                "count": 0,
                "urgent": "yes"
            }))
            .unwrap_err();

        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["amount", "description", "period", "count", "urgent"]);
        assert_eq!(violations[0].reason, "is required");
    }

    #[test]
    fn test_null_counts_as_missing() {
        let violations = spec()
            .validate(&json!({ "amount": null, "description": "kopi" }))
            .unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "amount");

        // optional null is simply absent
        let cleaned = spec()
            .validate(&json!({ "amount": 1, "description": "kopi", "period": null }))
            .unwrap();
        assert!(cleaned.get("period").is_none());
    }

    #[test]
    fn test_non_object_arguments() {
        let violations = spec().validate(&json!(["amount", 5])).unwrap_err();
        assert_eq!(violations[0].field, "arguments");
        assert!(spec().validate(&Value::Null).is_err());
    }

    #[test]
    fn test_range_on_amount() {
        let violations = spec()
            .validate(&json!({ "amount": "2 miliar", "description": "rumah" }))
            .unwrap_err();
        assert_eq!(violations[0].field, "amount");
    }

    #[test]
    fn test_json_schema_rendering() {
        let schema = ToolSchema::new("create_expense", "Record an expense", spec()).to_json_schema();

        assert_eq!(schema["name"], json!("create_expense"));
        assert_eq!(schema["parameters"]["type"], json!("object"));
        assert_eq!(schema["parameters"]["required"], json!(["amount", "description"]));
        assert_eq!(schema["parameters"]["properties"]["amount"]["type"], json!("number"));
        assert_eq!(
            schema["parameters"]["properties"]["period"]["enum"],
            json!(["weekly", "monthly"])
        );
        assert_eq!(schema["parameters"]["properties"]["description"]["maxLength"], json!(20));
    }
}
