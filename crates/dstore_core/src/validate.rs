//! Attribute validation and entity construction.
//!
//! A [`Schema`] declares, per field, the expected type, whether the field
//! must be present, a list of checks and optionally a nested schema for map
//! fields. Validation reports every violation, not just the first.
//!
//! ```
//! use dstore_codec::{Attributes, Value};
//! use dstore_core::{Check, FieldRule, FieldType, Schema, Violation};
//!
//! let schema = Schema::new()
//!     .field(FieldRule::required("title", FieldType::Text).check(Check::not_blank()))
//!     .field(FieldRule::optional("price", FieldType::Float).check(Check::PositiveOrZero));
//!
//! let mut attrs = Attributes::new();
//! attrs.insert("title".to_string(), Value::from("  "));
//! attrs.insert("price".to_string(), Value::from(-1.5));
//!
//! let violations = schema.validate(&attrs).unwrap_err();
//! assert_eq!(violations.len(), 2);
//! assert!(matches!(violations[0], Violation::Blank { .. }));
//! ```

use crate::error::CoreResult;
use dstore_codec::{Attributes, Value};
use std::fmt;
use thiserror::Error;
use tracing::error;

/// Expected type of a field. `Null` passes every type check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Any value.
    Any,
    /// Booleans.
    Bool,
    /// Integers.
    Integer,
    /// Floats or integers.
    Float,
    /// Text.
    Text,
    /// Arrays.
    Array,
    /// Maps.
    Map,
}

impl FieldType {
    /// Lowercase name for violations.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Any => "any",
            FieldType::Bool => "bool",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Text => "text",
            FieldType::Array => "array",
            FieldType::Map => "map",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (FieldType::Any, _)
                | (FieldType::Bool, Value::Bool(_))
                | (FieldType::Integer, Value::Integer(_))
                | (FieldType::Float, Value::Float(_) | Value::Integer(_))
                | (FieldType::Text, Value::Text(_))
                | (FieldType::Array, Value::Array(_))
                | (FieldType::Map, Value::Map(_))
        )
    }
}

/// A check applied to a present field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// The value is not `Null`.
    NotNull,
    /// The value is not blank: not whitespace-only text, not an empty array
    /// or map, and not `Null` unless `allow_null`.
    NotBlank {
        /// Whether `Null` passes.
        allow_null: bool,
    },
    /// Numbers are zero or greater.
    PositiveOrZero,
}

impl Check {
    /// `NotBlank` rejecting `Null`.
    pub const fn not_blank() -> Self {
        Check::NotBlank { allow_null: false }
    }

    fn run(&self, field: &str, value: &Value) -> Option<Violation> {
        let failed = match self {
            Check::NotNull => value.is_null(),
            Check::NotBlank { allow_null } => match value {
                Value::Null => !allow_null,
                Value::Text(text) => text.trim().is_empty(),
                Value::Array(items) => items.is_empty(),
                Value::Map(entries) => entries.is_empty(),
                _ => false,
            },
            Check::PositiveOrZero => match value {
                Value::Integer(n) => *n < 0,
                Value::Float(n) => *n < 0.0,
                _ => false,
            },
        };
        failed.then(|| match self {
            Check::NotNull => Violation::Null {
                field: field.to_string(),
            },
            Check::NotBlank { .. } => Violation::Blank {
                field: field.to_string(),
            },
            Check::PositiveOrZero => Violation::Negative {
                field: field.to_string(),
            },
        })
    }
}

/// A rule for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    name: String,
    field_type: FieldType,
    required: bool,
    checks: Vec<Check>,
    nested: Option<Schema>,
}

impl FieldRule {
    /// A field that must be present.
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            checks: Vec::new(),
            nested: None,
        }
    }

    /// A field that may be absent; checks only run when it is present.
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, field_type)
        }
    }

    /// Adds a check.
    #[must_use]
    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    /// Validates map values of this field against `schema`.
    #[must_use]
    pub fn nested(mut self, schema: Schema) -> Self {
        self.nested = Some(schema);
        self
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, path: &str, attrs: &Attributes, violations: &mut Vec<Violation>) {
        let Some(value) = attrs.get(&self.name) else {
            if self.required {
                violations.push(Violation::Missing {
                    field: path.to_string(),
                });
            }
            return;
        };

        if !self.field_type.accepts(value) {
            violations.push(Violation::WrongType {
                field: path.to_string(),
                expected: self.field_type.as_str(),
                found: value.type_name(),
            });
            return;
        }
        violations.extend(self.checks.iter().filter_map(|check| check.run(path, value)));

        if let (Some(schema), Value::Map(inner)) = (&self.nested, value) {
            schema.collect(Some(path), inner, violations);
        }
    }
}

/// A declarative set of field rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<FieldRule>,
}

impl Schema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field rule.
    #[must_use]
    pub fn field(mut self, rule: FieldRule) -> Self {
        self.fields.push(rule);
        self
    }

    /// Field rules, in declaration order.
    pub fn fields(&self) -> &[FieldRule] {
        &self.fields
    }

    /// Validates `attrs`, returning every violation found.
    ///
    /// Fields not declared in the schema are ignored.
    pub fn validate(&self, attrs: &Attributes) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();
        self.collect(None, attrs, &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    fn collect(&self, parent: Option<&str>, attrs: &Attributes, violations: &mut Vec<Violation>) {
        for rule in &self.fields {
            let path = match parent {
                Some(parent) => format!("{parent}.{}", rule.name),
                None => rule.name.clone(),
            };
            rule.validate(&path, attrs, violations);
        }
    }
}

/// One failed rule. `field` is a dotted path for nested fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    /// A required field is absent.
    #[error("{field}: value does not exist in attributes")]
    Missing {
        /// Field path.
        field: String,
    },

    /// A field holds a value of the wrong type.
    #[error("{field}: expected {expected}, found {found}")]
    WrongType {
        /// Field path.
        field: String,
        /// Declared type.
        expected: &'static str,
        /// Actual type.
        found: &'static str,
    },

    /// A field is null.
    #[error("{field}: value should not be null")]
    Null {
        /// Field path.
        field: String,
    },

    /// A field is blank.
    #[error("{field}: value should not be blank")]
    Blank {
        /// Field path.
        field: String,
    },

    /// A number is negative.
    #[error("{field}: value should be positive or zero")]
    Negative {
        /// Field path.
        field: String,
    },
}

struct Listed<'a>(&'a [Violation]);

impl fmt::Display for Listed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

/// Builds entities from stored attributes after validating them.
pub trait EntityBuilder {
    /// The entity built.
    type Entity;

    /// Rules the attributes must satisfy.
    fn schema(&self) -> Schema;

    /// Builds the entity from validated attributes.
    fn make_entity(&self, attrs: &Attributes) -> CoreResult<Self::Entity>;

    /// Validates `attrs` and builds the entity.
    ///
    /// Invalid attributes are logged and yield `None`.
    fn create(&self, attrs: &Attributes) -> Option<Self::Entity> {
        let builder = std::any::type_name::<Self>();
        if let Err(violations) = self.schema().validate(attrs) {
            error!(
                builder,
                attributes = ?attrs,
                errors = %Listed(&violations),
                "invalid attributes"
            );
            return None;
        }
        match self.make_entity(attrs) {
            Ok(entity) => Some(entity),
            Err(err) => {
                error!(builder, attributes = ?attrs, error = %err, "entity construction failed");
                None
            }
        }
    }
}
