//! Composite index values.

use crate::error::{CoreError, CoreResult};
use crate::state::IndexValue;
use dstore_codec::Value;

/// An index value with a sort score, for sorted indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredValue {
    value: String,
    score: f64,
}

impl ScoredValue {
    /// Creates a scored value.
    pub fn new(value: impl Into<String>, score: f64) -> Self {
        Self {
            value: value.into(),
            score,
        }
    }

    /// The index value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The score of the document inside the value's slot.
    pub fn score(&self) -> f64 {
        self.score
    }
}

impl IndexValue for ScoredValue {
    fn member(&self) -> &str {
        &self.value
    }

    fn from_scalar(_value: &Value) -> CoreResult<Option<Self>> {
        Err(CoreError::missing_projection("scored index value"))
    }
}

/// An index value made of several scalar parameters joined by a glue.
///
/// ```
/// use dstore_core::ComplexValue;
///
/// let value = ComplexValue::new().param(7).unwrap().param("lamps").unwrap();
/// assert_eq!(value.value().unwrap(), "7:lamps");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexValue {
    params: Vec<String>,
    glue: String,
}

impl ComplexValue {
    /// Creates an empty value glued with `:`.
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            glue: ":".to_string(),
        }
    }

    /// Replaces the glue.
    #[must_use]
    pub fn with_glue(mut self, glue: impl Into<String>) -> Self {
        self.glue = glue.into();
        self
    }

    /// Appends a parameter.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` for null, array and map parameters.
    pub fn param(mut self, param: impl Into<Value>) -> CoreResult<Self> {
        self.push(param)?;
        Ok(self)
    }

    /// Appends a parameter in place.
    pub fn push(&mut self, param: impl Into<Value>) -> CoreResult<()> {
        let param = param.into();
        let rendered = param.to_index_string().ok_or_else(|| {
            CoreError::invalid_operation(format!(
                "complex value parameters must be scalar, got {}",
                param.type_name()
            ))
        })?;
        self.params.push(rendered);
        Ok(())
    }

    /// The joined value.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` when no parameter was added.
    pub fn value(&self) -> CoreResult<String> {
        if self.params.is_empty() {
            return Err(CoreError::invalid_operation("complex value has no parameters"));
        }
        Ok(self.params.join(&self.glue))
    }

    /// The joined value with a score, for sorted indexes.
    pub fn scored(&self, score: f64) -> CoreResult<ScoredValue> {
        Ok(ScoredValue::new(self.value()?, score))
    }
}

impl Default for ComplexValue {
    fn default() -> Self {
        Self::new()
    }
}
