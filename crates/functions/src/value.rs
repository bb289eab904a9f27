use crate::error::{Error, Result};
use core::fmt;

/// Kind tag of an evaluated expression value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Int,
    Float,
    Boolean,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::String => "STRING",
            ValueKind::Int => "INT",
            ValueKind::Float => "FLOAT",
            ValueKind::Boolean => "BOOLEAN",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating an expression. The kind is fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Boolean(bool),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Boolean(_) => ValueKind::Boolean,
        }
    }

    /// Stringified form; never fails.
    pub fn as_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(mismatch(ValueKind::Int, other)),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Float(f) => Ok(*f),
            other => Err(mismatch(ValueKind::Float, other)),
        }
    }

    pub fn as_boolean(&self) -> Result<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            other => Err(mismatch(ValueKind::Boolean, other)),
        }
    }
}

fn mismatch(expected: ValueKind, actual: &Value) -> Error {
    Error::type_mismatch(format!(
        "expected {expected} value but found {} ({})",
        actual.kind(),
        actual.as_string()
    ))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use rstest::rstest;

    #[rstest]
    #[case(Value::from("abc"), "abc")]
    #[case(Value::from(42_i64), "42")]
    #[case(Value::from(1.5_f64), "1.5")]
    #[case(Value::from(true), "true")]
    fn as_string_is_total(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(value.as_string(), expected);
    }

    #[test]
    fn int_is_not_widened_to_float() {
        let err = Value::Int(3).as_float().unwrap_err();
        assert_eq!(err.code, ErrorCode::TypeMismatch);
    }

    #[rstest]
    #[case(Value::from("1"))]
    #[case(Value::from(1.0_f64))]
    #[case(Value::from(false))]
    fn as_int_rejects_other_kinds(#[case] value: Value) {
        assert_eq!(value.as_int().unwrap_err().code, ErrorCode::TypeMismatch);
    }

    #[test]
    fn matching_accessors_succeed() {
        assert_eq!(Value::Int(-7).as_int().unwrap(), -7);
        assert!(Value::Boolean(true).as_boolean().unwrap());
        assert!((Value::Float(2.25).as_float().unwrap() - 2.25).abs() < f64::EPSILON);
        assert_eq!(Value::from("x").kind(), ValueKind::String);
    }
}
