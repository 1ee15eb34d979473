//! Cell and parameter values.

use crate::error::{Error, Result};

/// A nullable database value.
///
/// Used both for cells read from a result set and for values bound to
/// placeholders of a prepared request. `Null` is the explicit null marker.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// SQL NULL
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Any integer type, widened to 64 bits
    Int(i64),
    /// Any floating point type, widened to 64 bits
    Float(f64),
    /// Text, also used for exact numerics under [`NumericalPrecisionPolicy::HighPrecision`]
    Text(String),
    /// Binary data
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns true for the explicit null marker.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Read as i64. Text is parsed, floats must be integral.
    pub fn to_i64(&self) -> Result<i64> {
        match self {
            Value::Int(v) => Ok(*v),
            Value::Bool(v) => Ok(i64::from(*v)),
            Value::Float(v) if v.fract() == 0.0 && v.is_finite() => Ok(*v as i64),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|e| Error::Decode(format!("invalid i64: {}", e))),
            other => Err(Error::Decode(format!("cannot read {:?} as i64", other))),
        }
    }

    /// Read as f64. Integers are widened, text is parsed.
    pub fn to_f64(&self) -> Result<f64> {
        match self {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|e| Error::Decode(format!("invalid f64: {}", e))),
            other => Err(Error::Decode(format!("cannot read {:?} as f64", other))),
        }
    }

    /// Read as bool.
    pub fn to_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(v) => Ok(*v),
            Value::Int(v) => Ok(*v != 0),
            Value::Text(s) => match s.as_str() {
                "t" | "true" | "TRUE" | "T" | "1" => Ok(true),
                "f" | "false" | "FALSE" | "F" | "0" => Ok(false),
                _ => Err(Error::Decode(format!("invalid boolean: {:?}", s))),
            },
            other => Err(Error::Decode(format!("cannot read {:?} as bool", other))),
        }
    }

    /// Borrow as text if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as bytes if this is a binary or text value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
            Value::Bytes(v) => {
                f.write_str("\\x")?;
                for b in v {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

// === Conversions for binding ===

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// How drivers materialize floating point and exact numeric cells.
///
/// Integer cells are never affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumericalPrecisionPolicy {
    /// Truncate to a 32-bit integer
    LowPrecisionInt32,
    /// Truncate to a 64-bit integer
    LowPrecisionInt64,
    /// Read as f64
    #[default]
    LowPrecisionDouble,
    /// Keep the exact textual representation
    HighPrecision,
}

impl NumericalPrecisionPolicy {
    /// Shape a floating point cell.
    pub fn apply_float(self, v: f64) -> Value {
        match self {
            Self::LowPrecisionInt32 => Value::Int(i64::from(v as i32)),
            Self::LowPrecisionInt64 => Value::Int(v as i64),
            Self::LowPrecisionDouble => Value::Float(v),
            Self::HighPrecision => Value::Text(v.to_string()),
        }
    }

    /// Shape an exact numeric cell given in its canonical decimal text form.
    pub fn apply_decimal(self, text: String) -> Result<Value> {
        if self == Self::HighPrecision {
            return Ok(Value::Text(text));
        }
        let v: f64 = text
            .parse()
            .map_err(|e| Error::Decode(format!("invalid numeric {:?}: {}", text, e)))?;
        Ok(self.apply_float(v))
    }
}

impl std::str::FromStr for NumericalPrecisionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "int32" | "low_int32" => Ok(Self::LowPrecisionInt32),
            "int64" | "low_int64" => Ok(Self::LowPrecisionInt64),
            "double" | "low_double" => Ok(Self::LowPrecisionDouble),
            "high" | "exact" => Ok(Self::HighPrecision),
            _ => Err(Error::InvalidUsage(format!(
                "Invalid precision: expected one of ['int32', 'int64', 'double', 'high'], got {}",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_text() {
        assert!(Value::from("t").to_bool().unwrap());
        assert!(Value::from("true").to_bool().unwrap());
        assert!(!Value::from("f").to_bool().unwrap());
        assert!(Value::from("maybe").to_bool().is_err());
    }

    #[test]
    fn test_i64_from_text_and_float() {
        assert_eq!(Value::from("12345").to_i64().unwrap(), 12345);
        assert_eq!(Value::Float(3.0).to_i64().unwrap(), 3);
        assert!(Value::Float(3.5).to_i64().is_err());
        assert!(Value::Null.to_i64().is_err());
    }

    #[test]
    fn test_option_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(42)), Value::Int(42));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::Bytes(vec![0xDE, 0xAD]).to_string(), "\\xdead");
    }

    #[test]
    fn test_precision_float() {
        let v = 12.75;
        assert_eq!(
            NumericalPrecisionPolicy::LowPrecisionInt32.apply_float(v),
            Value::Int(12)
        );
        assert_eq!(
            NumericalPrecisionPolicy::LowPrecisionInt64.apply_float(-v),
            Value::Int(-12)
        );
        assert_eq!(
            NumericalPrecisionPolicy::LowPrecisionDouble.apply_float(v),
            Value::Float(12.75)
        );
        assert_eq!(
            NumericalPrecisionPolicy::HighPrecision.apply_float(v),
            Value::Text("12.75".into())
        );
    }

    #[test]
    fn test_precision_decimal() {
        let exact = "12345678901234567890.123456789".to_string();
        assert_eq!(
            NumericalPrecisionPolicy::HighPrecision
                .apply_decimal(exact.clone())
                .unwrap(),
            Value::Text(exact)
        );
        assert_eq!(
            NumericalPrecisionPolicy::LowPrecisionInt64
                .apply_decimal("42.9".into())
                .unwrap(),
            Value::Int(42)
        );
    }

    #[test]
    fn test_precision_from_str() {
        assert_eq!(
            "high".parse::<NumericalPrecisionPolicy>().unwrap(),
            NumericalPrecisionPolicy::HighPrecision
        );
        assert!("bogus".parse::<NumericalPrecisionPolicy>().is_err());
    }
}
