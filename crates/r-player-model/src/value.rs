//! ---
//! ems_section: "02-measurement-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Typed sample values and the raw-text conversion table."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fmt;

use chrono::NaiveDateTime;
use r_player_common::time::{format_timestamp, local_now, parse_timestamp};
use strum::{Display, EnumString};

use crate::errors::{ModelError, Result};

/// Primitive types a measurement point can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum DataType {
    Boolean,
    SByte,
    Byte,
    Int16,
    UInt16,
    #[strum(serialize = "Int32", serialize = "Integer")]
    Int32,
    #[strum(serialize = "UInt32", serialize = "UInteger")]
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    String,
    DateTime,
}

/// Parser stored in the conversion table.
pub type ParseFn = fn(&str) -> Option<Value>;

impl DataType {
    /// Raw text substituted when no value is supplied. `None` means "now".
    pub fn default_raw(self) -> Option<&'static str> {
        match self {
            DataType::Boolean => Some("false"),
            DataType::SByte
            | DataType::Byte
            | DataType::Int16
            | DataType::UInt16
            | DataType::Int32
            | DataType::UInt32
            | DataType::Int64
            | DataType::UInt64 => Some("0"),
            DataType::Float | DataType::Double => Some("0.0"),
            DataType::String => Some(""),
            DataType::DateTime => None,
        }
    }

    /// Conversion table entry for this type.
    pub fn parse_fn(self) -> ParseFn {
        match self {
            DataType::Boolean => parse_boolean,
            DataType::SByte => |raw| raw.trim().parse().ok().map(Value::SByte),
            DataType::Byte => |raw| raw.trim().parse().ok().map(Value::Byte),
            DataType::Int16 => |raw| raw.trim().parse().ok().map(Value::Int16),
            DataType::UInt16 => |raw| raw.trim().parse().ok().map(Value::UInt16),
            DataType::Int32 => |raw| raw.trim().parse().ok().map(Value::Int32),
            DataType::UInt32 => |raw| raw.trim().parse().ok().map(Value::UInt32),
            DataType::Int64 => |raw| raw.trim().parse().ok().map(Value::Int64),
            DataType::UInt64 => |raw| raw.trim().parse().ok().map(Value::UInt64),
            DataType::Float => |raw| raw.trim().parse().ok().map(Value::Float),
            DataType::Double => |raw| raw.trim().parse().ok().map(Value::Double),
            DataType::String => |raw| Some(Value::String(raw.to_owned())),
            DataType::DateTime => |raw| parse_timestamp(raw).ok().map(Value::DateTime),
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            DataType::Boolean | DataType::String | DataType::DateTime
        )
    }
}

fn parse_boolean(raw: &str) -> Option<Value> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Some(Value::Boolean(true)),
        "0" | "false" => Some(Value::Boolean(false)),
        _ => None,
    }
}

/// Value carried by a measurement sample.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    DateTime(NaiveDateTime),
}

impl Value {
    /// Convert raw text into a value of `data_type`, substituting the type default for `None`.
    pub fn create(raw: Option<&str>, data_type: DataType) -> Result<Value> {
        let parse = data_type.parse_fn();
        let parsed = match raw.or_else(|| data_type.default_raw()) {
            Some(text) => parse(text),
            None => Some(Value::DateTime(local_now())),
        };
        parsed.ok_or_else(|| ModelError::Conversion {
            raw: raw.unwrap_or_default().to_owned(),
            data_type,
        })
    }

    /// The value a freshly cleared point of `data_type` carries.
    pub fn default_for(data_type: DataType) -> Value {
        match data_type {
            DataType::Boolean => Value::Boolean(false),
            DataType::SByte => Value::SByte(0),
            DataType::Byte => Value::Byte(0),
            DataType::Int16 => Value::Int16(0),
            DataType::UInt16 => Value::UInt16(0),
            DataType::Int32 => Value::Int32(0),
            DataType::UInt32 => Value::UInt32(0),
            DataType::Int64 => Value::Int64(0),
            DataType::UInt64 => Value::UInt64(0),
            DataType::Float => Value::Float(0.0),
            DataType::Double => Value::Double(0.0),
            DataType::String => Value::String(String::new()),
            DataType::DateTime => Value::DateTime(local_now()),
        }
    }

    /// Store a computed number as `data_type`; integers are rounded and range checked.
    pub fn from_f64(number: f64, data_type: DataType) -> Result<Value> {
        let conversion = || ModelError::Conversion {
            raw: number.to_string(),
            data_type,
        };
        if !number.is_finite() && data_type != DataType::Double && data_type != DataType::Float {
            return Err(conversion());
        }
        let rounded = number.round();
        let in_range = |min: f64, max: f64| rounded >= min && rounded <= max;
        let value = match data_type {
            DataType::Double => Value::Double(number),
            DataType::Float => Value::Float(number as f32),
            DataType::Boolean => Value::Boolean(number != 0.0),
            DataType::String => Value::String(number.to_string()),
            DataType::SByte if in_range(i8::MIN as f64, i8::MAX as f64) => {
                Value::SByte(rounded as i8)
            }
            DataType::Byte if in_range(0.0, u8::MAX as f64) => Value::Byte(rounded as u8),
            DataType::Int16 if in_range(i16::MIN as f64, i16::MAX as f64) => {
                Value::Int16(rounded as i16)
            }
            DataType::UInt16 if in_range(0.0, u16::MAX as f64) => Value::UInt16(rounded as u16),
            DataType::Int32 if in_range(i32::MIN as f64, i32::MAX as f64) => {
                Value::Int32(rounded as i32)
            }
            DataType::UInt32 if in_range(0.0, u32::MAX as f64) => Value::UInt32(rounded as u32),
            DataType::Int64 if in_range(i64::MIN as f64, i64::MAX as f64) => {
                Value::Int64(rounded as i64)
            }
            DataType::UInt64 if in_range(0.0, u64::MAX as f64) => Value::UInt64(rounded as u64),
            _ => return Err(conversion()),
        };
        Ok(value)
    }

    /// Numeric view used when a formula reads another point.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Boolean(flag) => Some(if *flag { 1.0 } else { 0.0 }),
            Value::SByte(v) => Some(f64::from(*v)),
            Value::Byte(v) => Some(f64::from(*v)),
            Value::Int16(v) => Some(f64::from(*v)),
            Value::UInt16(v) => Some(f64::from(*v)),
            Value::Int32(v) => Some(f64::from(*v)),
            Value::UInt32(v) => Some(f64::from(*v)),
            Value::Int64(v) => Some(*v as f64),
            Value::UInt64(v) => Some(*v as f64),
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            Value::String(text) => text.trim().parse().ok(),
            Value::DateTime(_) => None,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Boolean(_) => DataType::Boolean,
            Value::SByte(_) => DataType::SByte,
            Value::Byte(_) => DataType::Byte,
            Value::Int16(_) => DataType::Int16,
            Value::UInt16(_) => DataType::UInt16,
            Value::Int32(_) => DataType::Int32,
            Value::UInt32(_) => DataType::UInt32,
            Value::Int64(_) => DataType::Int64,
            Value::UInt64(_) => DataType::UInt64,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::String(_) => DataType::String,
            Value::DateTime(_) => DataType::DateTime,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{v}"),
            Value::SByte(v) => write!(f, "{v}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::UInt16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Double(v) => write!(f, "{v:?}"),
            Value::String(v) => f.write_str(v),
            Value::DateTime(v) => f.write_str(&format_timestamp(v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_raw_text_per_declared_type() {
        assert_eq!(Value::create(Some("1.5"), DataType::Double).unwrap(), Value::Double(1.5));
        assert_eq!(Value::create(Some(" 42 "), DataType::Int32).unwrap(), Value::Int32(42));
        assert_eq!(Value::create(Some("1"), DataType::Boolean).unwrap(), Value::Boolean(true));
        assert_eq!(
            Value::create(Some("FALSE"), DataType::Boolean).unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(
            Value::create(Some("abc"), DataType::String).unwrap(),
            Value::String("abc".into())
        );
    }

    #[test]
    fn missing_raw_text_uses_type_default() {
        assert_eq!(Value::create(None, DataType::Int64).unwrap(), Value::Int64(0));
        assert_eq!(Value::create(None, DataType::Float).unwrap(), Value::Float(0.0));
        assert_eq!(Value::create(None, DataType::String).unwrap(), Value::String(String::new()));
        assert!(matches!(
            Value::create(None, DataType::DateTime).unwrap(),
            Value::DateTime(_)
        ));
    }

    #[test]
    fn malformed_text_is_a_conversion_error() {
        let err = Value::create(Some("1,5"), DataType::Double).unwrap_err();
        assert!(matches!(err, ModelError::Conversion { data_type: DataType::Double, .. }));
        assert!(Value::create(Some("300"), DataType::Byte).is_err());
        assert!(Value::create(Some("maybe"), DataType::Boolean).is_err());
    }

    #[test]
    fn integer_aliases_parse() {
        assert_eq!("Integer".parse::<DataType>(), Ok(DataType::Int32));
        assert_eq!("UInteger".parse::<DataType>(), Ok(DataType::UInt32));
        assert_eq!(DataType::Int32.to_string(), "Int32");
    }

    #[test]
    fn from_f64_rounds_and_checks_range() {
        assert_eq!(Value::from_f64(2.6, DataType::Int16).unwrap(), Value::Int16(3));
        assert!(Value::from_f64(-1.0, DataType::UInt32).is_err());
        assert!(Value::from_f64(f64::NAN, DataType::Int32).is_err());
        assert_eq!(Value::from_f64(0.0, DataType::Boolean).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn doubles_render_with_a_decimal_point() {
        assert_eq!(Value::Double(2.0).to_string(), "2.0");
        assert_eq!(Value::Double(1.5).to_string(), "1.5");
        assert_eq!(Value::Boolean(true).to_string(), "true");
    }
}
