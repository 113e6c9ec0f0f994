use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::Value;

/// Represents the supported data types in a table schema.
/// The set is closed; supporting a new type means extending the coercion
/// matrix in [DataType::coerce].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// A 64-bit signed integer.
    Int,
    /// A variable-length UTF-8 character string.
    Str,
    /// A calendar date (year, month, day).
    Date,
}

impl DataType {
    /// Coerces a raw value into this column type.
    ///
    /// Coercion is deliberately lenient across types: numeric text goes
    /// into an `INT` column, integers and dates render into a `STR` column,
    /// and `YYYY-MM-DD` text goes into a `DATE` column. After coercion a
    /// date is a calendar value, never a string, so predicate equality
    /// compares dates as dates.
    ///
    /// # Errors
    /// Returns [Error::Type] when an `INT` column receives non-numeric
    /// text, a `DATE` column receives text not matching `YYYY-MM-DD`, or
    /// the value has no rendering in this type. `Null` never coerces; it
    /// exists only as the backfill marker for added columns.
    pub fn coerce(self, value: Value) -> Result<Value> {
        match (self, value) {
            (Self::Int, Value::Int(i)) => Ok(Value::Int(i)),
            (Self::Int, Value::Str(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| Error::Type(format!("cannot coerce {s:?} to INT"))),
            (Self::Str, Value::Str(s)) => Ok(Value::Str(s)),
            (Self::Str, Value::Int(i)) => Ok(Value::Str(i.to_string().into())),
            (Self::Str, Value::Date(d)) => Ok(Value::Str(d.to_string().into())),
            (Self::Date, Value::Date(d)) => Ok(Value::Date(d)),
            (Self::Date, Value::Str(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|_| Error::Type(format!("cannot coerce {s:?} to DATE"))),
            (ty, value) => Err(Error::Type(format!("cannot coerce {value:?} to {ty}"))),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "INT"),
            Self::Str => write!(f, "STR"),
            Self::Date => write!(f, "DATE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_int_coercion() {
        assert_eq!(DataType::Int.coerce(Value::Int(42)).unwrap(), Value::Int(42));
        assert_eq!(
            DataType::Int.coerce(Value::Str("42".into())).unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            DataType::Int.coerce(Value::Str("-7".into())).unwrap(),
            Value::Int(-7)
        );
        assert!(DataType::Int.coerce(Value::Str("forty".into())).is_err());
        assert!(DataType::Int.coerce(Value::Str("4.2".into())).is_err());
        assert!(DataType::Int.coerce(Value::Date(date(2020, 1, 1))).is_err());
    }

    #[test]
    fn test_str_coercion() {
        assert_eq!(
            DataType::Str.coerce(Value::Str("hi".into())).unwrap(),
            Value::Str("hi".into())
        );
        assert_eq!(
            DataType::Str.coerce(Value::Int(5)).unwrap(),
            Value::Str("5".into())
        );
        assert_eq!(
            DataType::Str.coerce(Value::Date(date(1990, 4, 10))).unwrap(),
            Value::Str("1990-04-10".into())
        );
    }

    #[test]
    fn test_date_coercion() {
        assert_eq!(
            DataType::Date.coerce(Value::Str("1990-04-10".into())).unwrap(),
            Value::Date(date(1990, 4, 10))
        );
        assert_eq!(
            DataType::Date.coerce(Value::Date(date(2001, 2, 3))).unwrap(),
            Value::Date(date(2001, 2, 3))
        );
        assert!(DataType::Date.coerce(Value::Str("not-a-date".into())).is_err());
        assert!(DataType::Date.coerce(Value::Str("1990/04/10".into())).is_err());
        assert!(DataType::Date.coerce(Value::Int(19900410)).is_err());
    }

    #[test]
    fn test_null_never_coerces() {
        assert!(DataType::Int.coerce(Value::Null).is_err());
        assert!(DataType::Str.coerce(Value::Null).is_err());
        assert!(DataType::Date.coerce(Value::Null).is_err());
    }
}
