//! Typed values (`Res_value`) found in binary XML attributes and resource
//! table entries.

use crate::errors::{ResourcesError, ResourcesResult};
use crate::strings::StringPool;
use serde::Serialize;
use std::fmt;

/// A decoded typed value.
///
/// String values are resolved against their string pool when decoded, so a
/// `Value` never refers back to the pool it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Value {
    Null,
    Reference(u32),
    Attribute(u32),
    String(String),
    Float(f32),
    Dimension(u32),
    Fraction(u32),
    IntDec(i32),
    IntHex(u32),
    Boolean(bool),
    ColorArgb8(u32),
    ColorRgb8(u32),
    ColorArgb4(u32),
    ColorRgb4(u32),
}

pub(crate) const TYPE_NULL: u8 = 0x00;
pub(crate) const TYPE_REFERENCE: u8 = 0x01;
pub(crate) const TYPE_ATTRIBUTE: u8 = 0x02;
pub(crate) const TYPE_STRING: u8 = 0x03;
pub(crate) const TYPE_FLOAT: u8 = 0x04;
pub(crate) const TYPE_DIMENSION: u8 = 0x05;
pub(crate) const TYPE_FRACTION: u8 = 0x06;
pub(crate) const TYPE_INT_DEC: u8 = 0x10;
pub(crate) const TYPE_INT_HEX: u8 = 0x11;
pub(crate) const TYPE_INT_BOOLEAN: u8 = 0x12;
pub(crate) const TYPE_INT_COLOR_ARGB8: u8 = 0x1c;
pub(crate) const TYPE_INT_COLOR_RGB8: u8 = 0x1d;
pub(crate) const TYPE_INT_COLOR_ARGB4: u8 = 0x1e;
pub(crate) const TYPE_INT_COLOR_RGB4: u8 = 0x1f;

impl Value {
    /// Builds a value from its raw type tag and data word.
    pub(crate) fn decode(typ: u8, data: u32, pool: &StringPool) -> ResourcesResult<Self> {
        let value = match typ {
            TYPE_NULL => Self::Null,
            TYPE_REFERENCE => Self::Reference(data),
            TYPE_ATTRIBUTE => Self::Attribute(data),
            TYPE_STRING => Self::String(pool.get(data)?.to_string()),
            TYPE_FLOAT => Self::Float(f32::from_bits(data)),
            TYPE_DIMENSION => Self::Dimension(data),
            TYPE_FRACTION => Self::Fraction(data),
            TYPE_INT_DEC => Self::IntDec(data as i32),
            TYPE_INT_HEX => Self::IntHex(data),
            TYPE_INT_BOOLEAN => Self::Boolean(data != 0),
            TYPE_INT_COLOR_ARGB8 => Self::ColorArgb8(data),
            TYPE_INT_COLOR_RGB8 => Self::ColorRgb8(data),
            TYPE_INT_COLOR_ARGB4 => Self::ColorArgb4(data),
            TYPE_INT_COLOR_RGB4 => Self::ColorRgb4(data),
            other => return Err(ResourcesError::UnknownValueType(other)),
        };
        Ok(value)
    }

    #[cfg_attr(not(any(test, feature = "writer")), allow(dead_code))]
    pub(crate) const fn type_tag(&self) -> u8 {
        match self {
            Self::Null => TYPE_NULL,
            Self::Reference(_) => TYPE_REFERENCE,
            Self::Attribute(_) => TYPE_ATTRIBUTE,
            Self::String(_) => TYPE_STRING,
            Self::Float(_) => TYPE_FLOAT,
            Self::Dimension(_) => TYPE_DIMENSION,
            Self::Fraction(_) => TYPE_FRACTION,
            Self::IntDec(_) => TYPE_INT_DEC,
            Self::IntHex(_) => TYPE_INT_HEX,
            Self::Boolean(_) => TYPE_INT_BOOLEAN,
            Self::ColorArgb8(_) => TYPE_INT_COLOR_ARGB8,
            Self::ColorRgb8(_) => TYPE_INT_COLOR_RGB8,
            Self::ColorArgb4(_) => TYPE_INT_COLOR_ARGB4,
            Self::ColorRgb4(_) => TYPE_INT_COLOR_RGB4,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Interprets the value as a boolean; strings `"true"`/`"false"` are
    /// accepted since some packers emit them untyped.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            Self::IntDec(i) => Some(*i != 0),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::IntDec(i) => u32::try_from(*i).ok(),
            Self::IntHex(i) => Some(*i),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_reference(&self) -> Option<u32> {
        match self {
            Self::Reference(r) => Some(*r),
            _ => None,
        }
    }
}

const DIMENSION_UNITS: [&str; 6] = ["px", "dip", "sp", "pt", "in", "mm"];
const FRACTION_UNITS: [&str; 2] = ["%", "%p"];
const RADIX_MULTS: [f32; 4] = [
    1.0 / 256.0,
    1.0 / 32_768.0,
    1.0 / 8_388_608.0,
    1.0 / 2_147_483_648.0,
];

/// Converts a complex (dimension or fraction) data word to a float.
#[allow(clippy::cast_precision_loss)]
fn complex_to_f32(data: u32) -> f32 {
    let mantissa = (data & 0xffff_ff00) as i32;
    let radix = ((data >> 4) & 0x3) as usize;
    mantissa as f32 * RADIX_MULTS[radix]
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Null => write!(f, "@null"),
            Self::Reference(r) => write!(f, "@{r:#010x}"),
            Self::Attribute(a) => write!(f, "?{a:#010x}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Dimension(d) => {
                let unit = DIMENSION_UNITS.get((d & 0xf) as usize).unwrap_or(&"?");
                write!(f, "{}{unit}", complex_to_f32(*d))
            }
            Self::Fraction(d) => {
                let unit = FRACTION_UNITS.get((d & 0xf) as usize).unwrap_or(&"?");
                write!(f, "{}{unit}", complex_to_f32(*d) * 100.0)
            }
            Self::IntDec(i) => write!(f, "{i}"),
            Self::IntHex(i) => write!(f, "{i:#x}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::ColorArgb8(c) | Self::ColorRgb8(c) | Self::ColorArgb4(c) | Self::ColorRgb4(c) => {
                write!(f, "#{c:08x}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> StringPool {
        StringPool {
            sorted: false,
            utf8: false,
            strings: vec!["hello".to_string()],
        }
    }

    #[test]
    fn decode_typed_values() {
        let pool = pool();
        assert_eq!(
            Value::decode(TYPE_STRING, 0, &pool).unwrap(),
            Value::String("hello".to_string())
        );
        assert_eq!(
            Value::decode(TYPE_INT_BOOLEAN, 0xffff_ffff, &pool).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            Value::decode(TYPE_INT_DEC, 0xffff_ffff, &pool).unwrap(),
            Value::IntDec(-1)
        );
        assert_eq!(
            Value::decode(0x42, 0, &pool),
            Err(ResourcesError::UnknownValueType(0x42))
        );
        assert!(Value::decode(TYPE_STRING, 3, &pool).is_err());
    }

    #[test]
    fn display_values() {
        assert_eq!(Value::Reference(0x7f04_0001).to_string(), "@0x7f040001");
        // 16dip
        assert_eq!(Value::Dimension((16 << 8) | 1).to_string(), "16dip");
        assert_eq!(Value::ColorRgb8(0xff00_ff00).to_string(), "#ff00ff00");
    }

    #[test]
    fn value_conversions() {
        assert_eq!(Value::String("true".to_string()).as_bool(), Some(true));
        assert_eq!(Value::IntDec(0).as_bool(), Some(false));
        assert_eq!(Value::String("12".to_string()).as_u32(), Some(12));
        assert_eq!(Value::IntDec(-3).as_u32(), None);
    }
}
