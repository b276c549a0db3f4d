//! Dex type descriptors.

use crate::errors::{DexError, DexResult};
use std::convert::TryFrom;
use std::fmt;

/// A type, as written in descriptors (`I`, `[B`, `Ljava/lang/String;`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    Void,
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    /// Array of the given dimension; at most 255 dimensions are legal.
    Array(usize, Box<Self>),
    /// Class type with its internal name (`java/lang/String`).
    Class(String),
}

impl Type {
    /// Builds the type of a class from its qualified name.
    #[must_use]
    pub fn class(qualified: &str) -> Self {
        Self::Class(qualified.replace('.', "/"))
    }

    /// Returns the java representation (`int[]`, `java.lang.String`).
    #[must_use]
    pub fn to_java_string(&self) -> String {
        match self {
            Self::Void => "void".to_string(),
            Self::Boolean => "boolean".to_string(),
            Self::Byte => "byte".to_string(),
            Self::Short => "short".to_string(),
            Self::Char => "char".to_string(),
            Self::Int => "int".to_string(),
            Self::Long => "long".to_string(),
            Self::Float => "float".to_string(),
            Self::Double => "double".to_string(),
            Self::Array(n, inner) => format!("{}{}", inner.to_java_string(), "[]".repeat(*n)),
            Self::Class(name) => name.replace('/', "."),
        }
    }

    /// Returns the qualified name of a class type, [`None`] for other types.
    #[must_use]
    pub fn class_name(&self) -> Option<String> {
        match self {
            Self::Class(name) => Some(name.replace('/', ".")),
            _ => None,
        }
    }

    /// Character of the type in a prototype shorty.
    #[must_use]
    pub fn shorty(&self) -> char {
        match self {
            Self::Array(_, _) | Self::Class(_) => 'L',
            other => other.to_string().chars().next().unwrap_or('V'),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Void => write!(f, "V"),
            Self::Boolean => write!(f, "Z"),
            Self::Byte => write!(f, "B"),
            Self::Short => write!(f, "S"),
            Self::Char => write!(f, "C"),
            Self::Int => write!(f, "I"),
            Self::Long => write!(f, "J"),
            Self::Float => write!(f, "F"),
            Self::Double => write!(f, "D"),
            Self::Array(n, inner) => write!(f, "{}{inner}", "[".repeat(*n)),
            Self::Class(name) => write!(f, "L{name};"),
        }
    }
}

impl TryFrom<&str> for Type {
    type Error = DexError;

    fn try_from(s: &str) -> DexResult<Self> {
        let invalid = || DexError::InvalidDescriptor(s.to_string());

        let dims = s.bytes().take_while(|b| *b == b'[').count();
        if dims > 255 {
            return Err(invalid());
        }
        let base = match &s[dims..] {
            "V" if dims == 0 => Self::Void,
            "Z" => Self::Boolean,
            "B" => Self::Byte,
            "S" => Self::Short,
            "C" => Self::Char,
            "I" => Self::Int,
            "J" => Self::Long,
            "F" => Self::Float,
            "D" => Self::Double,
            class if class.len() > 2 && class.starts_with('L') && class.ends_with(';') => {
                Self::Class(class[1..class.len() - 1].to_string())
            }
            _ => return Err(invalid()),
        };
        if dims == 0 {
            Ok(base)
        } else {
            Ok(Self::Array(dims, Box::new(base)))
        }
    }
}

/// Converts a descriptor to its java form, keeping malformed descriptors
/// as they are.
#[must_use]
pub fn java_name(descriptor: &str) -> String {
    Type::try_from(descriptor).map_or_else(|_| descriptor.to_string(), |t| t.to_java_string())
}

/// Splits a method descriptor `(params)ret` into its parameter and return
/// types.
pub fn split_method_descriptor(descriptor: &str) -> DexResult<(Vec<Type>, Type)> {
    let invalid = || DexError::InvalidDescriptor(descriptor.to_string());
    let inner = descriptor.strip_prefix('(').ok_or_else(invalid)?;
    let (params, ret) = inner.split_once(')').ok_or_else(invalid)?;

    let mut types = Vec::new();
    let mut rest = params;
    while !rest.is_empty() {
        let dims = rest.bytes().take_while(|b| *b == b'[').count();
        let end = match rest.as_bytes().get(dims) {
            Some(b'L') => rest.find(';').ok_or_else(invalid)? + 1,
            Some(_) => dims + 1,
            None => return Err(invalid()),
        };
        types.push(Type::try_from(&rest[..end])?);
        rest = &rest[end..];
    }
    Ok((types, Type::try_from(ret)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors() {
        let t = Type::try_from("[[Ljava/lang/String;").unwrap();
        assert_eq!(t.to_java_string(), "java.lang.String[][]");
        assert_eq!(t.to_string(), "[[Ljava/lang/String;");
        assert_eq!(t.shorty(), 'L');
        assert_eq!(Type::try_from("J").unwrap().shorty(), 'J');
        assert_eq!(
            Type::class("com.example.Main").to_string(),
            "Lcom/example/Main;"
        );
        assert!(Type::try_from("").is_err());
        assert!(Type::try_from("[V").is_err());
        assert!(Type::try_from("L;").is_err());
        assert_eq!(java_name("Landroid/app/Activity;"), "android.app.Activity");
        assert_eq!(java_name("bogus"), "bogus");
    }

    #[test]
    fn method_descriptors() {
        let (params, ret) = split_method_descriptor("(I[JLjava/lang/String;)V").unwrap();
        assert_eq!(
            params,
            vec![
                Type::Int,
                Type::Array(1, Box::new(Type::Long)),
                Type::Class("java/lang/String".to_string())
            ]
        );
        assert_eq!(ret, Type::Void);
        assert!(split_method_descriptor("I)V").is_err());
        assert!(split_method_descriptor("(Ljava/lang)V").is_err());
    }
}
