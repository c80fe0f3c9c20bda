use std::fmt::{Display, Formatter};

/// Opaque identity handle for a structured heap object of the candidate.
///
/// Handles are assigned by the [`ObjectModel`][crate::model::ObjectModel] on
/// first sight of an object and compare by id, reproducing "same object"
/// semantics as opposed to "equal value".
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ObjRef(u64);

impl ObjRef {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Return the raw identity id.
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl Display for ObjRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A dynamically-typed value produced by origin resolution.
///
/// Primitives and strings are value-typed; structured heap objects are
/// [`Value::Ref`] handles resolved through the object model. Only `Ref`
/// values participate in alias/identity reasoning.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Char(char),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Ref(ObjRef),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_obj(&self) -> Option<ObjRef> {
        match self {
            Value::Ref(obj) => Some(*obj),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(x) => Some(*x),
            _ => None,
        }
    }

    /// Numeric magnitude as `f64`, for near-miss penalties.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Byte(x) => Some(*x as f64),
            Value::Short(x) => Some(*x as f64),
            Value::Char(c) => Some(*c as u32 as f64),
            Value::Int(x) => Some(*x as f64),
            Value::Long(x) => Some(*x as f64),
            Value::Float(x) => Some(*x as f64),
            Value::Double(x) => Some(*x),
            _ => None,
        }
    }

    /// Short tag for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Char(_) => "char",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Str(_) => "string",
            Value::Ref(_) => "object",
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(x) => write!(f, "{}", x),
            Value::Byte(x) => write!(f, "{}", x),
            Value::Short(x) => write!(f, "{}", x),
            Value::Char(c) => write!(f, "'{}'", c),
            Value::Int(x) => write!(f, "{}", x),
            Value::Long(x) => write!(f, "{}L", x),
            Value::Float(x) => write!(f, "{}f", x),
            Value::Double(x) => write!(f, "{}d", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Ref(obj) => write!(f, "{}", obj),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_by_id() {
        let a = ObjRef::new(1);
        let b = ObjRef::new(1);
        let c = ObjRef::new(2);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(Value::Int(7).as_f64(), Some(7.0));
        assert_eq!(Value::Long(-3).as_f64(), Some(-3.0));
        assert_eq!(Value::Str("x".to_string()).as_f64(), None);
        assert_eq!(Value::Null.as_f64(), None);
    }
}
