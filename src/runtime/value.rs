//! Values flowing through reflection invocation.
//!
//! [`Value`] is the boxed form of everything a reflected method can receive or return: one
//! variant per primitive type, strings, enums (carrying their enum type), heap objects with
//! named fields, and delegates.

use std::{fmt, sync::Arc};

use dashmap::DashMap;

use crate::{metadata::typesystem::TypeRc, reflection::Delegate};

/// A reference to a heap `Object`
pub type ObjectRc = Arc<Object>;

/// A boxed runtime value
#[derive(Clone)]
pub enum Value {
    /// The null reference
    Null,
    /// `System.Boolean`
    Boolean(bool),
    /// `System.Char`
    Char(u16),
    /// `System.SByte`
    I1(i8),
    /// `System.Byte`
    U1(u8),
    /// `System.Int16`
    I2(i16),
    /// `System.UInt16`
    U2(u16),
    /// `System.Int32`
    I4(i32),
    /// `System.UInt32`
    U4(u32),
    /// `System.Int64`
    I8(i64),
    /// `System.UInt64`
    U8(u64),
    /// `System.Single`
    R4(f32),
    /// `System.Double`
    R8(f64),
    /// `System.IntPtr`
    I(isize),
    /// `System.UIntPtr`
    U(usize),
    /// `System.String`
    String(Arc<str>),
    /// A boxed enum value, tagged with its enum type
    Enum {
        /// The enum type
        ty: TypeRc,
        /// The raw integral value
        value: i64,
    },
    /// A heap object
    Object(ObjectRc),
    /// A delegate instance
    Delegate(Arc<Delegate>),
}

impl Value {
    /// Create a string value
    #[must_use]
    pub fn string(value: &str) -> Self {
        Value::String(Arc::from(value))
    }

    /// Is this the null reference
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The value as `i32`, if it is an `Int32`
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I4(value) => Some(*value),
            _ => None,
        }
    }

    /// The value as `i64`, widening the smaller integral types and enum values. `UInt64` and
    /// native integers only convert when they fit.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I1(value) => Some(i64::from(*value)),
            Value::U1(value) => Some(i64::from(*value)),
            Value::I2(value) => Some(i64::from(*value)),
            Value::U2(value) => Some(i64::from(*value)),
            Value::I4(value) => Some(i64::from(*value)),
            Value::U4(value) => Some(i64::from(*value)),
            Value::I8(value) | Value::Enum { value, .. } => Some(*value),
            Value::U8(value) => i64::try_from(*value).ok(),
            Value::I(value) => i64::try_from(*value).ok(),
            Value::U(value) => i64::try_from(*value).ok(),
            _ => None,
        }
    }

    /// The value as a string slice, if it is a `String`
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    /// The heap object, if this is an object reference
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRc> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::I1(a), Value::I1(b)) => a == b,
            (Value::U1(a), Value::U1(b)) => a == b,
            (Value::I2(a), Value::I2(b)) => a == b,
            (Value::U2(a), Value::U2(b)) => a == b,
            (Value::I4(a), Value::I4(b)) => a == b,
            (Value::U4(a), Value::U4(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::R4(a), Value::R4(b)) => a == b,
            (Value::R8(a), Value::R8(b)) => a == b,
            (Value::I(a), Value::I(b)) => a == b,
            (Value::U(a), Value::U(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (
                Value::Enum { ty, value },
                Value::Enum {
                    ty: other_ty,
                    value: other_value,
                },
            ) => ty.token == other_ty.token && value == other_value,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Delegate(a), Value::Delegate(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Char(value) => write!(f, "'\\u{value:04x}'"),
            Value::I1(value) => write!(f, "{value}"),
            Value::U1(value) => write!(f, "{value}"),
            Value::I2(value) => write!(f, "{value}"),
            Value::U2(value) => write!(f, "{value}"),
            Value::I4(value) => write!(f, "{value}"),
            Value::U4(value) => write!(f, "{value}U"),
            Value::I8(value) => write!(f, "{value}L"),
            Value::U8(value) => write!(f, "{value}UL"),
            Value::R4(value) => write!(f, "{value}f"),
            Value::R8(value) => write!(f, "{value}d"),
            Value::I(value) => write!(f, "{value}n"),
            Value::U(value) => write!(f, "{value}un"),
            Value::String(value) => write!(f, "{value:?}"),
            Value::Enum { ty, value } => write!(f, "{}({value})", ty.fullname()),
            Value::Object(object) => {
                write!(f, "{}@{:p}", object.ty.fullname(), Arc::as_ptr(object))
            }
            Value::Delegate(delegate) => write!(f, "{delegate:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<u8> for Value {
    fn from(value: u8) -> Self {
        Value::U1(value)
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Value::I2(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::I4(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I8(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::U8(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::R4(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::R8(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<ObjectRc> for Value {
    fn from(value: ObjectRc) -> Self {
        Value::Object(value)
    }
}

impl From<Delegate> for Value {
    fn from(value: Delegate) -> Self {
        Value::Delegate(Arc::new(value))
    }
}

/// An instance of a reference type, with named fields
pub struct Object {
    /// The exact runtime type of the object
    pub ty: TypeRc,
    fields: DashMap<String, Value>,
}

impl Object {
    /// Allocate a new object of type `ty` with no fields set
    #[must_use]
    pub fn new(ty: &TypeRc) -> ObjectRc {
        Arc::new(Object {
            ty: ty.clone(),
            fields: DashMap::new(),
        })
    }

    /// Read a field, `None` if it was never written
    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.get(name).map(|value| value.value().clone())
    }

    /// Write a field
    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("ty", &self.ty.fullname())
            .field("fields", &self.fields.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::typesystem::{CilPrimitiveKind, TypeBuilder, TypeRegistry};

    #[test]
    fn test_value_equality() -> crate::Result<()> {
        let registry = TypeRegistry::new();
        let widget = TypeBuilder::class("Demo", "Widget").build(&registry)?;
        let color =
            TypeBuilder::enumeration("Demo", "Color", CilPrimitiveKind::I4).build(&registry)?;
        let shade =
            TypeBuilder::enumeration("Demo", "Shade", CilPrimitiveKind::I4).build(&registry)?;

        assert_eq!(Value::from(5), Value::I4(5));
        assert_ne!(Value::I4(5), Value::I8(5));
        assert_eq!(Value::from("abc"), Value::string("abc"));
        assert_eq!(
            Value::Enum { ty: color.clone(), value: 1 },
            Value::Enum { ty: color.clone(), value: 1 }
        );
        assert_ne!(
            Value::Enum { ty: color, value: 1 },
            Value::Enum { ty: shade, value: 1 }
        );

        let first = Object::new(&widget);
        let second = Object::new(&widget);
        assert_eq!(Value::from(first.clone()), Value::from(first));
        assert_ne!(Value::Object(second), Value::Null);
        Ok(())
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::I4(3).as_i32(), Some(3));
        assert_eq!(Value::I4(3).as_i64(), Some(3));
        assert_eq!(Value::I8(-4).as_i64(), Some(-4));
        assert_eq!(Value::U1(200).as_i64(), Some(200));
        assert_eq!(Value::I2(-7).as_i64(), Some(-7));
        assert_eq!(Value::U8(u64::MAX).as_i64(), None);
        assert_eq!(Value::U1(1).as_i32(), None);
        assert_eq!(Value::from(2u8), Value::U1(2));
        assert_ne!(Value::from(2.0f32), Value::R8(2.0));
        assert_eq!(Value::string("x").as_str(), Some("x"));
        assert!(Value::Null.is_null());
        assert!(Value::Boolean(true).as_object().is_none());
    }

    #[test]
    fn test_object_fields() -> crate::Result<()> {
        let registry = TypeRegistry::new();
        let widget = TypeBuilder::class("Demo", "Widget").build(&registry)?;
        let object = Object::new(&widget);

        assert!(object.field("count").is_none());
        object.set_field("count", Value::I4(2));
        assert_eq!(object.field("count"), Some(Value::I4(2)));
        object.set_field("count", Value::I4(3));
        assert_eq!(object.field("count"), Some(Value::I4(3)));
        Ok(())
    }
}
