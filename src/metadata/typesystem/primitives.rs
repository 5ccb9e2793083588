use strum::{EnumCount, EnumIter};

use crate::metadata::{token::Token, typesystem::CilFlavor};

/// The built-in types every runtime environment seeds its registry with.
///
/// Each kind has a fixed artificial token so the core library types can be looked up without
/// going through name resolution. The discriminant doubles as an index into the registry's
/// primitive table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
#[repr(usize)]
pub enum CilPrimitiveKind {
    /// System.Void - no value
    Void,
    /// System.Boolean - true or false
    Boolean,
    /// System.Char - UTF-16 code unit
    Char,
    /// System.SByte - signed 8-bit integer
    I1,
    /// System.Byte - unsigned 8-bit integer
    U1,
    /// System.Int16 - signed 16-bit integer
    I2,
    /// System.UInt16 - unsigned 16-bit integer
    U2,
    /// System.Int32 - signed 32-bit integer
    I4,
    /// System.UInt32 - unsigned 32-bit integer
    U4,
    /// System.Int64 - signed 64-bit integer
    I8,
    /// System.UInt64 - unsigned 64-bit integer
    U8,
    /// System.Single - 32-bit floating point
    R4,
    /// System.Double - 64-bit floating point
    R8,
    /// System.IntPtr - native sized signed integer
    I,
    /// System.UIntPtr - native sized unsigned integer
    U,
    /// System.Object - base class for all reference types
    Object,
    /// System.String - immutable string of Unicode characters
    String,
    /// System.TypedReference - type-safe pointer (used by compiler)
    TypedReference,
    /// System.ValueType - base class for value types
    ValueType,
}

impl CilPrimitiveKind {
    /// Get the token for this type
    #[must_use]
    pub fn token(&self) -> Token {
        Token::new(match self {
            CilPrimitiveKind::Void => 0xF000_0001,
            CilPrimitiveKind::Boolean => 0xF000_0002,
            CilPrimitiveKind::Char => 0xF000_0003,
            CilPrimitiveKind::I1 => 0xF000_0004,
            CilPrimitiveKind::U1 => 0xF000_0005,
            CilPrimitiveKind::I2 => 0xF000_0006,
            CilPrimitiveKind::U2 => 0xF000_0007,
            CilPrimitiveKind::I4 => 0xF000_0008,
            CilPrimitiveKind::U4 => 0xF000_0009,
            CilPrimitiveKind::I8 => 0xF000_000A,
            CilPrimitiveKind::U8 => 0xF000_000B,
            CilPrimitiveKind::R4 => 0xF000_000C,
            CilPrimitiveKind::R8 => 0xF000_000D,
            CilPrimitiveKind::I => 0xF000_000E,
            CilPrimitiveKind::U => 0xF000_000F,
            CilPrimitiveKind::Object => 0xF000_0010,
            CilPrimitiveKind::String => 0xF000_0011,
            CilPrimitiveKind::TypedReference => 0xF000_0012,
            CilPrimitiveKind::ValueType => 0xF000_0013,
        })
    }

    /// Get the short name (without namespace)
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            CilPrimitiveKind::Void => "Void",
            CilPrimitiveKind::Boolean => "Boolean",
            CilPrimitiveKind::Char => "Char",
            CilPrimitiveKind::I1 => "SByte",
            CilPrimitiveKind::U1 => "Byte",
            CilPrimitiveKind::I2 => "Int16",
            CilPrimitiveKind::U2 => "UInt16",
            CilPrimitiveKind::I4 => "Int32",
            CilPrimitiveKind::U4 => "UInt32",
            CilPrimitiveKind::I8 => "Int64",
            CilPrimitiveKind::U8 => "UInt64",
            CilPrimitiveKind::R4 => "Single",
            CilPrimitiveKind::R8 => "Double",
            CilPrimitiveKind::I => "IntPtr",
            CilPrimitiveKind::U => "UIntPtr",
            CilPrimitiveKind::Object => "Object",
            CilPrimitiveKind::String => "String",
            CilPrimitiveKind::TypedReference => "TypedReference",
            CilPrimitiveKind::ValueType => "ValueType",
        }
    }

    /// Get the namespace of this type
    #[must_use]
    pub fn namespace(&self) -> &'static str {
        "System"
    }

    /// Convert to `CilFlavor`
    #[must_use]
    pub fn to_flavor(&self) -> CilFlavor {
        match self {
            CilPrimitiveKind::Void => CilFlavor::Void,
            CilPrimitiveKind::Boolean => CilFlavor::Boolean,
            CilPrimitiveKind::Char => CilFlavor::Char,
            CilPrimitiveKind::I1 => CilFlavor::I1,
            CilPrimitiveKind::U1 => CilFlavor::U1,
            CilPrimitiveKind::I2 => CilFlavor::I2,
            CilPrimitiveKind::U2 => CilFlavor::U2,
            CilPrimitiveKind::I4 => CilFlavor::I4,
            CilPrimitiveKind::U4 => CilFlavor::U4,
            CilPrimitiveKind::I8 => CilFlavor::I8,
            CilPrimitiveKind::U8 => CilFlavor::U8,
            CilPrimitiveKind::R4 => CilFlavor::R4,
            CilPrimitiveKind::R8 => CilFlavor::R8,
            CilPrimitiveKind::I => CilFlavor::I,
            CilPrimitiveKind::U => CilFlavor::U,
            CilPrimitiveKind::Object => CilFlavor::Object,
            CilPrimitiveKind::String => CilFlavor::String,
            CilPrimitiveKind::TypedReference | CilPrimitiveKind::ValueType => CilFlavor::ValueType,
        }
    }

    /// Is this one of the integral types an enum may use as its underlying type
    #[must_use]
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            CilPrimitiveKind::Boolean
                | CilPrimitiveKind::Char
                | CilPrimitiveKind::I1
                | CilPrimitiveKind::U1
                | CilPrimitiveKind::I2
                | CilPrimitiveKind::U2
                | CilPrimitiveKind::I4
                | CilPrimitiveKind::U4
                | CilPrimitiveKind::I8
                | CilPrimitiveKind::U8
                | CilPrimitiveKind::I
                | CilPrimitiveKind::U
        )
    }

    /// Is this a value type
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        !matches!(
            self,
            CilPrimitiveKind::Void | CilPrimitiveKind::Object | CilPrimitiveKind::String
        )
    }

    /// Look up the kind that owns `token`, if it is one of the fixed primitive tokens
    #[must_use]
    pub fn from_token(token: Token) -> Option<Self> {
        use strum::IntoEnumIterator;

        CilPrimitiveKind::iter().find(|kind| kind.token() == token)
    }
}
