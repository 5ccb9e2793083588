use std::sync::{Arc, Weak};

use bitflags::bitflags;

use crate::metadata::{
    token::Token,
    typesystem::{RuntimeType, TypeRc},
};

/// A vector that holds `TypeRef` instances (weak references)
pub type TypeRefList = Arc<boxcar::Vec<TypeRef>>;

/// A smart reference to a `RuntimeType` that automatically handles weak references
/// to prevent circular reference memory leaks while providing a clean API
#[derive(Clone, Debug)]
pub struct TypeRef {
    weak_ref: Weak<RuntimeType>,
}

impl TypeRef {
    /// Create a new `TypeRef` from a strong reference
    pub fn new(strong_ref: &TypeRc) -> Self {
        Self {
            weak_ref: Arc::downgrade(strong_ref),
        }
    }

    /// Get a strong reference to the type, returning None if the type has been dropped
    #[must_use]
    pub fn upgrade(&self) -> Option<TypeRc> {
        self.weak_ref.upgrade()
    }

    /// Check if the referenced type is still alive
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.weak_ref.strong_count() > 0
    }

    /// Get the token of the referenced type (if still alive)
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        self.upgrade().map(|t| t.token)
    }
}

impl From<TypeRc> for TypeRef {
    fn from(strong_ref: TypeRc) -> Self {
        Self::new(&strong_ref)
    }
}

impl From<&TypeRc> for TypeRef {
    fn from(strong_ref: &TypeRc) -> Self {
        Self::new(strong_ref)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// The subset of `TypeAttributes` (§II.23.1.15) reflection cares about
    pub struct TypeAttributes: u32 {
        /// Type is public
        const PUBLIC = 0x0000_0001;
        /// Type is an interface
        const INTERFACE = 0x0000_0020;
        /// Type is abstract
        const ABSTRACT = 0x0000_0080;
        /// Type cannot be derived from
        const SEALED = 0x0000_0100;
        /// Type has a special name
        const SPECIAL_NAME = 0x0000_0400;
    }
}

#[allow(missing_docs)]
/// Represents the structural kind of a type
#[derive(Debug, Clone, PartialEq)]
pub enum CilFlavor {
    // Base primitive types
    Void,
    Boolean,
    Char,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    I,
    U,
    Object,
    String,

    // Constructed types, the element type is stored on the `RuntimeType`
    Array {
        /// The rank (number of dimensions)
        rank: u32,
    },
    Pointer,
    ByRef,
    GenericInstance,
    GenericParameter {
        /// Index in the generic parameters list
        index: u32,
        /// Whether it's a method parameter (true) or type parameter (false)
        method: bool,
    },

    // Type categories
    Class,
    ValueType,
    Interface,

    // Fallback
    Unknown,
}

impl CilFlavor {
    /// Check if this is a primitive type
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            CilFlavor::Void
                | CilFlavor::Boolean
                | CilFlavor::Char
                | CilFlavor::I1
                | CilFlavor::U1
                | CilFlavor::I2
                | CilFlavor::U2
                | CilFlavor::I4
                | CilFlavor::U4
                | CilFlavor::I8
                | CilFlavor::U8
                | CilFlavor::R4
                | CilFlavor::R8
                | CilFlavor::I
                | CilFlavor::U
                | CilFlavor::Object
                | CilFlavor::String
        )
    }

    /// Check if this is a value type
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            CilFlavor::Boolean
                | CilFlavor::Char
                | CilFlavor::I1
                | CilFlavor::U1
                | CilFlavor::I2
                | CilFlavor::U2
                | CilFlavor::I4
                | CilFlavor::U4
                | CilFlavor::I8
                | CilFlavor::U8
                | CilFlavor::R4
                | CilFlavor::R8
                | CilFlavor::I
                | CilFlavor::U
                | CilFlavor::ValueType
        )
    }

    /// Check if this is a reference type
    #[must_use]
    pub fn is_reference_type(&self) -> bool {
        matches!(
            self,
            CilFlavor::Object
                | CilFlavor::String
                | CilFlavor::Class
                | CilFlavor::Interface
                | CilFlavor::Array { .. }
        )
    }

    /// Check if values of this flavor wrap another type (by-ref, pointer, array)
    #[must_use]
    pub fn has_element_type(&self) -> bool {
        matches!(
            self,
            CilFlavor::ByRef | CilFlavor::Pointer | CilFlavor::Array { .. }
        )
    }
}
