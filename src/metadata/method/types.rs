//! Method attribute flags, calling conventions and handles.
//!
//! Method attributes are split into logical groups the same way the metadata tables lay them
//! out: access, vtable layout and modifiers, plus the implementation code type. Each group
//! extracts itself from a raw attribute word, and [`MethodAttributes`] recombines them into the
//! single value surfaced through [`crate::reflection::MethodBase::attributes`].
//!
//! # Key Types
//! - [`MethodAccessFlags`], [`MethodVtableFlags`], [`MethodModifiers`]: Attribute flags
//! - [`MethodImplCodeType`]: Implementation flags
//! - [`CallingConventions`]: Managed calling convention flags
//! - [`MethodHandle`]: Opaque runtime handle used for low-level dispatch

use std::fmt;

use bitflags::bitflags;

/// Bitmask for `CODE_TYPE` extraction
pub const METHOD_IMPL_CODE_TYPE_MASK: u32 = 0x0003;
/// Bitmask for `ACCESS` state extraction
pub const METHOD_ACCESS_MASK: u32 = 0x0007;
/// Bitmask for `VTABLE_LAYOUT` information extraction
pub const METHOD_VTABLE_LAYOUT_MASK: u32 = 0x0100;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method implementation code type flags
    pub struct MethodImplCodeType: u32 {
        /// Method impl is IL
        const IL = 0x0000;
        /// Method impl is native
        const NATIVE = 0x0001;
        /// Method impl is OPTIL
        const OPTIL = 0x0002;
        /// Method impl is provided by the runtime
        const RUNTIME = 0x0003;
    }
}

impl MethodImplCodeType {
    /// Extract code type from raw implementation flags
    #[must_use]
    pub fn from_impl_flags(flags: u32) -> Self {
        let code_type = flags & METHOD_IMPL_CODE_TYPE_MASK;
        Self::from_bits_truncate(code_type)
    }
}

// Method attributes split into logical groups
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method access flags
    pub struct MethodAccessFlags: u32 {
        /// Member not referenceable
        const COMPILER_CONTROLLED = 0x0000;
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this Assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessibly by anyone in the Assembly
        const ASSEM = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessibly by sub-types anywhere, plus anyone in assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessibly by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
    }
}

impl MethodAccessFlags {
    /// Extract access flags from raw method attributes
    #[must_use]
    pub fn from_method_flags(flags: u32) -> Self {
        let access = flags & METHOD_ACCESS_MASK;
        Self::from_bits_truncate(access)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method vtable layout flags
    pub struct MethodVtableFlags: u32 {
        /// Method reuses existing slot in vtable
        const REUSE_SLOT = 0x0000;
        /// Method always gets a new slot in the vtable
        const NEW_SLOT = 0x0100;
    }
}

impl MethodVtableFlags {
    /// Extract vtable layout flags from raw method attributes
    #[must_use]
    pub fn from_method_flags(flags: u32) -> Self {
        let vtable = flags & METHOD_VTABLE_LAYOUT_MASK;
        Self::from_bits_truncate(vtable)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method modifiers and properties
    pub struct MethodModifiers: u32 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method can only be overriden if also accessible
        const STRICT = 0x0200;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// CLI provides 'special' behavior, dpending upon the name of the method
        const RTSPECIAL_NAME = 0x1000;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
    }
}

impl MethodModifiers {
    /// Extract method modifiers from raw method attributes
    #[must_use]
    pub fn from_method_flags(flags: u32) -> Self {
        let modifiers = flags & !METHOD_ACCESS_MASK & !METHOD_VTABLE_LAYOUT_MASK;
        Self::from_bits_truncate(modifiers)
    }
}

/// The full attribute word of a method, recombined from its logical groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodAttributes(pub u32);

impl MethodAttributes {
    /// Combine the split flag groups back into a single attribute word
    #[must_use]
    pub fn from_parts(
        access: MethodAccessFlags,
        vtable: MethodVtableFlags,
        modifiers: MethodModifiers,
    ) -> Self {
        MethodAttributes(access.bits() | vtable.bits() | modifiers.bits())
    }

    /// The access group
    #[must_use]
    pub fn access(&self) -> MethodAccessFlags {
        MethodAccessFlags::from_method_flags(self.0)
    }

    /// The vtable layout group
    #[must_use]
    pub fn vtable(&self) -> MethodVtableFlags {
        MethodVtableFlags::from_method_flags(self.0)
    }

    /// The modifier group
    #[must_use]
    pub fn modifiers(&self) -> MethodModifiers {
        MethodModifiers::from_method_flags(self.0)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Managed calling conventions, as reported by reflection
    pub struct CallingConventions: u32 {
        /// Default managed calling convention
        const STANDARD = 0x0001;
        /// Variable argument list
        const VAR_ARGS = 0x0002;
        /// Instance method, `this` is passed implicitly
        const HAS_THIS = 0x0020;
        /// `this` is passed explicitly as the first signature parameter
        const EXPLICIT_THIS = 0x0040;
    }
}

/// Opaque runtime handle of a method, used by the execution environment to locate signatures
/// and native bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MethodHandle(pub usize);

impl MethodHandle {
    /// The raw handle value
    #[must_use]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl fmt::Display for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodHandle(0x{:x})", self.0)
    }
}
