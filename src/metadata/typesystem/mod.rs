//! In-memory .NET type system consumed by the reflection layer.
//!
//! The reflection core never parses metadata itself; it works on already-loaded types. This
//! module provides that model: a [`RuntimeType`] per loaded or constructed type, a
//! [`TypeRegistry`] that owns them and interns constructed types, and a [`TypeBuilder`] to
//! define new ones.
//!
//! # Key Components
//!
//! - [`RuntimeType`]: A class, interface, value type, enum, delegate or constructed type
//! - [`TypeRegistry`]: Central, concurrent registry for all types
//! - [`TypeBuilder`]: Builder for defining types
//! - [`CilPrimitiveKind`]: Built-in primitive types (int32, string, object, etc.)
//! - [`CilFlavor`]: Structural kind of a type
//!
//! # Queries used by reflection
//!
//! - enum-ness and underlying integral type ([`RuntimeType::is_enum`],
//!   [`RuntimeType::enum_underlying_type`])
//! - delegate-ness and the `Invoke` method ([`RuntimeType::is_delegate`],
//!   [`RuntimeType::delegate_invoke_method`])
//! - inheritance and interface queries ([`RuntimeType::is_subclass_of`],
//!   [`RuntimeType::implements`])
//!
//! # Examples
//!
//! ```rust
//! use dotreflect::metadata::typesystem::{CilPrimitiveKind, TypeBuilder, TypeRegistry};
//!
//! let registry = TypeRegistry::new();
//! let color = TypeBuilder::enumeration("Demo", "Color", CilPrimitiveKind::I4).build(&registry)?;
//!
//! assert!(color.is_enum());
//! assert_eq!(color.enum_underlying_type().unwrap().name, "Int32");
//! # Ok::<(), dotreflect::Error>(())
//! ```

mod base;
mod builder;
mod primitives;
mod registry;

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, OnceLock},
};

pub use base::{CilFlavor, TypeAttributes, TypeRef, TypeRefList};
pub use builder::TypeBuilder;
pub use primitives::CilPrimitiveKind;
pub use registry::{
    TypeRegistry, TOKEN_ARRAY, TOKEN_DELEGATE, TOKEN_ENUM, TOKEN_MULTICAST_DELEGATE,
};

use crate::metadata::{
    method::{MethodList, MethodRc},
    token::Token,
};

/// A vector that holds a list of `RuntimeType`
pub type TypeList = Arc<boxcar::Vec<TypeRc>>;
/// Reference to a `RuntimeType`
pub type TypeRc = Arc<RuntimeType>;

/// A type as the runtime sees it: definition, reference or constructed (by-ref, pointer,
/// array). Instances are owned by the [`TypeRegistry`] and live as long as it does.
pub struct RuntimeType {
    /// Token
    pub token: Token,
    /// The structural kind of this type
    pub flavor: CilFlavor,
    /// `TypeNamespace` (can be empty)
    pub namespace: String,
    /// `TypeName`
    pub name: String,
    /// Type attributes
    pub flags: TypeAttributes,
    /// The type this one 'extends'
    base: OnceLock<TypeRef>,
    /// The wrapped type of a by-ref, pointer or array type
    element: Option<TypeRc>,
    /// The integral type backing an enum
    enum_underlying: OnceLock<TypeRc>,
    /// All interfaces this type implements
    pub interfaces: TypeRefList,
    /// All generic arguments this type has (instantiated version)
    pub generic_args: TypeList,
    /// All methods this type declares
    pub methods: MethodList,
}

impl RuntimeType {
    /// Create a new instance of a `RuntimeType`
    pub fn new(
        token: Token,
        flavor: CilFlavor,
        namespace: String,
        name: String,
        flags: TypeAttributes,
        base: Option<&TypeRc>,
        element: Option<TypeRc>,
    ) -> Self {
        let base_lock = OnceLock::new();
        if let Some(base_value) = base {
            base_lock.set(base_value.into()).ok();
        }

        RuntimeType {
            token,
            flavor,
            namespace,
            name,
            flags,
            base: base_lock,
            element,
            enum_underlying: OnceLock::new(),
            interfaces: Arc::new(boxcar::Vec::new()),
            generic_args: Arc::new(boxcar::Vec::new()),
            methods: Arc::new(boxcar::Vec::new()),
        }
    }

    /// Access the base type of this type, if it exists
    pub fn base(&self) -> Option<TypeRc> {
        self.base.get().and_then(TypeRef::upgrade)
    }

    /// Set the base type. Returns false if a base type was already set.
    pub fn set_base(&self, base: &TypeRc) -> bool {
        self.base.set(base.into()).is_ok()
    }

    /// Returns the full name (Namespace.Name) of the entity
    pub fn fullname(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{0}.{1}", self.namespace, self.name)
        }
    }

    /// The name used when formatting method signatures: primitive value types (and `Void`)
    /// use their short name, everything else its full name. Constructed types format their
    /// element type the same way.
    pub fn display_name(&self) -> String {
        match (&self.flavor, &self.element) {
            (CilFlavor::ByRef, Some(element)) => format!("{}&", element.display_name()),
            (CilFlavor::Pointer, Some(element)) => format!("{}*", element.display_name()),
            (CilFlavor::Array { rank }, Some(element)) => {
                let commas = ",".repeat(rank.saturating_sub(1) as usize);
                format!("{}[{commas}]", element.display_name())
            }
            (CilFlavor::GenericParameter { .. }, _) => self.name.clone(),
            (CilFlavor::Object | CilFlavor::String, _) => self.fullname(),
            (flavor, _) if flavor.is_primitive() && !self.is_enum() => self.name.clone(),
            _ => self.fullname(),
        }
    }

    /// The wrapped type of a by-ref, pointer or array type
    pub fn element_type(&self) -> Option<TypeRc> {
        self.element.clone()
    }

    /// Is this a by-reference type (`T&`)
    pub fn is_by_ref(&self) -> bool {
        self.flavor == CilFlavor::ByRef
    }

    /// Is this an unmanaged pointer type (`T*`)
    pub fn is_pointer(&self) -> bool {
        self.flavor == CilFlavor::Pointer
    }

    /// Is this an array type
    pub fn is_array(&self) -> bool {
        matches!(self.flavor, CilFlavor::Array { .. })
    }

    /// Is this an interface
    pub fn is_interface(&self) -> bool {
        self.flavor == CilFlavor::Interface || self.flags.contains(TypeAttributes::INTERFACE)
    }

    /// Is this an abstract type
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(TypeAttributes::ABSTRACT) || self.is_interface()
    }

    /// Is this a value type (including enums)
    pub fn is_value_type(&self) -> bool {
        self.flavor.is_value_type()
    }

    /// Is this a generic type or method parameter
    pub fn is_generic_parameter(&self) -> bool {
        matches!(self.flavor, CilFlavor::GenericParameter { .. })
    }

    /// Is this an enum, i.e. directly derived from `System.Enum`
    pub fn is_enum(&self) -> bool {
        self.base().is_some_and(|base| base.token == TOKEN_ENUM)
    }

    /// The integral type backing this enum, `None` for non-enum types
    pub fn enum_underlying_type(&self) -> Option<TypeRc> {
        if !self.is_enum() {
            return None;
        }
        self.enum_underlying.get().cloned()
    }

    /// Set the underlying type of an enum. Returns false if it was already set.
    pub fn set_enum_underlying_type(&self, underlying: TypeRc) -> bool {
        self.enum_underlying.set(underlying).is_ok()
    }

    /// Is `ancestor` a (transitive) base class of this type
    pub fn is_subclass_of(&self, ancestor: &RuntimeType) -> bool {
        let mut current = self.base();
        while let Some(base) = current {
            if base.token == ancestor.token {
                return true;
            }
            current = base.base();
        }
        false
    }

    /// Does this type or any of its bases implement `interface`, directly or through
    /// interface inheritance
    pub fn implements(&self, interface: &RuntimeType) -> bool {
        fn search(ty: &RuntimeType, interface: &RuntimeType) -> bool {
            ty.interfaces.iter().any(|(_, implemented)| {
                implemented.upgrade().is_some_and(|implemented| {
                    implemented.token == interface.token || search(&implemented, interface)
                })
            })
        }

        if search(self, interface) {
            return true;
        }
        let mut current = self.base();
        while let Some(base) = current {
            if search(&base, interface) {
                return true;
            }
            current = base.base();
        }
        false
    }

    /// Is this a concrete delegate type: a type deriving from `System.MulticastDelegate` or
    /// `System.Delegate`, excluding those two and any abstract type.
    pub fn is_delegate(&self) -> bool {
        if self.token == TOKEN_DELEGATE
            || self.token == TOKEN_MULTICAST_DELEGATE
            || self.is_abstract()
        {
            return false;
        }

        let mut current = self.base();
        while let Some(base) = current {
            if base.token == TOKEN_DELEGATE || base.token == TOKEN_MULTICAST_DELEGATE {
                return true;
            }
            current = base.base();
        }
        false
    }

    /// The `Invoke` method describing a delegate type's signature
    pub fn delegate_invoke_method(&self) -> Option<MethodRc> {
        self.find_method("Invoke")
    }

    /// First method declared on this type with the given name
    pub fn find_method(&self, name: &str) -> Option<MethodRc> {
        self.methods
            .iter()
            .find(|(_, method)| method.name == name)
            .map(|(_, method)| method.clone())
    }

    /// Does this type contain unresolved generic parameters anywhere in its structure
    pub fn contains_generic_parameters(&self) -> bool {
        if self.is_generic_parameter() {
            return true;
        }
        if let Some(element) = &self.element {
            return element.contains_generic_parameters();
        }
        self.generic_args
            .iter()
            .any(|(_, arg)| arg.contains_generic_parameters())
    }
}

impl PartialEq for RuntimeType {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token
    }
}

impl Eq for RuntimeType {}

impl Hash for RuntimeType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.token.hash(state);
    }
}

impl fmt::Debug for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuntimeType({}, {})", self.fullname(), self.token)
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}
