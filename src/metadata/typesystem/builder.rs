//! Builder for type definitions.
//!
//! This module provides the [`TypeBuilder`] struct, which offers a fluent API for defining
//! classes, value types, interfaces, enums and delegate types and registering them in a
//! [`TypeRegistry`].
//!
//! # Example
//!
//! ```rust
//! use dotreflect::metadata::typesystem::{TypeBuilder, TypeRegistry};
//!
//! let registry = TypeRegistry::new();
//! let shape = TypeBuilder::class("Demo", "Shape").abstract_().build(&registry)?;
//! let circle = TypeBuilder::class("Demo", "Circle").extends(&shape).build(&registry)?;
//!
//! assert!(circle.is_subclass_of(&shape));
//! # Ok::<(), dotreflect::Error>(())
//! ```

use std::sync::Arc;

use crate::{
    metadata::{
        token::Token,
        typesystem::{
            CilFlavor, CilPrimitiveKind, RuntimeType, TypeAttributes, TypeRc, TypeRef,
            TypeRegistry,
        },
    },
    Result,
};

/// What the builder is going to produce, decides the default base type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeShape {
    Class,
    ValueType,
    Interface,
    Enum(CilPrimitiveKind),
    Delegate,
}

/// Provides a fluent API for defining types
pub struct TypeBuilder {
    /// The kind of type being defined
    shape: TypeShape,
    /// Namespace of the new type
    namespace: String,
    /// Name of the new type
    name: String,
    /// Attribute flags
    flags: TypeAttributes,
    /// Explicit base type, overrides the shape default
    base: Option<TypeRc>,
    /// Interfaces the new type implements
    interfaces: Vec<TypeRc>,
    /// Token for the new type (if applicable)
    token_init: Option<Token>,
}

impl TypeBuilder {
    fn new(shape: TypeShape, namespace: &str, name: &str, flags: TypeAttributes) -> Self {
        TypeBuilder {
            shape,
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags: flags | TypeAttributes::PUBLIC,
            base: None,
            interfaces: Vec::new(),
            token_init: None,
        }
    }

    /// Start defining a class, deriving from `System.Object` unless [`Self::extends`] says
    /// otherwise
    ///
    /// ## Arguments
    /// * 'namespace' - Namespace for a class type
    /// * 'name'      - Name for a class type
    #[must_use]
    pub fn class(namespace: &str, name: &str) -> Self {
        Self::new(TypeShape::Class, namespace, name, TypeAttributes::empty())
    }

    /// Start defining a sealed value type deriving from `System.ValueType`
    ///
    /// ## Arguments
    /// * 'namespace' - Namespace for a value type
    /// * 'name'      - Name for a value type
    #[must_use]
    pub fn value_type(namespace: &str, name: &str) -> Self {
        Self::new(TypeShape::ValueType, namespace, name, TypeAttributes::SEALED)
    }

    /// Start defining an interface
    ///
    /// ## Arguments
    /// * 'namespace' - Namespace for an interface type
    /// * 'name'      - Name for an interface type
    #[must_use]
    pub fn interface(namespace: &str, name: &str) -> Self {
        Self::new(
            TypeShape::Interface,
            namespace,
            name,
            TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT,
        )
    }

    /// Start defining an enum backed by `underlying`
    ///
    /// ## Arguments
    /// * 'namespace'  - Namespace for the enum
    /// * 'name'       - Name for the enum
    /// * 'underlying' - The integral type storing the enum values
    #[must_use]
    pub fn enumeration(namespace: &str, name: &str, underlying: CilPrimitiveKind) -> Self {
        Self::new(
            TypeShape::Enum(underlying),
            namespace,
            name,
            TypeAttributes::SEALED,
        )
    }

    /// Start defining a sealed delegate type deriving from `System.MulticastDelegate`.
    ///
    /// The `Invoke` method describing its signature is added separately, see
    /// [`crate::runtime::RuntimeEnvironment::define_delegate`].
    ///
    /// ## Arguments
    /// * 'namespace' - Namespace for the delegate
    /// * 'name'      - Name for the delegate
    #[must_use]
    pub fn delegate(namespace: &str, name: &str) -> Self {
        Self::new(TypeShape::Delegate, namespace, name, TypeAttributes::SEALED)
    }

    /// Set the base type
    #[must_use]
    pub fn extends(mut self, base: &TypeRc) -> Self {
        self.base = Some(base.clone());
        self
    }

    /// Add an implemented interface
    #[must_use]
    pub fn implements(mut self, interface: &TypeRc) -> Self {
        self.interfaces.push(interface.clone());
        self
    }

    /// Mark the type abstract
    #[must_use]
    pub fn abstract_(mut self) -> Self {
        self.flags |= TypeAttributes::ABSTRACT;
        self
    }

    /// Mark the type sealed
    #[must_use]
    pub fn sealed(mut self) -> Self {
        self.flags |= TypeAttributes::SEALED;
        self
    }

    /// Use a specific token instead of the next free `TypeDef` token
    #[must_use]
    pub fn token(mut self, token: Token) -> Self {
        self.token_init = Some(token);
        self
    }

    /// Create the type and register it
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] if an enum is backed by a non-integral type,
    /// an interface is used as a base type, or the requested token is already taken.
    pub fn build(self, registry: &TypeRegistry) -> Result<TypeRc> {
        let token = match self.token_init {
            Some(token) => {
                if registry.get(&token).is_some() {
                    return Err(invalid_argument!(
                        "Token {} is already used by another type",
                        token
                    ));
                }
                token
            }
            None => registry.next_typedef_token(),
        };

        let (flavor, default_base) = match self.shape {
            TypeShape::Class => (CilFlavor::Class, Some(registry.object())),
            TypeShape::ValueType => (CilFlavor::ValueType, Some(registry.value_type())),
            TypeShape::Interface => (CilFlavor::Interface, None),
            TypeShape::Enum(underlying) => {
                if !underlying.is_integral() {
                    return Err(invalid_argument!(
                        param = "underlying",
                        "{} cannot back an enum",
                        underlying.name()
                    ));
                }
                (CilFlavor::ValueType, Some(registry.enum_type()))
            }
            TypeShape::Delegate => (CilFlavor::Class, Some(registry.multicast_delegate())),
        };

        let base = match self.base {
            Some(base) if base.is_interface() => {
                return Err(invalid_argument!(
                    param = "base",
                    "Interface {} cannot be used as a base type",
                    base.fullname()
                ));
            }
            Some(base) => Some(base),
            None => default_base,
        };

        let new_type = Arc::new(RuntimeType::new(
            token,
            flavor,
            self.namespace,
            self.name,
            self.flags,
            base.as_ref(),
            None,
        ));

        if let TypeShape::Enum(underlying) = self.shape {
            new_type.set_enum_underlying_type(registry.primitive(underlying));
        }
        for interface in &self.interfaces {
            new_type.interfaces.push(TypeRef::new(interface));
        }

        registry.insert(&new_type);
        Ok(new_type)
    }
}
