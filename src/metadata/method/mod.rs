//! Runtime method descriptors.
//!
//! A [`RuntimeMethod`] identifies one method of one declaring type, possibly after generic
//! instantiation. Descriptors are immutable after construction except for their cache slots,
//! which the reflection layer fills lazily (parameter list, return parameter, invoker).
//!
//! The different flavours of methods reflection deals with are a closed set, expressed by
//! [`MethodKind`]:
//!
//! - ordinary method definitions, generic or not
//! - instantiations of generic method definitions
//! - constructors
//! - the synthetic nullary constructor of a type obtained from a COM class id
//!
//! # Examples
//!
//! ```rust
//! use dotreflect::prelude::*;
//!
//! let env = RuntimeEnvironment::new();
//! let widget = TypeBuilder::class("Demo", "Widget").build(env.types())?;
//! let int32 = env.types().primitive(CilPrimitiveKind::I4);
//!
//! let twice = MethodBuilder::new("Twice")
//!     .static_()
//!     .returns(&int32)
//!     .param("value", &int32)
//!     .build(&env, Some(&widget))?;
//!
//! assert!(twice.is_static());
//! assert_eq!(twice.signature(&env), "Int32 Twice(Int32)");
//! # Ok::<(), dotreflect::Error>(())
//! ```

mod builder;
mod params;
mod types;

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, OnceLock},
};

pub use builder::MethodBuilder;
pub use params::{ParamAttributes, ParamList, ParamRc, RuntimeParameter};
pub use types::*;

use crate::{
    metadata::{
        token::Token,
        typesystem::{TypeRc, TypeRef},
    },
    reflection::{InvokerRc, LazySlot},
    runtime::ReflectionConfig,
    Error, Result,
};

/// A vector that holds a list of `RuntimeMethod`
pub type MethodList = Arc<boxcar::Vec<MethodRc>>;
/// A reference to a `RuntimeMethod`
pub type MethodRc = Arc<RuntimeMethod>;

/// Name every instance constructor carries
pub const CONSTRUCTOR_NAME: &str = ".ctor";
/// Name every type initializer carries
pub const TYPE_CONSTRUCTOR_NAME: &str = ".cctor";

/// The flavour of a method descriptor
#[derive(Debug, Clone)]
pub enum MethodKind {
    /// An ordinary method definition, possibly a generic method definition
    Named,
    /// A generic method definition instantiated over concrete type arguments
    ConstructedGeneric {
        /// The generic method definition this method instantiates
        definition: MethodRc,
        /// The type arguments, in generic parameter order
        arguments: Vec<TypeRc>,
    },
    /// An instance constructor or type initializer
    Constructor,
    /// The synthetic nullary constructor of a type obtained from a COM class id
    ClsidNullaryConstructor {
        /// The class id the declaring type was obtained from
        clsid: uguid::Guid,
        /// The server the class is activated on, `None` for the local machine
        server: Option<String>,
    },
}

impl MethodKind {
    fn discriminant(&self) -> u8 {
        match self {
            MethodKind::Named => 0,
            MethodKind::ConstructedGeneric { .. } => 1,
            MethodKind::Constructor => 2,
            MethodKind::ClsidNullaryConstructor { .. } => 3,
        }
    }
}

/// A method (or constructor) of a runtime type, as surfaced through reflection.
///
/// The cache slots are filled by [`crate::reflection`] on first use and shared by every
/// caller afterwards; see [`LazySlot`] for the consistency model.
pub struct RuntimeMethod {
    /// Token of the `MethodDef` row this method originates from
    pub token: Token,
    /// The method name
    pub name: String,
    /// Which flavour of method this is
    pub kind: MethodKind,
    /// Runtime handle used for signature and body lookups
    pub handle: MethodHandle,
    /// Access flags
    pub flags_access: MethodAccessFlags,
    /// Vtable layout flags
    pub flags_vtable: MethodVtableFlags,
    /// Method modifiers
    pub flags_modifiers: MethodModifiers,
    /// Implementation code type
    pub impl_code_type: MethodImplCodeType,
    /// Managed calling convention
    pub calling_convention: CallingConventions,
    /// The type declaring this method
    declaring_type: Option<TypeRef>,
    /// The type this method was obtained through
    reflected_type: Option<TypeRef>,
    /// Generic parameters of a generic method definition, in declaration order
    pub generic_params: Vec<TypeRc>,
    pub(crate) lazy_parameters: LazySlot<ParamList>,
    pub(crate) lazy_return_parameter: LazySlot<ParamRc>,
    pub(crate) lazy_invoker: LazySlot<InvokerRc>,
    debug_name: OnceLock<String>,
}

impl RuntimeMethod {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        token: Token,
        name: String,
        kind: MethodKind,
        handle: MethodHandle,
        flags: MethodAttributes,
        impl_code_type: MethodImplCodeType,
        calling_convention: CallingConventions,
        declaring_type: Option<&TypeRc>,
        generic_params: Vec<TypeRc>,
    ) -> Self {
        let declaring_type = declaring_type.map(TypeRef::new);
        RuntimeMethod {
            token,
            name,
            kind,
            handle,
            flags_access: flags.access(),
            flags_vtable: flags.vtable(),
            flags_modifiers: flags.modifiers(),
            impl_code_type,
            calling_convention,
            reflected_type: declaring_type.clone(),
            declaring_type,
            generic_params,
            lazy_parameters: LazySlot::new(),
            lazy_return_parameter: LazySlot::new(),
            lazy_invoker: LazySlot::new(),
            debug_name: OnceLock::new(),
        }
    }

    /// Create the synthetic nullary constructor of a type obtained from a COM class id.
    ///
    /// ## Arguments
    /// * 'declaring_type' - The type created for the class id
    /// * 'clsid'          - The class id
    /// * 'server'         - The server to activate on, `None` for the local machine
    #[must_use]
    pub fn clsid_nullary_constructor(
        declaring_type: &TypeRc,
        clsid: uguid::Guid,
        server: Option<String>,
    ) -> MethodRc {
        Arc::new(RuntimeMethod::new(
            Token::default(),
            CONSTRUCTOR_NAME.to_string(),
            MethodKind::ClsidNullaryConstructor { clsid, server },
            MethodHandle::default(),
            MethodAttributes::from_parts(
                MethodAccessFlags::PUBLIC,
                MethodVtableFlags::REUSE_SLOT,
                MethodModifiers::HIDE_BY_SIG
                    | MethodModifiers::SPECIAL_NAME
                    | MethodModifiers::RTSPECIAL_NAME,
            ),
            MethodImplCodeType::IL,
            CallingConventions::STANDARD | CallingConventions::HAS_THIS,
            Some(declaring_type),
            Vec::new(),
        ))
    }

    /// Instantiate the generic method definition `definition` over `arguments`. The
    /// instantiation shares the definition's token, handle and flags. Callers go through
    /// [`crate::metadata::typesystem::TypeRegistry`] so each instantiation exists once.
    pub(crate) fn constructed_generic(
        definition: &MethodRc,
        arguments: Vec<TypeRc>,
    ) -> RuntimeMethod {
        let method = RuntimeMethod {
            token: definition.token,
            name: definition.name.clone(),
            kind: MethodKind::ConstructedGeneric {
                definition: definition.clone(),
                arguments,
            },
            handle: definition.handle,
            flags_access: definition.flags_access,
            flags_vtable: definition.flags_vtable,
            flags_modifiers: definition.flags_modifiers,
            impl_code_type: definition.impl_code_type,
            calling_convention: definition.calling_convention,
            declaring_type: definition.declaring_type.clone(),
            reflected_type: definition.reflected_type.clone(),
            generic_params: definition.generic_params.clone(),
            lazy_parameters: LazySlot::new(),
            lazy_return_parameter: LazySlot::new(),
            lazy_invoker: LazySlot::new(),
            debug_name: OnceLock::new(),
        };
        if let Some(debug_name) = definition.debug_name.get() {
            method.debug_name.set(debug_name.clone()).ok();
        }
        method
    }

    /// Copy of this method obtained through `reflected_type`, with empty cache slots
    pub(crate) fn restamp(&self, reflected_type: Option<TypeRef>) -> RuntimeMethod {
        let copy = RuntimeMethod {
            token: self.token,
            name: self.name.clone(),
            kind: self.kind.clone(),
            handle: self.handle,
            flags_access: self.flags_access,
            flags_vtable: self.flags_vtable,
            flags_modifiers: self.flags_modifiers,
            impl_code_type: self.impl_code_type,
            calling_convention: self.calling_convention,
            declaring_type: self.declaring_type.clone(),
            reflected_type,
            generic_params: self.generic_params.clone(),
            lazy_parameters: LazySlot::new(),
            lazy_return_parameter: LazySlot::new(),
            lazy_invoker: LazySlot::new(),
            debug_name: OnceLock::new(),
        };
        if let Some(debug_name) = self.debug_name.get() {
            copy.debug_name.set(debug_name.clone()).ok();
        }
        copy
    }

    /// Record the debug name, when the configuration asks for it
    pub(crate) fn populate_debug_name(&self, config: &ReflectionConfig) {
        if config.populate_debug_names {
            self.debug_name.get_or_init(|| self.name.clone());
        }
    }

    /// The name recorded for debuggers, only present in developer-experience mode
    pub fn debug_name(&self) -> Option<&str> {
        self.debug_name.get().map(String::as_str)
    }

    /// The type declaring this method
    pub fn declaring_type(&self) -> Option<TypeRc> {
        self.declaring_type.as_ref().and_then(TypeRef::upgrade)
    }

    /// The type this method was obtained through
    pub fn reflected_type(&self) -> Option<TypeRc> {
        self.reflected_type.as_ref().and_then(TypeRef::upgrade)
    }

    /// The recombined attribute word
    pub fn attribute_flags(&self) -> MethodAttributes {
        MethodAttributes::from_parts(self.flags_access, self.flags_vtable, self.flags_modifiers)
    }

    /// Is this a static method
    pub fn is_static(&self) -> bool {
        self.flags_modifiers.contains(MethodModifiers::STATIC)
    }

    /// Is this a virtual method
    pub fn is_virtual(&self) -> bool {
        self.flags_modifiers.contains(MethodModifiers::VIRTUAL)
    }

    /// Is this an abstract method
    pub fn is_abstract(&self) -> bool {
        self.flags_modifiers.contains(MethodModifiers::ABSTRACT)
    }

    /// Does this method always get a new vtable slot
    pub fn is_new_slot(&self) -> bool {
        self.flags_vtable.contains(MethodVtableFlags::NEW_SLOT)
    }

    /// Is this a constructor (including the synthetic CLSID constructor)
    pub fn is_constructor(&self) -> bool {
        matches!(
            self.kind,
            MethodKind::Constructor | MethodKind::ClsidNullaryConstructor { .. }
        )
    }

    /// Is this a generic method definition or an instantiation of one
    pub fn is_generic_method(&self) -> bool {
        self.is_generic_method_definition() || self.is_constructed_generic_method()
    }

    /// Is this an uninstantiated generic method definition
    pub fn is_generic_method_definition(&self) -> bool {
        matches!(self.kind, MethodKind::Named) && !self.generic_params.is_empty()
    }

    /// Is this an instantiation of a generic method definition
    pub fn is_constructed_generic_method(&self) -> bool {
        matches!(self.kind, MethodKind::ConstructedGeneric { .. })
    }

    /// The generic arguments (instantiations) or generic parameters (definitions). The list
    /// is a fresh copy on every call.
    pub fn generic_arguments(&self) -> Vec<TypeRc> {
        match &self.kind {
            MethodKind::ConstructedGeneric { arguments, .. } => arguments.clone(),
            _ => self.generic_params.clone(),
        }
    }

    /// Does the method still contain unresolved generic parameters, either through its
    /// declaring type or through its own generic arguments
    pub fn contains_generic_parameters(&self) -> bool {
        if self
            .declaring_type()
            .is_some_and(|declaring| declaring.contains_generic_parameters())
        {
            return true;
        }

        if !self.is_generic_method() {
            return false;
        }

        self.generic_arguments()
            .iter()
            .any(|argument| argument.contains_generic_parameters())
    }

    /// The `MethodDef` token of this method
    ///
    /// # Errors
    /// Returns [`Error::InvalidOperation`] for the synthetic CLSID constructor, which has no
    /// metadata row
    pub fn metadata_token(&self) -> Result<Token> {
        match self.kind {
            MethodKind::ClsidNullaryConstructor { .. } => Err(Error::InvalidOperation(
                "A synthetic constructor has no metadata token".to_string(),
            )),
            _ => Ok(self.token),
        }
    }

    /// The runtime handle of this method
    ///
    /// # Errors
    /// Returns [`Error::PlatformNotSupported`] for the synthetic CLSID constructor
    pub fn method_handle(&self) -> Result<MethodHandle> {
        match self.kind {
            MethodKind::ClsidNullaryConstructor { .. } => Err(Error::PlatformNotSupported(
                "synthetic constructors have no method handle",
            )),
            _ => Ok(self.handle),
        }
    }

    /// IL body inspection. Reflection methods never expose a body.
    ///
    /// # Errors
    /// Always returns [`Error::PlatformNotSupported`]
    pub fn method_body(&self) -> Result<()> {
        Err(Error::PlatformNotSupported(
            "method bodies are not available through runtime reflection",
        ))
    }

    /// Does this descriptor hold cached parameters
    pub fn has_cached_parameters(&self) -> bool {
        self.lazy_parameters.is_populated() && self.lazy_return_parameter.is_populated()
    }

    /// Does this descriptor hold a cached invoker
    pub fn has_cached_invoker(&self) -> bool {
        self.lazy_invoker.is_populated()
    }
}

impl PartialEq for RuntimeMethod {
    fn eq(&self, other: &Self) -> bool {
        let same_declaring = self.declaring_type().map(|t| t.token)
            == other.declaring_type().map(|t| t.token);

        match (&self.kind, &other.kind) {
            (
                MethodKind::ClsidNullaryConstructor { .. },
                MethodKind::ClsidNullaryConstructor { .. },
            ) => same_declaring,
            (
                MethodKind::ConstructedGeneric {
                    definition,
                    arguments,
                },
                MethodKind::ConstructedGeneric {
                    definition: other_definition,
                    arguments: other_arguments,
                },
            ) => {
                definition == other_definition
                    && arguments.len() == other_arguments.len()
                    && arguments
                        .iter()
                        .zip(other_arguments)
                        .all(|(a, b)| a.token == b.token)
                    && self.reflected_type().map(|t| t.token)
                        == other.reflected_type().map(|t| t.token)
            }
            (kind, other_kind) => {
                kind.discriminant() == other_kind.discriminant()
                    && self.token == other.token
                    && same_declaring
                    && self.reflected_type().map(|t| t.token)
                        == other.reflected_type().map(|t| t.token)
            }
        }
    }
}

impl Eq for RuntimeMethod {}

impl Hash for RuntimeMethod {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.token.hash(state);
        self.declaring_type().map(|t| t.token).hash(state);
    }
}

impl fmt::Debug for RuntimeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeMethod")
            .field("name", &self.name)
            .field("token", &self.token)
            .field("kind", &self.kind)
            .field("declaring_type", &self.declaring_type().map(|t| t.fullname()))
            .finish_non_exhaustive()
    }
}

impl fmt::Display for RuntimeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.declaring_type() {
            Some(declaring) => write!(f, "{}::{}", declaring.fullname(), self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{metadata::typesystem::CilPrimitiveKind, test::FixtureEnvironment};

    #[test]
    fn test_flags_and_kinds() -> Result<()> {
        let fixture = FixtureEnvironment::new()?;

        assert!(fixture.add.is_static());
        assert!(!fixture.add.is_constructor());
        assert!(fixture.m_ctor.is_constructor());
        assert_eq!(fixture.m_ctor.name, CONSTRUCTOR_NAME);
        assert!(fixture.base_describe.is_virtual());
        assert!(fixture.base_describe.is_new_slot());
        assert!(!fixture.derived_describe.is_new_slot());

        assert!(fixture.identity.is_generic_method_definition());
        assert!(fixture.identity.contains_generic_parameters());
        assert!(!fixture.add.is_generic_method());
        assert!(!fixture.add.contains_generic_parameters());
        Ok(())
    }

    #[test]
    fn test_equality() -> Result<()> {
        let fixture = FixtureEnvironment::new()?;
        let types = fixture.env.registry();

        assert_eq!(*fixture.add, fixture.add.restamp(fixture.add.declaring_type.clone()));
        assert_ne!(*fixture.add, *fixture.negate);

        let through_derived = types.method_through(&fixture.base_describe, &fixture.derived);
        assert_ne!(*fixture.base_describe, *through_derived);
        assert_eq!(
            through_derived.reflected_type().map(|t| t.token),
            Some(fixture.derived.token)
        );
        assert_eq!(
            through_derived.declaring_type().map(|t| t.token),
            Some(fixture.base.token)
        );
        Ok(())
    }

    #[test]
    fn test_method_through_returns_the_same_descriptor() -> Result<()> {
        let fixture = FixtureEnvironment::new()?;
        let types = fixture.env.registry();

        let through_derived = types.method_through(&fixture.base_describe, &fixture.derived);
        assert!(Arc::ptr_eq(
            &through_derived,
            &types.method_through(&fixture.base_describe, &fixture.derived)
        ));
        assert!(Arc::ptr_eq(
            &through_derived,
            &types.method_through(&through_derived, &fixture.derived)
        ));

        // Back through the declaring type yields the declared descriptor
        assert!(Arc::ptr_eq(
            &types.method_through(&through_derived, &fixture.base),
            &fixture.base_describe
        ));
        assert!(Arc::ptr_eq(
            &types.method_through(&fixture.add, &fixture.m),
            &fixture.add
        ));
        Ok(())
    }

    #[test]
    fn test_restamped_copies_start_with_empty_caches() -> Result<()> {
        let fixture = FixtureEnvironment::new()?;
        fixture
            .add
            .lazy_parameters
            .publish(Arc::from(Vec::<ParamRc>::new()));

        let copy = fixture.env.registry().method_through(&fixture.add, &fixture.derived);
        assert!(fixture.add.lazy_parameters.is_populated());
        assert!(!copy.lazy_parameters.is_populated());
        assert!(!copy.has_cached_invoker());
        Ok(())
    }

    #[test]
    fn test_constructed_generic() -> Result<()> {
        let fixture = FixtureEnvironment::new()?;
        let types = fixture.env.registry();
        let string = types.string();
        let int32 = types.primitive(CilPrimitiveKind::I4);

        let over_string = types.constructed_method(&fixture.identity, vec![string.clone()]);
        assert!(over_string.is_constructed_generic_method());
        assert!(!over_string.is_generic_method_definition());
        assert!(!over_string.contains_generic_parameters());
        assert_eq!(over_string.token, fixture.identity.token);
        assert_eq!(over_string.generic_arguments()[0].token, string.token);
        assert_eq!(
            fixture.identity.generic_arguments()[0].token,
            fixture.identity.generic_params[0].token
        );

        let again = types.constructed_method(&fixture.identity, vec![string.clone()]);
        let over_int = types.constructed_method(&fixture.identity, vec![int32]);
        assert!(Arc::ptr_eq(&over_string, &again));
        assert_ne!(*over_string, *over_int);
        assert_ne!(*over_string, *fixture.identity);

        let fresh = RuntimeMethod::constructed_generic(&fixture.identity, vec![string]);
        assert_eq!(*over_string, fresh);
        Ok(())
    }

    #[test]
    fn test_clsid_constructor_surface() -> Result<()> {
        let fixture = FixtureEnvironment::new()?;
        let clsid = uguid::guid!("00020810-0000-0000-c000-000000000046");
        let ctor = RuntimeMethod::clsid_nullary_constructor(&fixture.m, clsid, None);
        let remote =
            RuntimeMethod::clsid_nullary_constructor(&fixture.m, clsid, Some("host".to_string()));

        assert!(ctor.is_constructor());
        assert!(!ctor.is_static());
        assert_eq!(*ctor, *remote);
        assert!(matches!(ctor.metadata_token(), Err(Error::InvalidOperation(_))));
        assert!(matches!(
            ctor.method_handle(),
            Err(Error::PlatformNotSupported(_))
        ));
        assert!(matches!(
            ctor.method_body(),
            Err(Error::PlatformNotSupported(_))
        ));
        assert!(fixture.add.metadata_token().is_ok());
        assert_eq!(fixture.add.method_handle()?, fixture.add.handle);
        Ok(())
    }

    #[test]
    fn test_display() -> Result<()> {
        let fixture = FixtureEnvironment::new()?;
        assert_eq!(fixture.add.to_string(), "Demo.M::Add");
        Ok(())
    }
}
