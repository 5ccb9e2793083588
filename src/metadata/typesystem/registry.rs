//! Central registry owning every type known to a runtime environment.
//!
//! The registry is seeded with the core library types reflection relies on (`System.Object`,
//! `System.ValueType`, `System.Enum`, `System.Delegate`, `System.MulticastDelegate`,
//! `System.Array` and every primitive) and interns constructed types, so asking twice for
//! `Int32&` yields the same [`TypeRc`]. Structural identity of by-ref types is what the
//! assignability oracle relies on.
//!
//! Method descriptors derived at runtime are interned the same way: a generic method
//! instantiation or a method seen through another reflected type is created once, so its
//! parameter and invoker caches are shared by every caller that derives it.
//!
//! # Concurrency Design
//!
//! - Lock-free primary storage using `SkipMap`
//! - Concurrent secondary indices using `DashMap`
//! - Atomic token generation for thread-safe registration

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use strum::{EnumCount, IntoEnumIterator};

use crate::{
    metadata::{
        method::{MethodHandle, MethodKind, MethodRc, RuntimeMethod},
        token::Token,
        typesystem::{CilFlavor, CilPrimitiveKind, RuntimeType, TypeAttributes, TypeRc, TypeRef},
    },
    Error, Result,
};

/// Token of `System.Enum`
pub const TOKEN_ENUM: Token = Token::new(0xF000_0018);
/// Token of `System.Delegate`
pub const TOKEN_DELEGATE: Token = Token::new(0xF000_0019);
/// Token of `System.MulticastDelegate`
pub const TOKEN_MULTICAST_DELEGATE: Token = Token::new(0xF000_001A);
/// Token of `System.Array`
pub const TOKEN_ARRAY: Token = Token::new(0xF000_001B);

/// Keys for the constructed-type intern table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ConstructedKey {
    ByRef(Token),
    Pointer(Token),
    Array(Token, u32),
}

/// Key for the derived-method intern table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MethodKey {
    handle: MethodHandle,
    token: Token,
    declaring: Option<Token>,
    reflected: Option<Token>,
    arguments: Vec<Token>,
}

impl MethodKey {
    fn new(method: &RuntimeMethod, reflected: Option<Token>, arguments: Vec<Token>) -> Self {
        MethodKey {
            handle: method.handle,
            token: method.token,
            declaring: method.declaring_type().map(|declaring| declaring.token),
            reflected,
            arguments,
        }
    }
}

fn argument_tokens(method: &RuntimeMethod) -> Vec<Token> {
    match &method.kind {
        MethodKind::ConstructedGeneric { arguments, .. } => {
            arguments.iter().map(|argument| argument.token).collect()
        }
        _ => Vec::new(),
    }
}

/// Concurrent registry of [`RuntimeType`]s.
///
/// # Examples
///
/// ```rust
/// use dotreflect::metadata::typesystem::{CilPrimitiveKind, TypeRegistry};
///
/// let registry = TypeRegistry::new();
/// let int32 = registry.primitive(CilPrimitiveKind::I4);
///
/// assert_eq!(registry.get_by_fullname("System.Int32").unwrap().token, int32.token);
/// assert!(std::sync::Arc::ptr_eq(&registry.make_by_ref(&int32), &registry.make_by_ref(&int32)));
/// ```
pub struct TypeRegistry {
    /// Primary type storage indexed by tokens
    types: SkipMap<Token, TypeRc>,
    /// Atomic counter for artificial tokens (constructed types)
    next_token: AtomicU32,
    /// Atomic counter for `TypeDef` rows handed to built types
    next_typedef: AtomicU32,
    /// Primitive types indexed by `CilPrimitiveKind as usize`
    primitives: Vec<TypeRc>,
    /// Secondary index: types indexed by full name (namespace.name)
    types_by_fullname: DashMap<String, Vec<Token>>,
    /// Secondary index: types indexed by simple name (may have duplicates)
    types_by_name: DashMap<String, Vec<Token>>,
    /// Interned by-ref, pointer and array types
    constructed: DashMap<ConstructedKey, TypeRc>,
    /// Interned generic method instantiations and re-reflected methods
    methods: DashMap<MethodKey, MethodRc>,
}

impl TypeRegistry {
    /// Create a registry seeded with the core library types
    #[must_use]
    pub fn new() -> Self {
        let object = Arc::new(RuntimeType::new(
            CilPrimitiveKind::Object.token(),
            CilFlavor::Object,
            "System".to_string(),
            "Object".to_string(),
            TypeAttributes::PUBLIC,
            None,
            None,
        ));
        let value_type = Arc::new(RuntimeType::new(
            CilPrimitiveKind::ValueType.token(),
            CilFlavor::Class,
            "System".to_string(),
            "ValueType".to_string(),
            TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT,
            Some(&object),
            None,
        ));

        let mut primitives = Vec::with_capacity(CilPrimitiveKind::COUNT);
        for kind in CilPrimitiveKind::iter() {
            let primitive = match kind {
                CilPrimitiveKind::Object => object.clone(),
                CilPrimitiveKind::ValueType => value_type.clone(),
                _ => {
                    let base = if kind.is_value_type() || kind == CilPrimitiveKind::Void {
                        &value_type
                    } else {
                        &object
                    };
                    Arc::new(RuntimeType::new(
                        kind.token(),
                        kind.to_flavor(),
                        kind.namespace().to_string(),
                        kind.name().to_string(),
                        TypeAttributes::PUBLIC | TypeAttributes::SEALED,
                        Some(base),
                        None,
                    ))
                }
            };
            primitives.push(primitive);
        }

        let registry = TypeRegistry {
            types: SkipMap::new(),
            next_token: AtomicU32::new(0xF000_0020), // Start after reserved core types
            next_typedef: AtomicU32::new(1),
            primitives,
            types_by_fullname: DashMap::new(),
            types_by_name: DashMap::new(),
            constructed: DashMap::new(),
            methods: DashMap::new(),
        };

        for primitive in &registry.primitives {
            registry.insert(primitive);
        }

        let enum_type = Arc::new(RuntimeType::new(
            TOKEN_ENUM,
            CilFlavor::Class,
            "System".to_string(),
            "Enum".to_string(),
            TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT,
            Some(&value_type),
            None,
        ));
        let delegate = Arc::new(RuntimeType::new(
            TOKEN_DELEGATE,
            CilFlavor::Class,
            "System".to_string(),
            "Delegate".to_string(),
            TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT,
            Some(&object),
            None,
        ));
        let multicast = Arc::new(RuntimeType::new(
            TOKEN_MULTICAST_DELEGATE,
            CilFlavor::Class,
            "System".to_string(),
            "MulticastDelegate".to_string(),
            TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT,
            Some(&delegate),
            None,
        ));
        let array = Arc::new(RuntimeType::new(
            TOKEN_ARRAY,
            CilFlavor::Class,
            "System".to_string(),
            "Array".to_string(),
            TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT,
            Some(&object),
            None,
        ));
        for core in [&enum_type, &delegate, &multicast, &array] {
            registry.insert(core);
        }

        registry
    }

    /// Generate the next artificial token
    fn next_token(&self) -> Token {
        let next_token = self.next_token.fetch_add(1, Ordering::Relaxed);
        if next_token == 0xFFFF_FFFF {
            debug_assert!(
                false,
                "We ran out of tokens and are going overwrite existing ones"
            );
            self.next_token.store(0xF100_0000, Ordering::Relaxed);
        }

        Token::new(next_token)
    }

    /// Generate the next `TypeDef` token for a newly built type
    pub fn next_typedef_token(&self) -> Token {
        Token::from_parts(0x02, self.next_typedef.fetch_add(1, Ordering::Relaxed))
    }

    /// Insert a `RuntimeType` into the registry. Inserting a token twice keeps the first type.
    pub fn insert(&self, new_type: &TypeRc) {
        let token = new_type.token;
        if self.types.contains_key(&token) {
            return;
        }

        self.types.insert(token, new_type.clone());

        self.types_by_name
            .entry(new_type.name.clone())
            .or_default()
            .push(token);

        self.types_by_fullname
            .entry(new_type.fullname())
            .or_default()
            .push(token);
    }

    /// Get a type by its token
    pub fn get(&self, token: &Token) -> Option<TypeRc> {
        self.types.get(token).map(|entry| entry.value().clone())
    }

    /// Get a type by its token, failing if it is not registered
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] if no type carries `token`
    pub fn require(&self, token: &Token) -> Result<TypeRc> {
        self.get(token).ok_or(Error::TypeNotFound(*token))
    }

    /// Get the first type registered under a fully qualified name
    pub fn get_by_fullname(&self, fullname: &str) -> Option<TypeRc> {
        let tokens = self.types_by_fullname.get(fullname)?;
        tokens.value().iter().find_map(|token| self.get(token))
    }

    /// Get all types with a specific simple name across all namespaces
    pub fn get_by_name(&self, name: &str) -> Vec<TypeRc> {
        if let Some(tokens) = self.types_by_name.get(name) {
            tokens.iter().filter_map(|token| self.get(token)).collect()
        } else {
            Vec::new()
        }
    }

    /// Number of registered types (constructed types included)
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the registry holds no types
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The type backing a primitive kind
    pub fn primitive(&self, kind: CilPrimitiveKind) -> TypeRc {
        self.primitives[kind as usize].clone()
    }

    /// `System.Object`
    pub fn object(&self) -> TypeRc {
        self.primitive(CilPrimitiveKind::Object)
    }

    /// `System.Void`
    pub fn void(&self) -> TypeRc {
        self.primitive(CilPrimitiveKind::Void)
    }

    /// `System.String`
    pub fn string(&self) -> TypeRc {
        self.primitive(CilPrimitiveKind::String)
    }

    /// `System.ValueType`
    pub fn value_type(&self) -> TypeRc {
        self.primitive(CilPrimitiveKind::ValueType)
    }

    /// `System.Enum`
    pub fn enum_type(&self) -> TypeRc {
        self.core(TOKEN_ENUM)
    }

    /// `System.Delegate`
    pub fn delegate(&self) -> TypeRc {
        self.core(TOKEN_DELEGATE)
    }

    /// `System.MulticastDelegate`
    pub fn multicast_delegate(&self) -> TypeRc {
        self.core(TOKEN_MULTICAST_DELEGATE)
    }

    fn core(&self, token: Token) -> TypeRc {
        match self.get(&token) {
            Some(found) => found,
            // Core types are inserted in `new` and never removed
            None => unreachable!("core type {token} missing from registry"),
        }
    }

    /// The by-reference type `element&`
    pub fn make_by_ref(&self, element: &TypeRc) -> TypeRc {
        self.make_constructed(ConstructedKey::ByRef(element.token), element, || {
            (CilFlavor::ByRef, format!("{}&", element.name), None)
        })
    }

    /// The unmanaged pointer type `element*`
    pub fn make_pointer(&self, element: &TypeRc) -> TypeRc {
        self.make_constructed(ConstructedKey::Pointer(element.token), element, || {
            (CilFlavor::Pointer, format!("{}*", element.name), None)
        })
    }

    /// The single-dimensional, zero-based array type `element[]`
    pub fn make_array(&self, element: &TypeRc) -> TypeRc {
        self.make_array_of_rank(element, 1)
    }

    /// The array type of `element` with the given rank
    pub fn make_array_of_rank(&self, element: &TypeRc, rank: u32) -> TypeRc {
        let rank = rank.max(1);
        self.make_constructed(ConstructedKey::Array(element.token, rank), element, || {
            let commas = ",".repeat((rank - 1) as usize);
            (
                CilFlavor::Array { rank },
                format!("{}[{commas}]", element.name),
                Some(self.core(TOKEN_ARRAY)),
            )
        })
    }

    fn make_constructed<F>(&self, key: ConstructedKey, element: &TypeRc, describe: F) -> TypeRc
    where
        F: FnOnce() -> (CilFlavor, String, Option<TypeRc>),
    {
        if let Some(existing) = self.constructed.get(&key) {
            return existing.value().clone();
        }

        let (flavor, name, base) = describe();
        let entry = self.constructed.entry(key).or_insert_with(|| {
            Arc::new(RuntimeType::new(
                self.next_token(),
                flavor,
                element.namespace.clone(),
                name,
                TypeAttributes::empty(),
                base.as_ref(),
                Some(element.clone()),
            ))
        });
        let constructed = entry.value().clone();
        drop(entry);

        self.insert(&constructed);
        constructed
    }

    /// `method` as obtained through `reflected_type`.
    ///
    /// Asking for a method through the type it already reflects returns `method` itself, and
    /// asking through its declaring type returns the descriptor the declaring type lists.
    /// Any other combination is created once and interned.
    pub fn method_through(&self, method: &MethodRc, reflected_type: &TypeRc) -> MethodRc {
        if method
            .reflected_type()
            .is_some_and(|reflected| reflected.token == reflected_type.token)
        {
            return method.clone();
        }
        if let Some(declared) = declared_method(method, reflected_type) {
            return declared;
        }

        let key = MethodKey::new(method, Some(reflected_type.token), argument_tokens(method));
        self.intern_method(key, || {
            Arc::new(method.restamp(Some(TypeRef::new(reflected_type))))
        })
    }

    /// The instantiation of the generic method definition `definition` over `arguments`,
    /// created once per definition and argument list
    pub(crate) fn constructed_method(
        &self,
        definition: &MethodRc,
        arguments: Vec<TypeRc>,
    ) -> MethodRc {
        let key = MethodKey::new(
            definition,
            definition.reflected_type().map(|reflected| reflected.token),
            arguments.iter().map(|argument| argument.token).collect(),
        );
        self.intern_method(key, || {
            Arc::new(RuntimeMethod::constructed_generic(definition, arguments))
        })
    }

    fn intern_method<F>(&self, key: MethodKey, create: F) -> MethodRc
    where
        F: FnOnce() -> MethodRc,
    {
        if let Some(existing) = self.methods.get(&key) {
            return existing.value().clone();
        }
        self.methods.entry(key).or_insert_with(create).value().clone()
    }

    /// Create a generic parameter placeholder (`T` of a type when `method` is false, `T` of
    /// a method otherwise). Placeholders are not interned: each call yields a distinct type.
    pub fn make_generic_parameter(&self, name: &str, index: u32, method: bool) -> TypeRc {
        let parameter = Arc::new(RuntimeType::new(
            self.next_token(),
            CilFlavor::GenericParameter { index, method },
            String::new(),
            name.to_string(),
            TypeAttributes::empty(),
            Some(&self.object()),
            None,
        ));
        self.insert(&parameter);
        parameter
    }
}

/// The descriptor `reflected_type` lists for `method`, when `reflected_type` declares it
fn declared_method(method: &RuntimeMethod, reflected_type: &TypeRc) -> Option<MethodRc> {
    if !matches!(method.kind, MethodKind::Named | MethodKind::Constructor) {
        return None;
    }
    let declaring = method.declaring_type()?;
    if declaring.token != reflected_type.token {
        return None;
    }
    declaring.methods.iter().find_map(|(_, candidate)| {
        let listed = candidate.handle == method.handle
            && candidate
                .reflected_type()
                .is_some_and(|reflected| reflected.token == declaring.token);
        listed.then(|| candidate.clone())
    })
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
