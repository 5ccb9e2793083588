//! The execution environment reflection runs on.
//!
//! Reflection does not know how methods are laid out or dispatched. It asks an
//! [`ExecutionEnvironment`] for the raw signature of a method, for the general (enum-unaware)
//! assignability between two types, for the runtime type of a value and for an invoker that
//! can call a method. [`RuntimeEnvironment`] is the in-memory implementation used by this
//! crate: it owns a [`crate::metadata::typesystem::TypeRegistry`], stores method signatures
//! and native Rust bodies keyed by [`crate::metadata::method::MethodHandle`], and hands out
//! tokens and handles for newly defined methods.
//!
//! # Key Components
//!
//! - [`ExecutionEnvironment`] - The narrow interface the reflection layer consumes
//! - [`RuntimeEnvironment`] - Concurrent in-memory environment
//! - [`ReflectionConfig`] - Diagnostics and validation switches
//! - [`Value`] / [`Object`] - Boxed values passed to and returned from invocations

mod config;
mod environment;
mod value;

pub use config::ReflectionConfig;
pub use environment::RuntimeEnvironment;
pub use value::{Object, ObjectRc, Value};

use crate::{
    metadata::{
        method::{ParamList, RuntimeMethod},
        typesystem::{RuntimeType, TypeRc, TypeRegistry},
    },
    reflection::InvokerRc,
    Result,
};

/// One parameter of a raw method signature
#[derive(Debug, Clone)]
pub struct SignatureParameter {
    /// Parameter name, if known
    pub name: Option<String>,
    /// Declared type, by-ref parameters use the by-ref type
    pub parameter_type: TypeRc,
    /// bitmask of `ParamAttributes`
    pub attributes: u32,
}

/// The raw signature of a method as the execution environment stores it
#[derive(Debug, Clone)]
pub struct MethodSignature {
    /// The return type, `System.Void` for methods without a result
    pub return_type: TypeRc,
    /// Parameters in declaration order, excluding `this`
    pub parameters: Vec<SignatureParameter>,
}

/// The services the reflection layer needs from the runtime hosting it.
///
/// Implementations must be usable from many threads at once; reflection never holds locks
/// while calling into them.
pub trait ExecutionEnvironment: Send + Sync {
    /// The reflection configuration in effect
    fn config(&self) -> &ReflectionConfig;

    /// The registry owning every type of this environment
    fn types(&self) -> &TypeRegistry;

    /// Raw parameter and return-type enumeration for a method. Instantiated generic methods
    /// report their signature with the generic arguments substituted.
    fn method_signature(&self, method: &RuntimeMethod) -> MethodSignature;

    /// General assignability: may a value of type `src` be stored in a location of type
    /// `dst`? Covers identity, inheritance, interface implementation and array covariance,
    /// but knows nothing about enum/underlying type equivalence.
    fn is_assignable_from(&self, dst: &RuntimeType, src: &RuntimeType) -> bool;

    /// The exact runtime type of a value, `None` for the null reference
    fn type_of(&self, value: &Value) -> Option<TypeRc>;

    /// Create the invocation strategy for `method`, whose parameters have already been
    /// computed.
    ///
    /// # Errors
    /// Returns an error if the environment cannot produce an invoker for this method
    fn create_invoker(&self, method: &RuntimeMethod, parameters: &ParamList) -> Result<InvokerRc>;
}
