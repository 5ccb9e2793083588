//! # dotreflect Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the dotreflect library. Import this module to get quick access to the essential
//! types for defining types and methods and reflecting over them.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotreflect operations
pub use crate::Error;

/// The result type used throughout dotreflect
pub use crate::Result;

// ================================================================================================
// Execution Environment
// ================================================================================================

/// The services reflection needs from the hosting runtime
pub use crate::runtime::ExecutionEnvironment;

/// In-memory execution environment and its configuration
pub use crate::runtime::{ReflectionConfig, RuntimeEnvironment};

/// Raw method signatures as the environment stores them
pub use crate::runtime::{MethodSignature, SignatureParameter};

/// Values passed to and returned from invocations
pub use crate::runtime::{Object, ObjectRc, Value};

// ================================================================================================
// Metadata Model
// ================================================================================================

/// Metadata token type for referencing table entries
pub use crate::metadata::token::Token;

/// Runtime types and their construction
pub use crate::metadata::typesystem::{
    CilFlavor, CilPrimitiveKind, RuntimeType, TypeAttributes, TypeBuilder, TypeRc, TypeRegistry,
};

/// Method descriptors and their construction
pub use crate::metadata::method::{
    CallingConventions, MethodAccessFlags, MethodAttributes, MethodBuilder, MethodHandle,
    MethodKind, MethodModifiers, MethodRc, MethodVtableFlags, ParamAttributes, ParamList,
    ParamRc, RuntimeMethod, RuntimeParameter,
};

// ================================================================================================
// Reflection
// ================================================================================================

/// Reflection capabilities of method descriptors
pub use crate::reflection::{ConstructorInfo, MethodBase, MethodInfo};

/// Delegate binding results
pub use crate::reflection::{BindFailure, Delegate, DelegateShape};

/// Invocation strategies
pub use crate::reflection::{InvokerKind, MethodInvoker, NativeMethod};

/// Field access
pub use crate::reflection::{
    FieldAccessor, FieldHandleInfo, InstanceFieldAccessor, ThreadStaticFieldAccessor,
};
