//! Runtime reflection over method descriptors.
//!
//! This module turns a [`RuntimeMethod`] into something general-purpose code can call and
//! inspect without static type information. It is built from a handful of cooperating pieces:
//!
//! - the parameter cache, materialising the parameter list and return parameter of a method
//!   once and sharing them afterwards
//! - the invoker cache, choosing and caching the [`MethodInvoker`] a method is called through
//! - the base definition resolver, following implicit virtual overrides to the slot introducer
//! - the assignability oracle, the enum-aware compatibility check used by binding
//! - the delegate binder, matching a method against a delegate type in one of four shapes
//!
//! All caches are [`LazySlot`]s: concurrent first use computes redundantly and the first
//! published value wins, without any thread waiting on another.
//!
//! # Key Components
//!
//! - [`MethodBase`] - Operations common to methods and constructors
//! - [`MethodInfo`] - Method-only operations (return parameter, delegates, generics)
//! - [`ConstructorInfo`] - Object construction
//! - [`Delegate`] / [`BindFailure`] - Binding results
//! - [`FieldAccessor`] - Field reads and writes
//!
//! # Examples
//!
//! ```rust
//! use dotreflect::prelude::*;
//!
//! let env = RuntimeEnvironment::new();
//! let int32 = env.types().primitive(CilPrimitiveKind::I4);
//! let math = TypeBuilder::class("Demo", "Math").build(env.types())?;
//! let negate = MethodBuilder::new("Negate")
//!     .static_()
//!     .returns(&int32)
//!     .param("value", &int32)
//!     .body(|_, args| Ok(Value::I4(-args[0].as_i32().unwrap_or_default())))
//!     .build(&env, Some(&math))?;
//!
//! let unary = env.define_delegate("Demo", "Unary", &int32, &[int32.clone()])?;
//! let delegate = negate.create_delegate(&env, &unary)?;
//! assert_eq!(delegate.dynamic_invoke(&mut [Value::I4(4)])?, Value::I4(-4));
//! # Ok::<(), dotreflect::Error>(())
//! ```

mod assignability;
mod base_definition;
mod cache;
mod delegates;
mod fields;
mod invoker;
mod parameters;

pub use assignability::is_assignable_from;
pub use cache::LazySlot;
pub use delegates::{BindFailure, Delegate, DelegateShape};
pub use fields::{
    FieldAccessor, FieldHandleInfo, InstanceFieldAccessor, ThreadStaticFieldAccessor,
};
pub use invoker::{
    DirectInvoker, InvokerKind, InvokerRc, MethodInvoker, NativeMethod, ThunkedInvoker,
};

use tracing::trace;

use crate::{
    metadata::{
        method::{
            CallingConventions, MethodAttributes, MethodKind, MethodRc, ParamList, ParamRc,
            RuntimeMethod,
        },
        typesystem::{CilFlavor, TypeRc},
    },
    runtime::{ExecutionEnvironment, Value},
    Error, Result,
};

fn trace_entry(env: &dyn ExecutionEnvironment, entry: &'static str, method: &RuntimeMethod) {
    if env.config().trace_calls {
        trace!(entry = entry, method = %method, "reflection call");
    }
}

/// Operations shared by every kind of method descriptor
pub trait MethodBase {
    /// The attribute word of the method
    fn attributes(&self) -> MethodAttributes;

    /// The managed calling convention
    fn calling_convention(&self) -> CallingConventions;

    /// The formal parameters, computed once and cached on the method
    fn parameters(&self, env: &dyn ExecutionEnvironment) -> ParamList;

    /// Invoke the method on `this` with `args` (a missing argument list means no arguments).
    /// By-ref arguments are written back to `args`.
    ///
    /// # Errors
    /// See [`invoker::invoke`]: constructors, by-ref returns, argument count and type
    /// mismatches, a missing `this`, and errors raised by the method body
    fn invoke(
        &self,
        env: &dyn ExecutionEnvironment,
        this: Option<&Value>,
        args: Option<&mut [Value]>,
    ) -> Result<Value>;

    /// The method that introduced the virtual slot this method occupies
    fn base_definition(&self, env: &dyn ExecutionEnvironment) -> MethodRc;
}

/// Operations available on methods (as opposed to constructors)
pub trait MethodInfo: MethodBase {
    /// The return parameter, cached together with the parameters
    fn return_parameter(&self, env: &dyn ExecutionEnvironment) -> ParamRc;

    /// The return type
    fn return_type(&self, env: &dyn ExecutionEnvironment) -> TypeRc;

    /// Bind an open delegate of type `delegate_type` to this method
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] for a non-delegate type or incompatible signatures
    fn create_delegate(
        &self,
        env: &dyn ExecutionEnvironment,
        delegate_type: &TypeRc,
    ) -> Result<Delegate>;

    /// Bind a delegate of type `delegate_type`, closed over `target` if the shape allows it
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] for a non-delegate type or incompatible signatures
    fn create_delegate_with_target(
        &self,
        env: &dyn ExecutionEnvironment,
        delegate_type: &TypeRc,
        target: &Value,
    ) -> Result<Delegate>;

    /// Bind a delegate, reporting incompatible signatures as the inner [`BindFailure`]
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] if `delegate_type` is not a delegate type
    fn try_create_delegate(
        &self,
        env: &dyn ExecutionEnvironment,
        delegate_type: &TypeRc,
        target: Option<&Value>,
        allow_closed: bool,
    ) -> Result<std::result::Result<Delegate, BindFailure>>;

    /// The generic method definition this method is or instantiates
    ///
    /// # Errors
    /// Returns [`Error::InvalidOperation`] if the method is not generic
    fn generic_method_definition(&self) -> Result<MethodRc>;

    /// Instantiate this generic method definition over `type_arguments`
    ///
    /// # Errors
    /// Returns [`Error::InvalidOperation`] if this is not a generic method definition, and
    /// [`Error::InvalidArgument`] if the number of arguments does not match or an argument
    /// cannot be a generic argument (by-ref, pointer, `System.Void`)
    fn make_generic_method(
        &self,
        env: &dyn ExecutionEnvironment,
        type_arguments: &[TypeRc],
    ) -> Result<MethodRc>;

    /// The method as defined in metadata: the generic definition of an instantiation,
    /// the method itself otherwise
    ///
    /// # Errors
    /// Returns [`Error::NotSupported`] for the synthetic CLSID constructor
    fn metadata_definition_method(&self) -> Result<MethodRc>;

    /// The entry point `ldftn` yields for this method
    ///
    /// # Errors
    /// Any error raised while creating the method's invoker
    fn ldftn_result(&self, env: &dyn ExecutionEnvironment) -> Result<usize>;

    /// The signature as text, e.g. `Int32 Parse(System.String, Int32&)`
    fn signature(&self, env: &dyn ExecutionEnvironment) -> String;
}

/// Object construction through an instance constructor
pub trait ConstructorInfo: MethodBase {
    /// Allocate an instance of the declaring type and run this constructor on it
    ///
    /// # Errors
    /// Any error raised while validating the arguments or running the constructor
    fn construct(
        &self,
        env: &dyn ExecutionEnvironment,
        args: Option<&mut [Value]>,
    ) -> Result<Value>;
}

impl MethodBase for MethodRc {
    fn attributes(&self) -> MethodAttributes {
        self.attribute_flags()
    }

    fn calling_convention(&self) -> CallingConventions {
        self.calling_convention
    }

    fn parameters(&self, env: &dyn ExecutionEnvironment) -> ParamList {
        trace_entry(env, "MethodBase.GetParameters", self);
        parameters::parameters(self, env)
    }

    fn invoke(
        &self,
        env: &dyn ExecutionEnvironment,
        this: Option<&Value>,
        args: Option<&mut [Value]>,
    ) -> Result<Value> {
        trace_entry(env, "MethodBase.Invoke", self);
        invoker::invoke(self, env, this, args)
    }

    fn base_definition(&self, env: &dyn ExecutionEnvironment) -> MethodRc {
        trace_entry(env, "MethodInfo.GetBaseDefinition", self);
        base_definition::base_definition(self, env)
    }
}

impl MethodInfo for MethodRc {
    fn return_parameter(&self, env: &dyn ExecutionEnvironment) -> ParamRc {
        parameters::return_parameter(self, env)
    }

    fn return_type(&self, env: &dyn ExecutionEnvironment) -> TypeRc {
        parameters::return_parameter(self, env).parameter_type.clone()
    }

    fn create_delegate(
        &self,
        env: &dyn ExecutionEnvironment,
        delegate_type: &TypeRc,
    ) -> Result<Delegate> {
        trace_entry(env, "MethodInfo.CreateDelegate", self);
        delegates::create_delegate(self, env, delegate_type)
    }

    fn create_delegate_with_target(
        &self,
        env: &dyn ExecutionEnvironment,
        delegate_type: &TypeRc,
        target: &Value,
    ) -> Result<Delegate> {
        trace_entry(env, "MethodInfo.CreateDelegate", self);
        delegates::create_delegate_with_target(self, env, delegate_type, target)
    }

    fn try_create_delegate(
        &self,
        env: &dyn ExecutionEnvironment,
        delegate_type: &TypeRc,
        target: Option<&Value>,
        allow_closed: bool,
    ) -> Result<std::result::Result<Delegate, BindFailure>> {
        trace_entry(env, "MethodInfo.CreateDelegate", self);
        delegates::try_bind(self, env, delegate_type, target, allow_closed)
    }

    fn generic_method_definition(&self) -> Result<MethodRc> {
        match &self.kind {
            MethodKind::ConstructedGeneric { definition, .. } => Ok(definition.clone()),
            _ if self.is_generic_method_definition() => Ok(self.clone()),
            _ => Err(Error::InvalidOperation(format!(
                "'{self}' is not a generic method"
            ))),
        }
    }

    fn make_generic_method(
        &self,
        env: &dyn ExecutionEnvironment,
        type_arguments: &[TypeRc],
    ) -> Result<MethodRc> {
        if !self.is_generic_method_definition() {
            return Err(Error::InvalidOperation(format!(
                "'{self}' is not a generic method definition"
            )));
        }
        if type_arguments.len() != self.generic_params.len() {
            return Err(invalid_argument!(
                param = "type_arguments",
                "'{}' takes {} generic arguments, {} were supplied",
                self,
                self.generic_params.len(),
                type_arguments.len()
            ));
        }
        if let Some(invalid) = type_arguments.iter().find(|argument| {
            matches!(
                argument.flavor,
                CilFlavor::ByRef | CilFlavor::Pointer | CilFlavor::Void
            )
        }) {
            return Err(invalid_argument!(
                param = "type_arguments",
                "{} cannot be used as a generic argument",
                invalid.display_name()
            ));
        }

        let constructed = env.types().constructed_method(self, type_arguments.to_vec());
        constructed.populate_debug_name(env.config());
        Ok(constructed)
    }

    fn metadata_definition_method(&self) -> Result<MethodRc> {
        match &self.kind {
            MethodKind::ClsidNullaryConstructor { .. } => Err(Error::NotSupported(
                "A synthetic constructor has no metadata definition".to_string(),
            )),
            MethodKind::ConstructedGeneric { definition, .. } => Ok(definition.clone()),
            _ => Ok(self.clone()),
        }
    }

    fn ldftn_result(&self, env: &dyn ExecutionEnvironment) -> Result<usize> {
        Ok(invoker::invoker(self, env)?.ldftn_result())
    }

    fn signature(&self, env: &dyn ExecutionEnvironment) -> String {
        let (parameters, return_parameter) = parameters::runtime_parameters(self, env);

        let mut signature = format!(
            "{} {}",
            return_parameter.parameter_type.display_name(),
            self.name
        );
        if self.is_generic_method() {
            let arguments: Vec<String> = self
                .generic_arguments()
                .iter()
                .map(|argument| argument.display_name())
                .collect();
            signature.push('[');
            signature.push_str(&arguments.join(","));
            signature.push(']');
        }

        let parameters: Vec<String> = parameters
            .iter()
            .map(|parameter| parameter.parameter_type.display_name())
            .collect();
        signature.push('(');
        signature.push_str(&parameters.join(", "));
        signature.push(')');
        signature
    }
}

impl ConstructorInfo for MethodRc {
    fn construct(
        &self,
        env: &dyn ExecutionEnvironment,
        args: Option<&mut [Value]>,
    ) -> Result<Value> {
        trace_entry(env, "ConstructorInfo.Invoke", self);
        invoker::construct(self, env, args)
    }
}
