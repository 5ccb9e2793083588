//! Invocation strategies and the per-method invoker cache.
//!
//! Every method gets exactly one [`MethodInvoker`], created by the execution environment the
//! first time the method is invoked (or bound to a delegate) and cached on the method
//! afterwards. Two strategies exist:
//!
//! - [`DirectInvoker`] hands the caller's argument slice straight to the native body
//! - [`ThunkedInvoker`] copies the arguments into a scratch frame, runs the body on the frame
//!   and copies only the by-reference slots back to the caller
//!
//! Methods returning by reference never get an invoker: their result cannot be boxed into a
//! [`Value`], so [`invoker`] rejects them on every cache miss.

use std::sync::Arc;

use tracing::debug;

use crate::{
    metadata::method::{MethodKind, ParamList, RuntimeMethod},
    reflection::{assignability::is_assignable_from, parameters::runtime_parameters},
    runtime::{ExecutionEnvironment, Object, Value},
    Error, Result,
};

/// A native method body: receives `this` (for instance methods) and the argument slots, and
/// returns the boxed result (`Value::Null` for `void` methods)
pub type NativeMethod =
    Arc<dyn Fn(Option<&Value>, &mut [Value]) -> Result<Value> + Send + Sync>;

/// A shared invocation strategy
pub type InvokerRc = Arc<dyn MethodInvoker>;

/// How an invoker marshals arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokerKind {
    /// Arguments are passed through unchanged
    Direct,
    /// Arguments go through a scratch frame, by-ref slots are copied back
    Thunked,
}

/// The invocation strategy bound to exactly one method.
///
/// Invokers do not validate arguments; callers go through [`crate::reflection::MethodBase`]
/// which does.
pub trait MethodInvoker: Send + Sync {
    /// Dispatch the call
    ///
    /// # Errors
    /// Returns [`Error::NotSupported`] when the method has no body, or whatever the body
    /// returns
    fn invoke(&self, this: Option<&Value>, args: &mut [Value]) -> Result<Value>;

    /// The marshalling strategy of this invoker
    fn kind(&self) -> InvokerKind;

    /// The entry point address, as `ldftn` would produce it. `0` for methods without a body.
    fn ldftn_result(&self) -> usize;
}

fn entry_point(body: Option<&NativeMethod>) -> usize {
    body.map_or(0, |body| Arc::as_ptr(body).cast::<()>() as usize)
}

fn missing_body(method: &str) -> Error {
    Error::NotSupported(format!("Method '{method}' has no native body"))
}

/// Passes the caller's arguments straight to the body
pub struct DirectInvoker {
    method: String,
    body: Option<NativeMethod>,
}

impl DirectInvoker {
    /// Create a direct invoker for the method named `method`
    #[must_use]
    pub fn new(method: &str, body: Option<NativeMethod>) -> Self {
        DirectInvoker {
            method: method.to_string(),
            body,
        }
    }
}

impl MethodInvoker for DirectInvoker {
    fn invoke(&self, this: Option<&Value>, args: &mut [Value]) -> Result<Value> {
        match &self.body {
            Some(body) => body(this, args),
            None => Err(missing_body(&self.method)),
        }
    }

    fn kind(&self) -> InvokerKind {
        InvokerKind::Direct
    }

    fn ldftn_result(&self) -> usize {
        entry_point(self.body.as_ref())
    }
}

/// Runs the body on a private copy of the arguments and copies back the by-ref slots
pub struct ThunkedInvoker {
    method: String,
    body: Option<NativeMethod>,
    by_ref_slots: Vec<usize>,
}

impl ThunkedInvoker {
    /// Create a thunked invoker writing back the argument slots listed in `by_ref_slots`
    #[must_use]
    pub fn new(method: &str, body: Option<NativeMethod>, by_ref_slots: Vec<usize>) -> Self {
        ThunkedInvoker {
            method: method.to_string(),
            body,
            by_ref_slots,
        }
    }
}

impl MethodInvoker for ThunkedInvoker {
    fn invoke(&self, this: Option<&Value>, args: &mut [Value]) -> Result<Value> {
        let Some(body) = &self.body else {
            return Err(missing_body(&self.method));
        };

        let mut frame = args.to_vec();
        let result = body(this, &mut frame)?;

        for &slot in &self.by_ref_slots {
            if let (Some(caller), Some(callee)) = (args.get_mut(slot), frame.get_mut(slot)) {
                std::mem::swap(caller, callee);
            }
        }
        Ok(result)
    }

    fn kind(&self) -> InvokerKind {
        InvokerKind::Thunked
    }

    fn ldftn_result(&self) -> usize {
        entry_point(self.body.as_ref())
    }
}

/// The cached invoker of `method`, creating it on first use.
///
/// # Errors
/// Returns [`Error::NotSupported`] if the method returns by reference (checked on every
/// cache miss), [`Error::PlatformNotSupported`] for the synthetic CLSID constructor, or any
/// error the execution environment reports while creating the invoker
pub fn invoker(method: &RuntimeMethod, env: &dyn ExecutionEnvironment) -> Result<InvokerRc> {
    if let Some(cached) = method.lazy_invoker.get() {
        return Ok(cached);
    }

    let (parameters, return_parameter) = runtime_parameters(method, env);
    if return_parameter.parameter_type.is_by_ref() {
        return Err(Error::NotSupported(format!(
            "ByRef return type {} of '{method}' cannot be returned through reflection",
            return_parameter.parameter_type.display_name()
        )));
    }

    if matches!(method.kind, MethodKind::ClsidNullaryConstructor { .. }) {
        return Err(Error::PlatformNotSupported(
            "re-executing a constructor on an existing object",
        ));
    }

    let created = env.create_invoker(method, &parameters)?;
    debug!(method = %method, kind = ?created.kind(), "created invoker");
    Ok(method.lazy_invoker.publish(created))
}

/// Check the argument count, `this` and (if configured) the argument types of an invocation
fn validate_arguments(
    method: &RuntimeMethod,
    env: &dyn ExecutionEnvironment,
    this: Option<&Value>,
    args: &[Value],
    parameters: &ParamList,
) -> Result<()> {
    if args.len() != parameters.len() {
        return Err(Error::TargetParameterCount {
            expected: parameters.len(),
            actual: args.len(),
        });
    }

    let validate = env.config().validate_invoke_arguments;

    if !method.is_static() {
        let this_type = match this.and_then(|this| env.type_of(this)) {
            Some(this_type) => this_type,
            None => return Err(Error::ArgumentNull("obj")),
        };
        if validate {
            if let Some(declaring) = method.declaring_type() {
                if !is_assignable_from(env, &declaring, &this_type) {
                    return Err(invalid_argument!(
                        param = "obj",
                        "Object of type {} does not match target type {}",
                        this_type.fullname(),
                        declaring.fullname()
                    ));
                }
            }
        }
    }

    if !validate {
        return Ok(());
    }

    for (arg, parameter) in args.iter().zip(parameters.iter()) {
        let expected = match parameter.parameter_type.element_type() {
            Some(element) if parameter.is_by_ref() => element,
            _ => parameter.parameter_type.clone(),
        };

        match env.type_of(arg) {
            None if expected.is_value_type() => {
                return Err(invalid_argument!(
                    param = "parameters",
                    "Null cannot be passed for parameter {} of value type {}",
                    parameter.position,
                    expected.fullname()
                ));
            }
            None => {}
            Some(actual) => {
                if !is_assignable_from(env, &expected, &actual) {
                    return Err(invalid_argument!(
                        param = "parameters",
                        "Object of type {} cannot be converted to type {} for parameter {}",
                        actual.fullname(),
                        expected.fullname(),
                        parameter.position
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Invoke `method` through its cached invoker.
///
/// A missing argument list is treated as an empty one. Constructors cannot be re-executed on
/// an existing object through this path; use [`construct`].
///
/// # Errors
/// - [`Error::PlatformNotSupported`] for constructors
/// - [`Error::NotSupported`] for by-ref returns and methods without a body
/// - [`Error::TargetParameterCount`] on an argument count mismatch
/// - [`Error::ArgumentNull`] for an instance method invoked without `this`
/// - [`Error::InvalidArgument`] for arguments of the wrong type
pub fn invoke(
    method: &RuntimeMethod,
    env: &dyn ExecutionEnvironment,
    this: Option<&Value>,
    args: Option<&mut [Value]>,
) -> Result<Value> {
    if method.is_constructor() {
        return Err(Error::PlatformNotSupported(
            "re-executing a constructor on an existing object",
        ));
    }

    let mut no_args: [Value; 0] = [];
    let args = args.unwrap_or(&mut no_args);

    let invoker = invoker(method, env)?;
    let (parameters, _) = runtime_parameters(method, env);
    validate_arguments(method, env, this, args, &parameters)?;
    invoker.invoke(this, args)
}

/// Create a new instance of the constructor's declaring type and run the constructor on it.
///
/// # Errors
/// - [`Error::InvalidOperation`] if `method` is not an instance constructor of a concrete type
/// - [`Error::TargetParameterCount`] if arguments are passed to the synthetic CLSID
///   constructor, [`Error::NotSupported`] if none are (COM activation is not implemented)
/// - any error [`invoke`] would report for the arguments
pub fn construct(
    method: &RuntimeMethod,
    env: &dyn ExecutionEnvironment,
    args: Option<&mut [Value]>,
) -> Result<Value> {
    let mut no_args: [Value; 0] = [];
    let args = args.unwrap_or(&mut no_args);

    match &method.kind {
        MethodKind::ClsidNullaryConstructor { clsid, server } => {
            if !args.is_empty() {
                return Err(Error::TargetParameterCount {
                    expected: 0,
                    actual: args.len(),
                });
            }
            return Err(Error::NotSupported(format!(
                "Activating COM class {clsid} on {} is not implemented",
                server.as_deref().unwrap_or("the local machine")
            )));
        }
        MethodKind::Constructor if !method.is_static() => {}
        _ => {
            return Err(Error::InvalidOperation(format!(
                "'{method}' is not an instance constructor"
            )));
        }
    }

    let declaring = method.declaring_type().ok_or_else(|| {
        Error::InvalidOperation(format!("Constructor '{method}' has no declaring type"))
    })?;
    if declaring.is_abstract() {
        return Err(Error::InvalidOperation(format!(
            "Cannot create an instance of abstract type {}",
            declaring.fullname()
        )));
    }

    let invoker = invoker(method, env)?;
    let (parameters, _) = runtime_parameters(method, env);
    let instance = Value::Object(Object::new(&declaring));
    validate_arguments(method, env, Some(&instance), args, &parameters)?;
    invoker.invoke(Some(&instance), args)?;
    Ok(instance)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::test::{create_enum_value, create_instance_with, FixtureEnvironment};

    fn doubling_body() -> NativeMethod {
        Arc::new(|_: Option<&Value>, args: &mut [Value]| -> Result<Value> {
            for arg in args.iter_mut() {
                if let Value::I4(value) = arg {
                    *value *= 2;
                }
            }
            Ok(Value::Null)
        })
    }

    #[test]
    fn test_direct_invoker_passes_through() -> Result<()> {
        let invoker = DirectInvoker::new("Double", Some(doubling_body()));
        let mut args = [Value::I4(1), Value::I4(2)];
        invoker.invoke(None, &mut args)?;

        assert_eq!(args, [Value::I4(2), Value::I4(4)]);
        assert_eq!(invoker.kind(), InvokerKind::Direct);
        assert_ne!(invoker.ldftn_result(), 0);
        Ok(())
    }

    #[test]
    fn test_thunked_invoker_copies_back_by_ref_slots_only() -> Result<()> {
        let invoker = ThunkedInvoker::new("Double", Some(doubling_body()), vec![1]);
        let mut args = [Value::I4(1), Value::I4(2)];
        invoker.invoke(None, &mut args)?;

        assert_eq!(args, [Value::I4(1), Value::I4(4)]);
        assert_eq!(invoker.kind(), InvokerKind::Thunked);
        Ok(())
    }

    #[test]
    fn test_missing_body() {
        let direct = DirectInvoker::new("Nothing", None);
        assert!(matches!(
            direct.invoke(None, &mut []),
            Err(Error::NotSupported(_))
        ));
        assert_eq!(direct.ldftn_result(), 0);

        let thunked = ThunkedInvoker::new("Nothing", None, vec![0]);
        assert!(matches!(
            thunked.invoke(None, &mut [Value::I4(0)]),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn test_body_errors_propagate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let body: NativeMethod =
            Arc::new(move |_: Option<&Value>, _: &mut [Value]| -> Result<Value> {
                counter.fetch_add(1, Ordering::Relaxed);
                Err(Error::Error("boom".to_string()))
            });

        let invoker = ThunkedInvoker::new("Fail", Some(body), vec![0]);
        let mut args = [Value::I4(7)];
        assert!(matches!(invoker.invoke(None, &mut args), Err(Error::Error(_))));
        assert_eq!(args, [Value::I4(7)]);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_invoke_caches_invoker() -> Result<()> {
        let fixture = FixtureEnvironment::new()?;
        assert!(!fixture.add.has_cached_invoker());

        let mut args = [Value::I4(2), Value::I4(3)];
        let result = invoke(&fixture.add, &fixture.env, None, Some(&mut args))?;
        assert_eq!(result, Value::I4(5));
        assert!(fixture.add.has_cached_invoker());

        let first = invoker(&fixture.add, &fixture.env)?;
        let second = invoker(&fixture.add, &fixture.env)?;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.kind(), InvokerKind::Direct);
        Ok(())
    }

    #[test]
    fn test_by_ref_parameters_are_written_back() -> Result<()> {
        let fixture = FixtureEnvironment::new()?;
        let mut args = [Value::I4(41)];
        invoke(&fixture.increment, &fixture.env, None, Some(&mut args))?;

        assert_eq!(args, [Value::I4(42)]);
        assert_eq!(
            invoker(&fixture.increment, &fixture.env)?.kind(),
            InvokerKind::Thunked
        );
        Ok(())
    }

    #[test]
    fn test_by_ref_return_is_rejected_on_every_call() -> Result<()> {
        let fixture = FixtureEnvironment::new()?;
        for _ in 0..2 {
            assert!(matches!(
                invoke(&fixture.slot, &fixture.env, None, None),
                Err(Error::NotSupported(_))
            ));
        }
        assert!(!fixture.slot.has_cached_invoker());
        assert!(fixture.slot.has_cached_parameters());
        Ok(())
    }

    #[test]
    fn test_argument_validation() -> Result<()> {
        let fixture = FixtureEnvironment::new()?;

        assert!(matches!(
            invoke(&fixture.add, &fixture.env, None, Some(&mut [Value::I4(1)])),
            Err(Error::TargetParameterCount {
                expected: 2,
                actual: 1
            })
        ));
        assert!(matches!(
            invoke(&fixture.add, &fixture.env, None, None),
            Err(Error::TargetParameterCount {
                expected: 2,
                actual: 0
            })
        ));
        assert!(matches!(
            invoke(
                &fixture.add,
                &fixture.env,
                None,
                Some(&mut [Value::I4(1), Value::string("two")])
            ),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            invoke(
                &fixture.add,
                &fixture.env,
                None,
                Some(&mut [Value::I4(1), Value::Null])
            ),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            invoke(&fixture.m_add_bias, &fixture.env, None, Some(&mut [Value::I4(1)])),
            Err(Error::ArgumentNull("obj"))
        ));

        let stranger = create_instance_with(&fixture.base, "bias", 1);
        assert!(matches!(
            invoke(
                &fixture.m_add_bias,
                &fixture.env,
                Some(&stranger),
                Some(&mut [Value::I4(1)])
            ),
            Err(Error::InvalidArgument { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_enum_argument_for_underlying_parameter() -> Result<()> {
        let fixture = FixtureEnvironment::new()?;
        let mut args = [create_enum_value(&fixture.color, 3)];
        let result = invoke(&fixture.negate, &fixture.env, None, Some(&mut args))?;
        assert_eq!(result, Value::I4(-3));

        let mut args = [create_enum_value(&fixture.wide, 3)];
        assert!(matches!(
            invoke(&fixture.negate, &fixture.env, None, Some(&mut args)),
            Err(Error::InvalidArgument { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_instance_invocation() -> Result<()> {
        let fixture = FixtureEnvironment::new()?;
        let this = create_instance_with(&fixture.m, "bias", 10);
        let result = invoke(
            &fixture.m_add_bias,
            &fixture.env,
            Some(&this),
            Some(&mut [Value::I4(5)]),
        )?;
        assert_eq!(result, Value::I4(15));
        Ok(())
    }

    #[test]
    fn test_missing_body_surfaces_on_invoke() -> Result<()> {
        let fixture = FixtureEnvironment::new()?;
        assert!(matches!(
            invoke(&fixture.nothing, &fixture.env, None, None),
            Err(Error::NotSupported(_))
        ));
        Ok(())
    }

    #[test]
    fn test_constructors() -> Result<()> {
        let fixture = FixtureEnvironment::new()?;

        let instance = construct(&fixture.m_ctor, &fixture.env, Some(&mut [Value::I4(7)]))?;
        let bias = instance
            .as_object()
            .and_then(|object| object.field("bias"));
        assert_eq!(bias, Some(Value::I4(7)));
        assert_eq!(
            fixture.env.type_of(&instance).map(|ty| ty.token),
            Some(fixture.m.token)
        );

        assert!(matches!(
            invoke(&fixture.m_ctor, &fixture.env, Some(&instance), Some(&mut [Value::I4(1)])),
            Err(Error::PlatformNotSupported(_))
        ));
        assert!(matches!(
            construct(&fixture.add, &fixture.env, None),
            Err(Error::InvalidOperation(_))
        ));
        Ok(())
    }

    #[test]
    fn test_clsid_constructor() -> Result<()> {
        let fixture = FixtureEnvironment::new()?;
        let clsid = uguid::guid!("00020810-0000-0000-c000-000000000046");
        let ctor = RuntimeMethod::clsid_nullary_constructor(&fixture.m, clsid, None);

        assert!(matches!(
            construct(&ctor, &fixture.env, Some(&mut [Value::I4(1)])),
            Err(Error::TargetParameterCount {
                expected: 0,
                actual: 1
            })
        ));
        assert!(matches!(
            construct(&ctor, &fixture.env, None),
            Err(Error::NotSupported(_))
        ));
        assert!(matches!(
            invoker(&ctor, &fixture.env),
            Err(Error::PlatformNotSupported(_))
        ));
        Ok(())
    }
}
