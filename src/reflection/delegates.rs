//! Delegate binding.
//!
//! Binding decides whether a method can stand behind a delegate type and, if so, in which of
//! four shapes. The shape follows from the method being static or not and from whether the
//! delegate's `Invoke` takes as many parameters as the method:
//!
//! | method   | equal counts     | counts differ by one                           |
//! |----------|------------------|------------------------------------------------|
//! | static   | open static      | closed static (target is the first argument)   |
//! | instance | closed instance  | open instance (`this` is the first argument)   |
//!
//! Parameters are compared with [`is_assignable_from`] in the contravariant direction: a value
//! passed to the delegate must be acceptable to the method. The return type is compared the
//! other way around.
//!
//! An incompatible signature is not an error. The binder reports it as a [`BindFailure`] and
//! leaves the decision to the caller; only misuse (a type that is not a delegate) is an
//! [`Error`].

use std::fmt;

use tracing::debug;

use crate::{
    metadata::{
        method::{MethodRc, ParamList},
        typesystem::TypeRc,
    },
    reflection::{
        assignability::is_assignable_from,
        invoker::{invoker, InvokerRc},
        parameters::runtime_parameters,
    },
    runtime::{ExecutionEnvironment, Value},
    Error, Result,
};

/// How a bound delegate passes its target and arguments to the method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelegateShape {
    /// Static method, delegate and method take the same parameters
    OpenStatic,
    /// Static method whose first parameter is bound to the delegate target
    ClosedStatic,
    /// Instance method invoked on the delegate target
    ClosedInstance,
    /// Instance method whose `this` is the first delegate argument
    OpenInstance,
}

impl DelegateShape {
    /// Build the shape from the method's staticness and the openness of the binding
    #[must_use]
    pub fn from_flags(is_static: bool, is_open: bool) -> Self {
        match (is_static, is_open) {
            (true, true) => DelegateShape::OpenStatic,
            (true, false) => DelegateShape::ClosedStatic,
            (false, false) => DelegateShape::ClosedInstance,
            (false, true) => DelegateShape::OpenInstance,
        }
    }

    /// Does the delegate call a static method
    #[must_use]
    pub fn is_static(&self) -> bool {
        matches!(self, DelegateShape::OpenStatic | DelegateShape::ClosedStatic)
    }

    /// Is the delegate unbound, i.e. everything comes from the call arguments
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, DelegateShape::OpenStatic | DelegateShape::OpenInstance)
    }
}

/// Why a method cannot be bound to a delegate type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindFailure {
    /// The method's return type does not fit the delegate's return type
    ReturnTypeMismatch,
    /// A target was supplied for an open binding
    TargetNotAllowed,
    /// The binding would be closed, but the caller only accepts open bindings
    ClosedNotAllowed,
    /// The shape needs a leading parameter the signature does not have
    MissingLeadingParameter,
    /// The target does not fit the method's first parameter or declaring type
    TargetTypeMismatch,
    /// The delegate's leading parameter does not fit the method's declaring type
    LeadingParameterMismatch,
    /// A delegate parameter does not fit the corresponding method parameter
    ParameterMismatch {
        /// Position of the delegate parameter
        position: i32,
    },
    /// The remaining parameters cannot be paired up
    ParameterCountMismatch,
}

impl fmt::Display for BindFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindFailure::ReturnTypeMismatch => f.write_str("return type mismatch"),
            BindFailure::TargetNotAllowed => {
                f.write_str("a target cannot be bound to an open delegate")
            }
            BindFailure::ClosedNotAllowed => f.write_str("closed delegates are not allowed"),
            BindFailure::MissingLeadingParameter => f.write_str("missing leading parameter"),
            BindFailure::TargetTypeMismatch => f.write_str("target type mismatch"),
            BindFailure::LeadingParameterMismatch => {
                f.write_str("leading parameter does not accept the declaring type")
            }
            BindFailure::ParameterMismatch { position } => {
                write!(f, "parameter {position} type mismatch")
            }
            BindFailure::ParameterCountMismatch => f.write_str("parameter count mismatch"),
        }
    }
}

/// A method bound to a delegate type
pub struct Delegate {
    delegate_type: TypeRc,
    method: MethodRc,
    target: Option<Value>,
    shape: DelegateShape,
    invoker: InvokerRc,
    parameter_count: usize,
}

impl Delegate {
    /// The delegate type
    #[must_use]
    pub fn delegate_type(&self) -> TypeRc {
        self.delegate_type.clone()
    }

    /// The bound method
    #[must_use]
    pub fn method(&self) -> &MethodRc {
        &self.method
    }

    /// The bound target, `None` for open delegates and closed delegates over null
    #[must_use]
    pub fn target(&self) -> Option<&Value> {
        self.target.as_ref()
    }

    /// The binding shape
    #[must_use]
    pub fn shape(&self) -> DelegateShape {
        self.shape
    }

    /// Call the bound method with the arguments of the delegate's `Invoke` signature.
    ///
    /// By-ref arguments are written back to `args`.
    ///
    /// # Errors
    /// Returns [`Error::TargetParameterCount`] if `args` does not match the delegate
    /// signature, [`Error::ArgumentNull`] if an instance method would run on null, or
    /// whatever the method reports
    pub fn dynamic_invoke(&self, args: &mut [Value]) -> Result<Value> {
        if args.len() != self.parameter_count {
            return Err(Error::TargetParameterCount {
                expected: self.parameter_count,
                actual: args.len(),
            });
        }

        match self.shape {
            DelegateShape::OpenStatic => self.invoker.invoke(None, args),
            DelegateShape::ClosedStatic => {
                let mut frame = Vec::with_capacity(args.len() + 1);
                frame.push(self.target.clone().unwrap_or(Value::Null));
                frame.extend(args.iter().cloned());

                let result = self.invoker.invoke(None, &mut frame)?;
                for (caller, callee) in args.iter_mut().zip(frame.into_iter().skip(1)) {
                    *caller = callee;
                }
                Ok(result)
            }
            DelegateShape::ClosedInstance => match &self.target {
                Some(target) => self.invoker.invoke(Some(target), args),
                None => Err(Error::ArgumentNull("obj")),
            },
            DelegateShape::OpenInstance => match args.split_first_mut() {
                Some((this, rest)) if !this.is_null() => self.invoker.invoke(Some(this), rest),
                _ => Err(Error::ArgumentNull("obj")),
            },
        }
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("delegate_type", &self.delegate_type.fullname())
            .field("method", &self.method.to_string())
            .field("shape", &self.shape)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Bind `method` to `delegate_type`, reporting an incompatible signature as [`BindFailure`].
///
/// A target of `Value::Null` is the same as no target.
///
/// # Errors
/// Returns [`Error::InvalidArgument`] if `delegate_type` is not a concrete delegate type or
/// has no `Invoke` method, or any error raised while creating the method's invoker
pub fn try_bind(
    method: &MethodRc,
    env: &dyn ExecutionEnvironment,
    delegate_type: &TypeRc,
    target: Option<&Value>,
    allow_closed: bool,
) -> Result<std::result::Result<Delegate, BindFailure>> {
    if !delegate_type.is_delegate() {
        return Err(invalid_argument!(
            param = "delegate_type",
            "Type {} must derive from System.Delegate",
            delegate_type.fullname()
        ));
    }
    let Some(invoke_method) = delegate_type.delegate_invoke_method() else {
        return Err(invalid_argument!(
            param = "delegate_type",
            "Delegate type {} has no Invoke method",
            delegate_type.fullname()
        ));
    };

    let target = target.filter(|target| !target.is_null());
    let (delegate_params, delegate_return) = runtime_parameters(&invoke_method, env);
    let (target_params, target_return) = runtime_parameters(method, env);

    let shape = if is_assignable_from(
        env,
        &delegate_return.parameter_type,
        &target_return.parameter_type,
    ) {
        classify(method, env, &delegate_params, &target_params, target, allow_closed)
    } else {
        Err(BindFailure::ReturnTypeMismatch)
    };

    let shape = match shape {
        Ok(shape) => shape,
        Err(failure) => {
            debug!(
                method = %method,
                delegate_type = %delegate_type.fullname(),
                reason = %failure,
                "delegate binding rejected"
            );
            return Ok(Err(failure));
        }
    };

    let invoker = invoker(method, env)?;
    Ok(Ok(Delegate {
        delegate_type: delegate_type.clone(),
        method: method.clone(),
        target: target.cloned(),
        shape,
        invoker,
        parameter_count: delegate_params.len(),
    }))
}

/// Pick the shape and check the leading and remaining parameters
fn classify(
    method: &MethodRc,
    env: &dyn ExecutionEnvironment,
    delegate_params: &ParamList,
    target_params: &ParamList,
    target: Option<&Value>,
    allow_closed: bool,
) -> std::result::Result<DelegateShape, BindFailure> {
    let target_type = target.and_then(|target| env.type_of(target));
    let mut delegate_iter = delegate_params.iter();
    let mut target_iter = target_params.iter();
    let same_count = delegate_params.len() == target_params.len();

    let shape = if method.is_static() {
        if same_count {
            if target.is_some() {
                return Err(BindFailure::TargetNotAllowed);
            }
            DelegateShape::OpenStatic
        } else {
            if !allow_closed {
                return Err(BindFailure::ClosedNotAllowed);
            }
            let leading = target_iter
                .next()
                .ok_or(BindFailure::MissingLeadingParameter)?;
            if let Some(target_type) = &target_type {
                if !is_assignable_from(env, &leading.parameter_type, target_type) {
                    return Err(BindFailure::TargetTypeMismatch);
                }
            }
            DelegateShape::ClosedStatic
        }
    } else if same_count {
        if !allow_closed {
            return Err(BindFailure::ClosedNotAllowed);
        }
        if let Some(target_type) = &target_type {
            let fits = method
                .declaring_type()
                .is_some_and(|declaring| is_assignable_from(env, &declaring, target_type));
            if !fits {
                return Err(BindFailure::TargetTypeMismatch);
            }
        }
        DelegateShape::ClosedInstance
    } else {
        let leading = delegate_iter
            .next()
            .ok_or(BindFailure::MissingLeadingParameter)?;
        let fits = method.declaring_type().is_some_and(|declaring| {
            is_assignable_from(env, &declaring, &leading.parameter_type)
        });
        if !fits {
            return Err(BindFailure::LeadingParameterMismatch);
        }
        if target.is_some() {
            return Err(BindFailure::TargetNotAllowed);
        }
        DelegateShape::OpenInstance
    };

    for delegate_param in delegate_iter {
        let target_param = target_iter
            .next()
            .ok_or(BindFailure::ParameterCountMismatch)?;
        if !is_assignable_from(
            env,
            &target_param.parameter_type,
            &delegate_param.parameter_type,
        ) {
            return Err(BindFailure::ParameterMismatch {
                position: delegate_param.position,
            });
        }
    }
    if target_iter.next().is_some() {
        return Err(BindFailure::ParameterCountMismatch);
    }

    Ok(shape)
}

fn bind_error(failure: BindFailure) -> Error {
    invalid_argument!(
        "Cannot bind to the target method because its signature is not compatible with that of the delegate type - {}",
        failure
    )
}

/// Bind `method` to `delegate_type` as an open delegate.
///
/// # Errors
/// Returns [`Error::InvalidArgument`] if `delegate_type` is not a delegate type or the
/// signatures are incompatible
pub fn create_delegate(
    method: &MethodRc,
    env: &dyn ExecutionEnvironment,
    delegate_type: &TypeRc,
) -> Result<Delegate> {
    try_bind(method, env, delegate_type, None, false)?.map_err(bind_error)
}

/// Bind `method` to `delegate_type`, closed over `target` where the shape allows it.
///
/// # Errors
/// Returns [`Error::InvalidArgument`] if `delegate_type` is not a delegate type or the
/// signatures are incompatible
pub fn create_delegate_with_target(
    method: &MethodRc,
    env: &dyn ExecutionEnvironment,
    delegate_type: &TypeRc,
    target: &Value,
) -> Result<Delegate> {
    try_bind(method, env, delegate_type, Some(target), true)?.map_err(bind_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{runtime::Object, test::FixtureEnvironment};

    #[test]
    fn test_shape_flags() {
        for shape in [
            DelegateShape::OpenStatic,
            DelegateShape::ClosedStatic,
            DelegateShape::ClosedInstance,
            DelegateShape::OpenInstance,
        ] {
            assert_eq!(DelegateShape::from_flags(shape.is_static(), shape.is_open()), shape);
        }
    }

    #[test]
    fn test_open_static() -> Result<()> {
        let f = FixtureEnvironment::new()?;

        let bound = try_bind(&f.negate, &f.env, &f.int_to_int, None, false)?;
        let delegate = bound.expect("open static binds");
        assert_eq!(delegate.shape(), DelegateShape::OpenStatic);
        assert_eq!(delegate.dynamic_invoke(&mut [Value::I4(5)])?, Value::I4(-5));

        let target = Value::string("x");
        assert_eq!(
            try_bind(&f.negate, &f.env, &f.int_to_int, Some(&target), true)?.err(),
            Some(BindFailure::TargetNotAllowed)
        );
        // Null is no target at all
        assert!(try_bind(&f.negate, &f.env, &f.int_to_int, Some(&Value::Null), true)?.is_ok());
        Ok(())
    }

    #[test]
    fn test_closed_static() -> Result<()> {
        let f = FixtureEnvironment::new()?;
        let prefix = Value::string("abc");

        let delegate = try_bind(&f.concat, &f.env, &f.int_to_int, Some(&prefix), true)?
            .expect("closed static binds");
        assert_eq!(delegate.shape(), DelegateShape::ClosedStatic);
        assert_eq!(delegate.dynamic_invoke(&mut [Value::I4(4)])?, Value::I4(7));

        assert_eq!(
            try_bind(&f.concat, &f.env, &f.int_to_int, Some(&Value::I4(1)), true)?.err(),
            Some(BindFailure::TargetTypeMismatch)
        );
        assert_eq!(
            try_bind(&f.concat, &f.env, &f.int_to_int, None, false)?.err(),
            Some(BindFailure::ClosedNotAllowed)
        );
        Ok(())
    }

    #[test]
    fn test_closed_and_open_instance() -> Result<()> {
        let f = FixtureEnvironment::new()?;
        let instance = Value::Object(Object::new(&f.m));
        instance
            .as_object()
            .expect("object")
            .set_field("bias", Value::I4(10));

        let closed = try_bind(&f.m_add_bias, &f.env, &f.int_to_int, Some(&instance), true)?
            .expect("closed instance binds");
        assert_eq!(closed.shape(), DelegateShape::ClosedInstance);
        assert_eq!(closed.dynamic_invoke(&mut [Value::I4(1)])?, Value::I4(11));

        assert_eq!(
            try_bind(&f.m_add_bias, &f.env, &f.int_to_int, Some(&instance), false)?.err(),
            Some(BindFailure::ClosedNotAllowed)
        );

        let open = try_bind(&f.m_add_bias, &f.env, &f.m_int_to_int, None, false)?
            .expect("open instance binds");
        assert_eq!(open.shape(), DelegateShape::OpenInstance);
        assert_eq!(
            open.dynamic_invoke(&mut [instance.clone(), Value::I4(2)])?,
            Value::I4(12)
        );
        assert!(matches!(
            open.dynamic_invoke(&mut [Value::Null, Value::I4(2)]),
            Err(Error::ArgumentNull(_))
        ));
        assert_eq!(
            try_bind(&f.m_add_bias, &f.env, &f.m_int_to_int, Some(&instance), true)?.err(),
            Some(BindFailure::TargetNotAllowed)
        );
        Ok(())
    }

    #[test]
    fn test_return_and_count_mismatch() -> Result<()> {
        let f = FixtureEnvironment::new()?;

        assert_eq!(
            try_bind(&f.nothing, &f.env, &f.int_to_int, None, true)?.err(),
            Some(BindFailure::ReturnTypeMismatch)
        );
        // Closed static consumes one parameter of `Add(int, int)`, the other stays unpaired
        assert_eq!(
            try_bind(&f.add, &f.env, &f.nullary_int, None, true)?.err(),
            Some(BindFailure::ParameterCountMismatch)
        );
        assert_eq!(
            try_bind(&f.add, &f.env, &f.m_int_to_int, None, false)?.err(),
            Some(BindFailure::ParameterMismatch { position: 0 })
        );
        Ok(())
    }

    #[test]
    fn test_enum_typed_delegate_over_underlying_method() -> Result<()> {
        let f = FixtureEnvironment::new()?;

        let delegate = try_bind(&f.negate, &f.env, &f.color_to_int, None, false)?
            .expect("Int32 method binds behind Color parameter");
        assert_eq!(delegate.shape(), DelegateShape::OpenStatic);
        let red = Value::Enum {
            ty: f.color.clone(),
            value: 3,
        };
        assert_eq!(delegate.dynamic_invoke(&mut [red])?, Value::I4(-3));

        // Enums sharing an underlying type bind interchangeably
        assert!(is_assignable_from(&f.env, &f.color, &f.shade));
        assert!(!is_assignable_from(&f.env, &f.shade, &f.wide));
        assert_eq!(
            try_bind(&f.concat, &f.env, &f.color_to_int, None, false)?.err(),
            Some(BindFailure::ClosedNotAllowed)
        );
        Ok(())
    }

    #[test]
    fn test_void_nullary_delegate() -> Result<()> {
        let f = FixtureEnvironment::new()?;

        let delegate = try_bind(&f.nothing, &f.env, &f.nullary_void, None, false)?
            .expect("void() binds");
        assert_eq!(delegate.shape(), DelegateShape::OpenStatic);
        assert_eq!(
            try_bind(&f.negate, &f.env, &f.nullary_void, None, true)?.err(),
            Some(BindFailure::ReturnTypeMismatch)
        );
        Ok(())
    }

    #[test]
    fn test_non_delegate_type_is_a_hard_error() -> Result<()> {
        let f = FixtureEnvironment::new()?;
        let result = try_bind(&f.negate, &f.env, &f.m, None, false);
        assert!(matches!(
            result,
            Err(Error::InvalidArgument {
                parameter: Some("delegate_type"),
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn test_throwing_entry_points() -> Result<()> {
        let f = FixtureEnvironment::new()?;

        assert!(create_delegate(&f.negate, &f.env, &f.int_to_int).is_ok());
        let err = create_delegate(&f.concat, &f.env, &f.int_to_int).unwrap_err();
        assert!(err.to_string().contains("closed delegates are not allowed"));

        let delegate =
            create_delegate_with_target(&f.concat, &f.env, &f.int_to_int, &Value::string("ab"))?;
        assert_eq!(delegate.target(), Some(&Value::string("ab")));
        Ok(())
    }
}
