use std::sync::Arc;

use crate::{
    metadata::{
        method::{
            CallingConventions, MethodAccessFlags, MethodAttributes, MethodImplCodeType,
            MethodKind, MethodModifiers, MethodRc, MethodVtableFlags, RuntimeMethod,
            CONSTRUCTOR_NAME, TYPE_CONSTRUCTOR_NAME,
        },
        token::Token,
        typesystem::{CilFlavor, TypeRc},
    },
    reflection::NativeMethod,
    runtime::{
        ExecutionEnvironment, MethodSignature, RuntimeEnvironment, SignatureParameter, Value,
    },
    Result,
};

/// Provides a fluent API for defining methods on a [`RuntimeEnvironment`].
///
/// Building registers the signature (and the native body, if any) with the environment,
/// attaches the method to its declaring type and returns the shared descriptor.
pub struct MethodBuilder {
    name: String,
    kind: MethodKind,
    access: MethodAccessFlags,
    vtable: MethodVtableFlags,
    modifiers: MethodModifiers,
    impl_code_type: MethodImplCodeType,
    return_type: Option<TypeRc>,
    parameters: Vec<SignatureParameter>,
    generic_params: Vec<TypeRc>,
    body: Option<NativeMethod>,
    token_init: Option<Token>,
}

impl MethodBuilder {
    /// Start defining a public instance method named `name` returning `System.Void`
    #[must_use]
    pub fn new(name: &str) -> Self {
        MethodBuilder {
            name: name.to_string(),
            kind: MethodKind::Named,
            access: MethodAccessFlags::PUBLIC,
            vtable: MethodVtableFlags::REUSE_SLOT,
            modifiers: MethodModifiers::HIDE_BY_SIG,
            impl_code_type: MethodImplCodeType::IL,
            return_type: None,
            parameters: Vec::new(),
            generic_params: Vec::new(),
            body: None,
            token_init: None,
        }
    }

    /// Start defining a public instance constructor
    #[must_use]
    pub fn constructor() -> Self {
        let mut builder = Self::new(CONSTRUCTOR_NAME);
        builder.kind = MethodKind::Constructor;
        builder.modifiers |= MethodModifiers::SPECIAL_NAME | MethodModifiers::RTSPECIAL_NAME;
        builder
    }

    /// Start defining a type initializer
    #[must_use]
    pub fn type_initializer() -> Self {
        let mut builder = Self::constructor();
        builder.name = TYPE_CONSTRUCTOR_NAME.to_string();
        builder.access = MethodAccessFlags::PRIVATE;
        builder.modifiers |= MethodModifiers::STATIC;
        builder
    }

    /// Mark the method static
    #[must_use]
    pub fn static_(mut self) -> Self {
        self.modifiers |= MethodModifiers::STATIC;
        self
    }

    /// Mark the method virtual, reusing the slot of any method it overrides
    #[must_use]
    pub fn virtual_(mut self) -> Self {
        self.modifiers |= MethodModifiers::VIRTUAL;
        self
    }

    /// Mark the method virtual in a fresh vtable slot
    #[must_use]
    pub fn new_slot(mut self) -> Self {
        self.modifiers |= MethodModifiers::VIRTUAL;
        self.vtable = MethodVtableFlags::NEW_SLOT;
        self
    }

    /// Mark the method abstract (and virtual)
    #[must_use]
    pub fn abstract_(mut self) -> Self {
        self.modifiers |= MethodModifiers::ABSTRACT | MethodModifiers::VIRTUAL;
        self
    }

    /// Set the access flags
    #[must_use]
    pub fn access(mut self, access: MethodAccessFlags) -> Self {
        self.access = access;
        self
    }

    /// Set the implementation code type
    #[must_use]
    pub fn impl_code_type(mut self, code_type: MethodImplCodeType) -> Self {
        self.impl_code_type = code_type;
        self
    }

    /// Set the return type
    #[must_use]
    pub fn returns(mut self, return_type: &TypeRc) -> Self {
        self.return_type = Some(return_type.clone());
        self
    }

    /// Append a parameter
    #[must_use]
    pub fn param(self, name: &str, parameter_type: &TypeRc) -> Self {
        self.param_with_attributes(name, parameter_type, 0)
    }

    /// Append a parameter with explicit `ParamAttributes`
    #[must_use]
    pub fn param_with_attributes(
        mut self,
        name: &str,
        parameter_type: &TypeRc,
        attributes: u32,
    ) -> Self {
        self.parameters.push(SignatureParameter {
            name: Some(name.to_string()),
            parameter_type: parameter_type.clone(),
            attributes,
        });
        self
    }

    /// Make this a generic method definition over the given method generic parameters
    #[must_use]
    pub fn generic_params(mut self, parameters: &[TypeRc]) -> Self {
        self.generic_params = parameters.to_vec();
        self
    }

    /// Attach a native body run when the method is invoked
    #[must_use]
    pub fn body<F>(mut self, body: F) -> Self
    where
        F: Fn(Option<&Value>, &mut [Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.body = Some(Arc::new(body));
        self
    }

    /// Use a specific token instead of the next free `MethodDef` token
    #[must_use]
    pub fn token(mut self, token: Token) -> Self {
        self.token_init = Some(token);
        self
    }

    /// Create the method, register it with `env` and attach it to `declaring_type`
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidArgument`] if a constructor declares a return type
    /// other than `System.Void`, or a generic parameter list contains non-method generic
    /// parameters.
    pub fn build(
        self,
        env: &RuntimeEnvironment,
        declaring_type: Option<&TypeRc>,
    ) -> Result<MethodRc> {
        let void = env.types().void();
        let return_type = self.return_type.unwrap_or_else(|| void.clone());

        if matches!(self.kind, MethodKind::Constructor) && return_type.token != void.token {
            return Err(invalid_argument!(
                param = "return_type",
                "Constructor {} must return System.Void",
                self.name
            ));
        }
        if let Some(invalid) = self.generic_params.iter().find(|param| {
            !matches!(param.flavor, CilFlavor::GenericParameter { method: true, .. })
        }) {
            return Err(invalid_argument!(
                param = "generic_params",
                "{} is not a method generic parameter",
                invalid.fullname()
            ));
        }

        let calling_convention = if self.modifiers.contains(MethodModifiers::STATIC) {
            CallingConventions::STANDARD
        } else {
            CallingConventions::STANDARD | CallingConventions::HAS_THIS
        };

        let method = Arc::new(RuntimeMethod::new(
            self.token_init.unwrap_or_else(|| env.next_method_token()),
            self.name,
            self.kind,
            env.next_method_handle(),
            MethodAttributes::from_parts(self.access, self.vtable, self.modifiers),
            self.impl_code_type,
            calling_convention,
            declaring_type,
            self.generic_params,
        ));
        method.populate_debug_name(env.config());

        env.register_signature(
            method.handle,
            MethodSignature {
                return_type,
                parameters: self.parameters,
            },
        );
        if let Some(body) = self.body {
            env.register_body(method.handle, body);
        }
        if let Some(declaring) = declaring_type {
            declaring.methods.push(method.clone());
        }

        Ok(method)
    }
}
