use std::sync::{
    atomic::{AtomicU32, AtomicUsize, Ordering},
    Arc,
};

use dashmap::DashMap;
use tracing::warn;

use crate::{
    metadata::{
        method::{
            MethodBuilder, MethodHandle, MethodImplCodeType, MethodKind, ParamList, RuntimeMethod,
        },
        token::{Token, TABLE_METHODDEF},
        typesystem::{CilFlavor, CilPrimitiveKind, RuntimeType, TypeBuilder, TypeRc, TypeRegistry},
    },
    reflection::{DirectInvoker, InvokerRc, NativeMethod, ThunkedInvoker},
    runtime::{
        ExecutionEnvironment, MethodSignature, ReflectionConfig, SignatureParameter, Value,
    },
    Result,
};

/// In-memory, thread-safe [`ExecutionEnvironment`].
///
/// Signatures and native bodies are stored per [`MethodHandle`]. Instantiated generic methods
/// share the handle of their definition; their signatures are produced by substituting the
/// generic arguments into the definition's signature, and they run the definition's body.
///
/// # Examples
///
/// ```rust
/// use dotreflect::prelude::*;
///
/// let env = RuntimeEnvironment::new();
/// let int32 = env.types().primitive(CilPrimitiveKind::I4);
/// let unary = env.define_delegate("Demo", "Unary", &int32, &[int32.clone()])?;
///
/// assert!(unary.is_delegate());
/// assert!(unary.delegate_invoke_method().is_some());
/// # Ok::<(), dotreflect::Error>(())
/// ```
pub struct RuntimeEnvironment {
    /// Every type known to this environment
    types: Arc<TypeRegistry>,
    /// Reflection switches
    config: ReflectionConfig,
    /// Raw signatures, keyed by method handle
    signatures: DashMap<MethodHandle, MethodSignature>,
    /// Native bodies, keyed by method handle
    bodies: DashMap<MethodHandle, NativeMethod>,
    /// Next free method handle, 0 stays reserved for handle-less methods
    next_handle: AtomicUsize,
    /// Next free `MethodDef` row
    next_method_row: AtomicU32,
}

impl RuntimeEnvironment {
    /// Create an environment with a fresh registry and the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ReflectionConfig::default())
    }

    /// Create an environment with a fresh registry and the given configuration
    #[must_use]
    pub fn with_config(config: ReflectionConfig) -> Self {
        Self::with_registry(Arc::new(TypeRegistry::new()), config)
    }

    /// Create an environment on top of an existing registry
    #[must_use]
    pub fn with_registry(types: Arc<TypeRegistry>, config: ReflectionConfig) -> Self {
        RuntimeEnvironment {
            types,
            config,
            signatures: DashMap::new(),
            bodies: DashMap::new(),
            next_handle: AtomicUsize::new(1),
            next_method_row: AtomicU32::new(1),
        }
    }

    /// Shared handle to the type registry
    #[must_use]
    pub fn registry(&self) -> Arc<TypeRegistry> {
        self.types.clone()
    }

    pub(crate) fn next_method_token(&self) -> Token {
        Token::from_parts(
            TABLE_METHODDEF,
            self.next_method_row.fetch_add(1, Ordering::Relaxed),
        )
    }

    pub(crate) fn next_method_handle(&self) -> MethodHandle {
        MethodHandle(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    /// Store the raw signature of the method behind `handle`, replacing any previous one
    pub fn register_signature(&self, handle: MethodHandle, signature: MethodSignature) {
        self.signatures.insert(handle, signature);
    }

    /// Store the native body of the method behind `handle`.
    ///
    /// Invokers capture the body when they are created, so bodies have to be registered
    /// before the method is invoked for the first time.
    pub fn register_body(&self, handle: MethodHandle, body: NativeMethod) {
        self.bodies.insert(handle, body);
    }

    /// Define a delegate type `namespace.name` whose `Invoke` method takes `parameters` and
    /// returns `return_type`
    ///
    /// # Errors
    /// Returns an error if the type or one of its methods cannot be defined
    pub fn define_delegate(
        &self,
        namespace: &str,
        name: &str,
        return_type: &TypeRc,
        parameters: &[TypeRc],
    ) -> Result<TypeRc> {
        let delegate = TypeBuilder::delegate(namespace, name).build(&self.types)?;

        MethodBuilder::constructor()
            .param("object", &self.types.object())
            .param("method", &self.types.primitive(CilPrimitiveKind::I))
            .impl_code_type(MethodImplCodeType::RUNTIME)
            .build(self, Some(&delegate))?;

        let mut invoke = MethodBuilder::new("Invoke")
            .virtual_()
            .returns(return_type)
            .impl_code_type(MethodImplCodeType::RUNTIME);
        for (index, parameter) in parameters.iter().enumerate() {
            invoke = invoke.param(&format!("arg{index}"), parameter);
        }
        invoke.build(self, Some(&delegate))?;

        Ok(delegate)
    }

    fn raw_signature(&self, method: &RuntimeMethod, handle: MethodHandle) -> MethodSignature {
        match self.signatures.get(&handle) {
            Some(signature) => signature.value().clone(),
            None => {
                warn!(
                    method = %method,
                    handle = %handle,
                    "no signature registered, assuming void()"
                );
                MethodSignature {
                    return_type: self.types.void(),
                    parameters: Vec::new(),
                }
            }
        }
    }

    /// Replace method generic parameters in `ty` by `arguments`, rebuilding by-ref, pointer
    /// and array types around them
    fn substitute(&self, ty: &TypeRc, arguments: &[TypeRc]) -> TypeRc {
        match (&ty.flavor, ty.element_type()) {
            (CilFlavor::GenericParameter { index, method: true }, _) => arguments
                .get(*index as usize)
                .cloned()
                .unwrap_or_else(|| ty.clone()),
            (CilFlavor::ByRef, Some(element)) => {
                self.types.make_by_ref(&self.substitute(&element, arguments))
            }
            (CilFlavor::Pointer, Some(element)) => {
                self.types.make_pointer(&self.substitute(&element, arguments))
            }
            (CilFlavor::Array { rank }, Some(element)) => self
                .types
                .make_array_of_rank(&self.substitute(&element, arguments), *rank),
            _ => ty.clone(),
        }
    }
}

impl Default for RuntimeEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionEnvironment for RuntimeEnvironment {
    fn config(&self) -> &ReflectionConfig {
        &self.config
    }

    fn types(&self) -> &TypeRegistry {
        &self.types
    }

    fn method_signature(&self, method: &RuntimeMethod) -> MethodSignature {
        match &method.kind {
            MethodKind::ConstructedGeneric {
                definition,
                arguments,
            } => {
                let open = self.raw_signature(definition, definition.handle);
                MethodSignature {
                    return_type: self.substitute(&open.return_type, arguments),
                    parameters: open
                        .parameters
                        .iter()
                        .map(|parameter| SignatureParameter {
                            name: parameter.name.clone(),
                            parameter_type: self.substitute(&parameter.parameter_type, arguments),
                            attributes: parameter.attributes,
                        })
                        .collect(),
                }
            }
            _ => self.raw_signature(method, method.handle),
        }
    }

    fn is_assignable_from(&self, dst: &RuntimeType, src: &RuntimeType) -> bool {
        if dst.token == src.token {
            return true;
        }

        // By-refs and pointers only match themselves
        if dst.is_by_ref() || src.is_by_ref() || dst.is_pointer() || src.is_pointer() {
            return false;
        }

        if dst.is_interface() {
            return src.implements(dst);
        }

        if let (CilFlavor::Array { rank }, CilFlavor::Array { rank: src_rank }) =
            (&dst.flavor, &src.flavor)
        {
            if rank != src_rank {
                return false;
            }
            return match (dst.element_type(), src.element_type()) {
                (Some(dst_element), Some(src_element)) => {
                    dst_element.token == src_element.token
                        || (!src_element.is_value_type()
                            && self.is_assignable_from(&dst_element, &src_element))
                }
                _ => false,
            };
        }

        src.is_subclass_of(dst)
    }

    fn type_of(&self, value: &Value) -> Option<TypeRc> {
        let kind = match value {
            Value::Null => return None,
            Value::Enum { ty, .. } => return Some(ty.clone()),
            Value::Object(object) => return Some(object.ty.clone()),
            Value::Delegate(delegate) => return Some(delegate.delegate_type()),
            Value::Boolean(_) => CilPrimitiveKind::Boolean,
            Value::Char(_) => CilPrimitiveKind::Char,
            Value::I1(_) => CilPrimitiveKind::I1,
            Value::U1(_) => CilPrimitiveKind::U1,
            Value::I2(_) => CilPrimitiveKind::I2,
            Value::U2(_) => CilPrimitiveKind::U2,
            Value::U4(_) => CilPrimitiveKind::U4,
            Value::U8(_) => CilPrimitiveKind::U8,
            Value::R4(_) => CilPrimitiveKind::R4,
            Value::I(_) => CilPrimitiveKind::I,
            Value::U(_) => CilPrimitiveKind::U,
            Value::I4(_) => CilPrimitiveKind::I4,
            Value::I8(_) => CilPrimitiveKind::I8,
            Value::R8(_) => CilPrimitiveKind::R8,
            Value::String(_) => CilPrimitiveKind::String,
        };
        Some(self.types.primitive(kind))
    }

    fn create_invoker(&self, method: &RuntimeMethod, parameters: &ParamList) -> Result<InvokerRc> {
        let body = self.bodies.get(&method.handle).map(|body| body.value().clone());

        let by_ref_slots: Vec<usize> = parameters
            .iter()
            .enumerate()
            .filter(|(_, parameter)| parameter.is_by_ref())
            .map(|(index, _)| index)
            .collect();

        if by_ref_slots.is_empty() {
            Ok(Arc::new(DirectInvoker::new(&method.name, body)))
        } else {
            Ok(Arc::new(ThunkedInvoker::new(&method.name, body, by_ref_slots)))
        }
    }
}
