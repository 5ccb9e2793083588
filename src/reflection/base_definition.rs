//! Resolution of the most-derived-to-root chain of virtual overrides.
//!
//! A virtual method that does not request a new vtable slot implicitly overrides the nearest
//! base class method with the same name, generic arity and signature. Following that relation
//! until it stops yields the method that introduced the slot, the base definition.

use tracing::trace;

use crate::{
    metadata::{
        method::{MethodKind, MethodRc, RuntimeMethod},
        typesystem::{CilFlavor, RuntimeType, TypeRc},
    },
    runtime::ExecutionEnvironment,
};

/// The method that first declared the virtual slot `method` occupies.
///
/// Non-virtual and static methods, methods without a declaring type and interface methods are
/// their own base definition and are returned unchanged (the same descriptor). Otherwise an
/// instantiated generic method is first replaced by its generic definition, the implicit
/// override chain is followed to its root, and the root is returned as its declaring type
/// lists it. Repeated calls yield the same descriptor.
pub fn base_definition(method: &MethodRc, env: &dyn ExecutionEnvironment) -> MethodRc {
    let declaring = method.declaring_type();
    if !method.is_virtual()
        || method.is_static()
        || declaring.as_ref().map_or(true, |declaring| declaring.is_interface())
    {
        return method.clone();
    }

    let mut current = match &method.kind {
        MethodKind::ConstructedGeneric { definition, .. } => definition.clone(),
        _ => method.clone(),
    };

    while let Some(next) = implicitly_overridden_base_class_member(&current, env) {
        trace!(method = %current, overrides = %next, "following implicit override");
        current = next;
    }

    match current.declaring_type() {
        Some(declaring) => env.types().method_through(&current, &declaring),
        None => current,
    }
}

/// The base class method `method` implicitly overrides, if any.
///
/// Only virtual instance methods that reuse their slot override anything. The search starts at
/// the direct base of the declaring type and returns the first virtual instance method with
/// the same name, the same number of generic parameters and a matching signature.
pub(crate) fn implicitly_overridden_base_class_member(
    method: &RuntimeMethod,
    env: &dyn ExecutionEnvironment,
) -> Option<MethodRc> {
    if !method.is_virtual() || method.is_new_slot() || method.is_static() {
        return None;
    }

    let mut current = method.declaring_type()?.base();
    while let Some(base) = current {
        let found = base.methods.iter().find_map(|(_, candidate)| {
            (candidate.is_virtual()
                && !candidate.is_static()
                && candidate.name == method.name
                && candidate.generic_params.len() == method.generic_params.len()
                && same_signature(method, candidate, env))
            .then(|| candidate.clone())
        });
        if found.is_some() {
            return found;
        }
        current = base.base();
    }
    None
}

fn same_signature(
    method: &RuntimeMethod,
    candidate: &RuntimeMethod,
    env: &dyn ExecutionEnvironment,
) -> bool {
    let ours = env.method_signature(method);
    let theirs = env.method_signature(candidate);

    ours.parameters.len() == theirs.parameters.len()
        && same_signature_type(&ours.return_type, &theirs.return_type)
        && ours
            .parameters
            .iter()
            .zip(&theirs.parameters)
            .all(|(a, b)| same_signature_type(&a.parameter_type, &b.parameter_type))
}

/// Signature type identity, treating method generic parameters as equal by position
fn same_signature_type(a: &TypeRc, b: &TypeRc) -> bool {
    if a.token == b.token {
        return true;
    }

    match (&a.flavor, &b.flavor) {
        (
            CilFlavor::GenericParameter {
                index,
                method: true,
            },
            CilFlavor::GenericParameter {
                index: other_index,
                method: true,
            },
        ) => index == other_index,
        (CilFlavor::ByRef, CilFlavor::ByRef) | (CilFlavor::Pointer, CilFlavor::Pointer) => {
            same_element(a, b)
        }
        (CilFlavor::Array { rank }, CilFlavor::Array { rank: other_rank }) => {
            rank == other_rank && same_element(a, b)
        }
        _ => false,
    }
}

fn same_element(a: &RuntimeType, b: &RuntimeType) -> bool {
    match (a.element_type(), b.element_type()) {
        (Some(a), Some(b)) => same_signature_type(&a, &b),
        _ => false,
    }
}
