//! Type compatibility as reflection delegate binding sees it.
//!
//! Binding is looser than the static type system: on top of what the execution environment
//! accepts, an enum and its underlying integral type are interchangeable, and so are two
//! enums sharing an underlying type. By-reference types on both sides are the exception and
//! only ever match themselves.

use crate::{metadata::typesystem::RuntimeType, runtime::ExecutionEnvironment};

/// May a value of type `src` be used where `dst` is expected?
///
/// Decision order, first match wins:
/// 1. both by-ref: compatible only if identical
/// 2. identical types
/// 3. the execution environment's general assignability
/// 4. enum erasure: both sides replaced by their underlying type when they are enums, then
///    compared for identity
///
/// The enum rule is symmetric; it does not check which side would need widening.
pub fn is_assignable_from(
    env: &dyn ExecutionEnvironment,
    dst: &RuntimeType,
    src: &RuntimeType,
) -> bool {
    if dst.is_by_ref() && src.is_by_ref() {
        return dst.token == src.token;
    }

    if dst.token == src.token {
        return true;
    }

    if env.is_assignable_from(dst, src) {
        return true;
    }

    let dst_underlying = dst.enum_underlying_type().map_or(dst.token, |t| t.token);
    let src_underlying = src.enum_underlying_type().map_or(src.token, |t| t.token);
    dst_underlying == src_underlying
}
