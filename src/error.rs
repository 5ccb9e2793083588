use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! invalid_argument {
    // Named parameter version
    (param = $param:expr, $fmt:expr $(, $arg:expr)* $(,)?) => {
        crate::Error::InvalidArgument {
            message: format!($fmt $(, $arg)*),
            parameter: Some($param),
        }
    };

    // Single string version
    ($msg:expr) => {
        crate::Error::InvalidArgument {
            message: $msg.to_string(),
            parameter: None,
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::InvalidArgument {
            message: format!($fmt, $($arg)*),
            parameter: None,
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Reflection failures are deterministic given the metadata they operate on, so none of these
/// are meant to be retried. The soft "delegate not bindable" outcome is deliberately *not* part
/// of this enum; it is reported through [`crate::reflection::BindFailure`] so callers can decide
/// whether it is an error at all.
///
/// # Error Categories
///
/// ## Caller misuse
/// - [`Error::InvalidArgument`] - An argument has the wrong shape (e.g. non-delegate type)
/// - [`Error::ArgumentNull`] - A required argument was absent
/// - [`Error::TargetParameterCount`] - Wrong number of arguments for an invocation
/// - [`Error::InvalidOperation`] - The operation is invalid for the object's current state
///
/// ## Unsupported functionality
/// - [`Error::NotSupported`] - Intentionally unimplemented or unsupported (by-ref returns, ...)
/// - [`Error::PlatformNotSupported`] - Meaningless for this kind of method
///
/// ## Type System Errors
/// - [`Error::TypeNotFound`] - Requested type not found in type system
///
/// # Examples
///
/// ```rust,no_run
/// use dotreflect::{Error, prelude::*};
///
/// # fn demo(env: &RuntimeEnvironment, method: &MethodRc) {
/// match method.invoke(env, None, None) {
///     Ok(value) => println!("Returned {value:?}"),
///     Err(Error::NotSupported(reason)) => eprintln!("Cannot invoke: {reason}"),
///     Err(Error::TargetParameterCount { expected, actual }) => {
///         eprintln!("Expected {expected} arguments, got {actual}");
///     }
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// # }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// An argument passed to a reflection operation is not acceptable.
    ///
    /// Raised for non-delegate types passed where a delegate type is required, for
    /// signatures that cannot be bound when the caller asked for a throwing bind,
    /// for mismatched generic arity and for argument values of the wrong type.
    ///
    /// # Fields
    ///
    /// * `message` - Description of what was wrong with the argument
    /// * `parameter` - Name of the offending parameter, if known
    #[error("Invalid argument{}: {message}", .parameter.map(|p| format!(" '{p}'")).unwrap_or_default())]
    InvalidArgument {
        /// The message describing the failure
        message: String,
        /// The name of the parameter that was rejected
        parameter: Option<&'static str>,
    },

    /// A required argument was not supplied.
    ///
    /// The associated value is the name of the missing parameter.
    #[error("Value cannot be null - parameter '{0}'")]
    ArgumentNull(&'static str),

    /// The requested operation is not supported.
    ///
    /// Used for by-reference return types on the general invoke path and for the pieces of
    /// the runtime that are intentionally left unimplemented (thread-static field access,
    /// COM activation).
    #[error("Operation is not supported - {0}")]
    NotSupported(String),

    /// The operation has no meaning for this kind of member.
    ///
    /// For example re-invoking a constructor through the generic method invoke path, or
    /// asking a synthetic constructor for its method handle.
    #[error("Operation is not supported on this platform - {0}")]
    PlatformNotSupported(&'static str),

    /// The operation is not valid in the current state of the object.
    #[error("Operation is not valid - {0}")]
    InvalidOperation(String),

    /// The number of arguments supplied to an invocation does not match the parameter count.
    #[error("Parameter count mismatch - expected {expected}, got {actual}")]
    TargetParameterCount {
        /// The number of parameters the method declares
        expected: usize,
        /// The number of arguments that were supplied
        actual: usize,
    },

    /// Failed to find type in `TypeRegistry`.
    ///
    /// The associated [`Token`] identifies which type was not found.
    #[error("Failed to find type in TypeRegistry - {0}")]
    TypeNotFound(Token),

    /// Generic error for miscellaneous failures.
    ///
    /// Raised mostly by native method bodies registered with the runtime environment.
    #[error("{0}")]
    Error(String),
}
