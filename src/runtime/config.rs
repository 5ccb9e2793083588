//! Reflection configuration
//!
//! This module provides the switches that change how the reflection layer reports on itself
//! and how strictly it checks the arguments handed to invocations.

/// Configuration for the reflection layer of a [`crate::runtime::RuntimeEnvironment`]
///
/// None of the switches change which operations succeed for well-formed input; they only add
/// diagnostics or argument checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectionConfig {
    /// Emit a `trace` event on every reflection entry point (parameter queries, invocation,
    /// delegate creation, base definition lookups)
    pub trace_calls: bool,

    /// Developer-experience mode: methods record a debug name when they are created
    pub populate_debug_names: bool,

    /// Check the runtime type of every invocation argument against its parameter type before
    /// dispatching to the method body
    pub validate_invoke_arguments: bool,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            trace_calls: false,
            populate_debug_names: cfg!(debug_assertions),
            validate_invoke_arguments: true,
        }
    }
}

impl ReflectionConfig {
    /// Creates a configuration suitable for production use
    ///
    /// All diagnostics are off, argument validation stays on.
    #[must_use]
    pub fn production() -> Self {
        Self {
            trace_calls: false,
            populate_debug_names: false,
            validate_invoke_arguments: true,
        }
    }

    /// Creates a configuration with every diagnostic enabled
    #[must_use]
    pub fn diagnostic() -> Self {
        Self {
            trace_calls: true,
            populate_debug_names: true,
            validate_invoke_arguments: true,
        }
    }
}
