// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::too_many_arguments)]

//! # dotreflect
//!
//! Runtime reflection for a managed .NET execution environment. Given runtime method
//! descriptors, `dotreflect` lazily materialises their parameters, selects and caches the
//! strategy they are invoked through, resolves virtual methods to their base definition and
//! binds methods to delegate types following the historical open/closed and static/instance
//! binding rules.
//!
//! ## Features
//!
//! - **Lazy, lock-free caches** - Parameters and invokers are computed on first use and shared
//!   afterwards; concurrent first use recomputes harmlessly instead of blocking
//! - **Delegate binding** - Open static, closed static, closed instance and open instance
//!   shapes, with enum/underlying type coercion
//! - **Soft bind failures** - Incompatible signatures are reported as [`reflection::BindFailure`]
//!   so callers choose whether they are an error
//! - **Pluggable execution environment** - Reflection consumes the narrow
//!   [`runtime::ExecutionEnvironment`] trait; [`runtime::RuntimeEnvironment`] is an in-memory
//!   implementation with native Rust method bodies
//!
//! ## Quick Start
//!
//! ```rust
//! use dotreflect::prelude::*;
//!
//! let env = RuntimeEnvironment::new();
//! let int32 = env.types().primitive(CilPrimitiveKind::I4);
//! let string = env.types().string();
//! let text = TypeBuilder::class("Demo", "Text").build(env.types())?;
//!
//! // static int Measure(string prefix, int extra)
//! let measure = MethodBuilder::new("Measure")
//!     .static_()
//!     .returns(&int32)
//!     .param("prefix", &string)
//!     .param("extra", &int32)
//!     .body(|_, args| {
//!         let len = args[0].as_str().map_or(0, str::len) as i32;
//!         Ok(Value::I4(len + args[1].as_i32().unwrap_or_default()))
//!     })
//!     .build(&env, Some(&text))?;
//!
//! assert_eq!(measure.parameters(&env).len(), 2);
//!
//! // int(int), closed over the first parameter
//! let unary = env.define_delegate("Demo", "Unary", &int32, &[int32.clone()])?;
//! let bound = measure.create_delegate_with_target(&env, &unary, &Value::string("abc"))?;
//! assert_eq!(bound.shape(), DelegateShape::ClosedStatic);
//! assert_eq!(bound.dynamic_invoke(&mut [Value::I4(1)])?, Value::I4(4));
//!
//! // Without a target the same request is not bindable, which is not an error
//! let attempt = measure.try_create_delegate(&env, &unary, None, false)?;
//! assert_eq!(attempt.err(), Some(BindFailure::ClosedNotAllowed));
//! # Ok::<(), dotreflect::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata`] - Tokens, the runtime type system and method descriptors
//! - [`runtime`] - The execution environment reflection runs on, values and configuration
//! - [`reflection`] - Parameter and invoker caches, base definitions, assignability, delegate
//!   binding and field access

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use dotreflect::prelude::*;
///
/// let env = RuntimeEnvironment::new();
/// let object = env.types().object();
/// assert_eq!(object.fullname(), "System.Object");
/// ```
pub mod prelude;

/// Metadata model: tokens, runtime types and method descriptors
///
/// # Key Components
///
/// - [`metadata::token`] - Metadata tokens for cross-references
/// - [`metadata::typesystem`] - Runtime types, the type registry and type builders
/// - [`metadata::method`] - Method descriptors, parameters and method builders
pub mod metadata;

/// The execution environment reflection operates on
pub mod runtime;

/// Reflection over method descriptors
pub mod reflection;

/// `dotreflect` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `dotreflect` Error type
///
/// The main error type for all operations in this crate. Incompatible delegate signatures are
/// not errors; see [`reflection::BindFailure`].
pub use error::Error;
