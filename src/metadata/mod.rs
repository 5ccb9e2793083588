//! Metadata model the reflection layer works on.
//!
//! Metadata is not read from files here: types and methods are defined programmatically
//! through [`typesystem::TypeBuilder`] and [`method::MethodBuilder`], or by an execution
//! environment that loads them from elsewhere.
//!
//! # Key Components
//!
//! - [`token`] - Metadata table row references used throughout .NET
//! - [`typesystem`] - Runtime types, constructed types and the type registry
//! - [`method`] - Method descriptors and their parameters
//!
//! # Examples
//!
//! ```rust
//! use dotreflect::metadata::{
//!     token::Token,
//!     typesystem::{CilPrimitiveKind, TypeBuilder, TypeRegistry},
//! };
//!
//! let registry = TypeRegistry::new();
//! let color = TypeBuilder::enumeration("Demo", "Color", CilPrimitiveKind::I4)
//!     .token(Token::new(0x0200_0001))
//!     .build(&registry)?;
//!
//! assert!(color.is_enum());
//! let found = registry.get(&Token::new(0x0200_0001)).map(|t| t.fullname());
//! assert_eq!(found.as_deref(), Some("Demo.Color"));
//! # Ok::<(), dotreflect::Error>(())
//! ```

/// Method descriptors, parameters and attribute flags
pub mod method;
/// Metadata tokens
pub mod token;
/// The runtime type system
pub mod typesystem;
