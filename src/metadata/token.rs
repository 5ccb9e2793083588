//! Metadata tokens and the identity wrappers built on top of them.
//!
//! A [`Token`] is the 32-bit reference the runtime hands out for every metadata row: the
//! high byte selects the table and the low 24 bits the row. Reflection never interprets
//! tokens beyond that; they are opaque identities with value equality.
//!
//! [`PropertyToken`] is the typed wrapper surfaced through the emit-facing API for
//! properties. It compares and hashes purely by its token value.
//!
//! # Examples
//!
//! ```rust
//! use dotreflect::metadata::token::{PropertyToken, Token};
//!
//! let token = Token::new(0x0600_0001);
//! assert_eq!(token.table(), 0x06);
//! assert_eq!(token.row(), 1);
//!
//! assert_eq!(PropertyToken::new(0x1700_0002), PropertyToken::new(0x1700_0002));
//! assert_eq!(PropertyToken::EMPTY.token(), 0);
//! ```

use std::fmt;

/// Table index of `MethodDef` rows
pub const TABLE_METHODDEF: u8 = 0x06;
/// Table index of `Property` rows
pub const TABLE_PROPERTY: u8 = 0x17;
/// Table index used for artificial tokens handed out by the type registry
pub const TABLE_ARTIFICIAL: u8 = 0xF0;

/// A metadata token: table index in the high byte, row id in the low 24 bits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Token(pub u32);

impl Token {
    /// Create a new token from its raw value
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Token(value)
    }

    /// Create a token for the given table and row
    #[must_use]
    pub const fn from_parts(table: u8, row: u32) -> Self {
        Token(((table as u32) << 24) | (row & 0x00FF_FFFF))
    }

    /// Raw 32-bit value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Table index (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Row id (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// The nil token
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Tokens minted by the registry for primitives and constructed types
    #[must_use]
    pub fn is_artificial(&self) -> bool {
        self.table() == TABLE_ARTIFICIAL
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Identity wrapper for a property token.
///
/// Equality and hashing only consider the token value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub struct PropertyToken(i32);

impl PropertyToken {
    /// The empty property token
    pub const EMPTY: PropertyToken = PropertyToken(0);

    /// Wrap a raw property token
    #[must_use]
    pub const fn new(token: i32) -> Self {
        PropertyToken(token)
    }

    /// The wrapped token value
    #[must_use]
    pub fn token(&self) -> i32 {
        self.0
    }
}

impl From<Token> for PropertyToken {
    #[allow(clippy::cast_possible_wrap)]
    fn from(token: Token) -> Self {
        PropertyToken(token.value() as i32)
    }
}
