use std::{fmt, sync::Arc};

use crate::metadata::typesystem::TypeRc;

/// A reference to a `RuntimeParameter`
pub type ParamRc = Arc<RuntimeParameter>;
/// The ordered, immutable parameter list of a method
pub type ParamList = Arc<[ParamRc]>;

#[allow(non_snake_case)]
/// All possible flags for `ParamAttributes`
pub mod ParamAttributes {
    /// Param is `In`
    pub const IN: u32 = 0x0001;
    /// Param is `out`
    pub const OUT: u32 = 0x0002;
    /// Param is optional
    pub const OPTIONAL: u32 = 0x0010;
    /// Param has default value
    pub const HAS_DEFAULT: u32 = 0x1000;
    /// Param has `FieldMarshal`
    pub const HAS_FIELD_MARSHAL: u32 = 0x2000;
}

/// One formal parameter, or the return slot, of a method as surfaced through reflection.
///
/// Parameters are computed once per method from the execution environment's signature data
/// and never change afterwards.
#[derive(Debug, Clone)]
pub struct RuntimeParameter {
    /// Zero-based position, `-1` for the return parameter
    pub position: i32,
    /// The parameter name, if the metadata carries one
    pub name: Option<String>,
    /// Declared type; by-ref parameters carry the by-ref type itself
    pub parameter_type: TypeRc,
    /// bitmask of `ParamAttributes`, §II.23.1.13
    pub attributes: u32,
}

impl RuntimeParameter {
    /// Is this the return slot
    #[must_use]
    pub fn is_return(&self) -> bool {
        self.position < 0
    }

    /// Is the parameter passed by reference
    #[must_use]
    pub fn is_by_ref(&self) -> bool {
        self.parameter_type.is_by_ref()
    }

    /// Is this an `out` parameter
    #[must_use]
    pub fn is_out(&self) -> bool {
        self.attributes & ParamAttributes::OUT != 0
    }

    /// Is this an optional parameter
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.attributes & ParamAttributes::OPTIONAL != 0
    }
}

/// Structural equality: same slot, same name, same type, same flags
impl PartialEq for RuntimeParameter {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
            && self.name == other.name
            && self.parameter_type.token == other.parameter_type.token
            && self.attributes == other.attributes
    }
}

impl Eq for RuntimeParameter {}

impl fmt::Display for RuntimeParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} {name}", self.parameter_type.display_name()),
            None => f.write_str(&self.parameter_type.display_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::typesystem::{CilPrimitiveKind, TypeRegistry};

    #[test]
    fn test_parameter_queries() {
        let registry = TypeRegistry::new();
        let int32 = registry.primitive(CilPrimitiveKind::I4);

        let plain = RuntimeParameter {
            position: 0,
            name: Some("value".to_string()),
            parameter_type: int32.clone(),
            attributes: ParamAttributes::IN,
        };
        assert!(!plain.is_return());
        assert!(!plain.is_by_ref());
        assert!(!plain.is_out());
        assert_eq!(plain.to_string(), "Int32 value");

        let out = RuntimeParameter {
            position: 1,
            name: None,
            parameter_type: registry.make_by_ref(&int32),
            attributes: ParamAttributes::OUT,
        };
        assert!(out.is_by_ref());
        assert!(out.is_out());
        assert_eq!(out.to_string(), "Int32&");

        let ret = RuntimeParameter {
            position: -1,
            name: None,
            parameter_type: registry.void(),
            attributes: 0,
        };
        assert!(ret.is_return());
        assert_ne!(ret, plain);
        assert_eq!(plain.clone(), plain);
    }
}
