//! Shared test fixtures.
//!
//! [`FixtureEnvironment`] builds one environment with the types, methods and delegate types
//! most reflection tests need; the helpers below cover the odd value or type a single test
//! wants on top.

mod factories;

pub use factories::*;

use crate::{
    metadata::typesystem::TypeRc,
    runtime::{Object, Value},
};

// Helper function to create an instance of `ty` with an `Int32` field already set
pub fn create_instance_with(ty: &TypeRc, field: &str, value: i32) -> Value {
    let object = Object::new(ty);
    object.set_field(field, Value::I4(value));
    Value::Object(object)
}

// Helper function to box an enum value
pub fn create_enum_value(ty: &TypeRc, value: i64) -> Value {
    Value::Enum {
        ty: ty.clone(),
        value,
    }
}
