//! Field accessors and field handle records.
//!
//! Only instance fields of heap objects are readable and writable through reflection.
//! Thread-static storage is not modelled by the execution environment; its accessor keeps the
//! layout information it was created with and refuses both operations.

use crate::{
    metadata::typesystem::{CilPrimitiveKind, TypeRc},
    reflection::assignability::is_assignable_from,
    runtime::{ExecutionEnvironment, Value},
    Error, Result,
};

/// Reads and writes one field through reflection
pub trait FieldAccessor: Send + Sync {
    /// The declared type of the field
    fn field_type(&self) -> TypeRc;

    /// Read the field of `obj` (`None` for static fields)
    ///
    /// # Errors
    /// Returns an error if the field cannot be read from `obj`
    fn get_value(&self, env: &dyn ExecutionEnvironment, obj: Option<&Value>) -> Result<Value>;

    /// Store `value` into the field of `obj` (`None` for static fields)
    ///
    /// # Errors
    /// Returns an error if `value` does not fit the field or the field cannot be written
    fn set_value(
        &self,
        env: &dyn ExecutionEnvironment,
        obj: Option<&Value>,
        value: Value,
    ) -> Result<()>;
}

/// Accessor for a reference-typed thread-static field.
///
/// Thread-static blocks are not available, so both operations report
/// [`Error::NotSupported`].
#[derive(Debug, Clone)]
pub struct ThreadStaticFieldAccessor {
    /// Address of the class constructor context, 0 if the type has no class constructor
    pub cctor_context: usize,
    /// The type declaring the field
    pub declaring_type: TypeRc,
    /// Offset of the declaring type's block in the thread-static area
    pub threadstatics_block_offset: i32,
    /// Offset of the field inside the block
    pub field_offset: i32,
    /// The declared type of the field
    pub field_type: TypeRc,
}

impl ThreadStaticFieldAccessor {
    fn unsupported(&self) -> Error {
        Error::NotSupported(format!(
            "Thread-static field at offset {} of {} is not accessible",
            self.field_offset,
            self.declaring_type.fullname()
        ))
    }
}

impl FieldAccessor for ThreadStaticFieldAccessor {
    fn field_type(&self) -> TypeRc {
        self.field_type.clone()
    }

    fn get_value(&self, _env: &dyn ExecutionEnvironment, _obj: Option<&Value>) -> Result<Value> {
        Err(self.unsupported())
    }

    fn set_value(
        &self,
        _env: &dyn ExecutionEnvironment,
        _obj: Option<&Value>,
        _value: Value,
    ) -> Result<()> {
        Err(self.unsupported())
    }
}

/// Accessor for a named instance field of heap objects
#[derive(Debug, Clone)]
pub struct InstanceFieldAccessor {
    /// The type declaring the field
    pub declaring_type: TypeRc,
    /// The field name
    pub name: String,
    /// The declared type of the field
    pub field_type: TypeRc,
}

impl InstanceFieldAccessor {
    /// Create an accessor for the field `name` of `declaring_type`
    #[must_use]
    pub fn new(declaring_type: &TypeRc, name: &str, field_type: &TypeRc) -> Self {
        InstanceFieldAccessor {
            declaring_type: declaring_type.clone(),
            name: name.to_string(),
            field_type: field_type.clone(),
        }
    }

    fn check_target(&self, env: &dyn ExecutionEnvironment, obj: Option<&Value>) -> Result<()> {
        let Some(actual) = obj.and_then(|obj| env.type_of(obj)) else {
            return Err(Error::ArgumentNull("obj"));
        };
        if !is_assignable_from(env, &self.declaring_type, &actual) {
            return Err(invalid_argument!(
                param = "obj",
                "Field {} of {} is not defined on {}",
                self.name,
                self.declaring_type.fullname(),
                actual.fullname()
            ));
        }
        Ok(())
    }

    /// The value an unassigned field of this type reads as
    fn default_value(&self) -> Value {
        if self.field_type.is_enum() {
            return Value::Enum {
                ty: self.field_type.clone(),
                value: 0,
            };
        }
        match CilPrimitiveKind::from_token(self.field_type.token) {
            Some(CilPrimitiveKind::Boolean) => Value::Boolean(false),
            Some(CilPrimitiveKind::Char) => Value::Char(0),
            Some(CilPrimitiveKind::I1) => Value::I1(0),
            Some(CilPrimitiveKind::U1) => Value::U1(0),
            Some(CilPrimitiveKind::I2) => Value::I2(0),
            Some(CilPrimitiveKind::U2) => Value::U2(0),
            Some(CilPrimitiveKind::I4) => Value::I4(0),
            Some(CilPrimitiveKind::U4) => Value::U4(0),
            Some(CilPrimitiveKind::I8) => Value::I8(0),
            Some(CilPrimitiveKind::U8) => Value::U8(0),
            Some(CilPrimitiveKind::R4) => Value::R4(0.0),
            Some(CilPrimitiveKind::R8) => Value::R8(0.0),
            Some(CilPrimitiveKind::I) => Value::I(0),
            Some(CilPrimitiveKind::U) => Value::U(0),
            _ => Value::Null,
        }
    }
}

impl FieldAccessor for InstanceFieldAccessor {
    fn field_type(&self) -> TypeRc {
        self.field_type.clone()
    }

    fn get_value(&self, env: &dyn ExecutionEnvironment, obj: Option<&Value>) -> Result<Value> {
        self.check_target(env, obj)?;
        let stored = obj
            .and_then(Value::as_object)
            .and_then(|object| object.field(&self.name));
        Ok(stored.unwrap_or_else(|| self.default_value()))
    }

    fn set_value(
        &self,
        env: &dyn ExecutionEnvironment,
        obj: Option<&Value>,
        value: Value,
    ) -> Result<()> {
        self.check_target(env, obj)?;

        match env.type_of(&value) {
            None if self.field_type.is_value_type() => {
                return Err(invalid_argument!(
                    param = "value",
                    "Null cannot be stored in field {} of value type {}",
                    self.name,
                    self.field_type.fullname()
                ));
            }
            Some(actual) if !is_assignable_from(env, &self.field_type, &actual) => {
                return Err(invalid_argument!(
                    param = "value",
                    "Object of type {} cannot be stored in field {} of type {}",
                    actual.fullname(),
                    self.name,
                    self.field_type.fullname()
                ));
            }
            _ => {}
        }

        match obj.and_then(Value::as_object) {
            Some(object) => {
                object.set_field(&self.name, value);
                Ok(())
            }
            None => Err(Error::NotSupported(format!(
                "Field {} can only be stored on heap objects",
                self.name
            ))),
        }
    }
}

/// Identity of a field handle: the address of its native layout signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldHandleInfo {
    /// Address of the native layout signature describing the field
    pub native_layout_info_signature: usize,
}
