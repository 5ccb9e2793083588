use crate::{
    metadata::{
        method::{MethodBuilder, MethodRc, ParamAttributes},
        typesystem::{CilPrimitiveKind, TypeBuilder, TypeRc},
    },
    runtime::{RuntimeEnvironment, Value},
    Result,
};

/// A populated environment.
///
/// Types:
/// - `Demo.M` with an `Int32` field `bias`, `Demo.Base` and `Demo.Derived : Base`
/// - enums `Demo.Color` and `Demo.Shade` (`Int32`) and `Demo.Wide` (`Int64`)
/// - delegate types `int(int)`, `int(M, int)`, `int(Color)`, `int()` and `void()`
///
/// Methods (static on `M` unless noted):
/// - `int Add(int a, int b)`, `int Negate(int value)`
/// - `int Concat(string prefix, int value)`, returning the prefix length plus `value`
/// - `void Nothing()` without a body
/// - `T Identity<T>(T value)`
/// - instance `int M.AddBias(int x)`, returning `this.bias + x`
/// - instance constructor `M(int bias)`
/// - `void Increment(ref int value)`
/// - `ref int Slot()`, returning by reference
/// - virtual `string Base.Describe()` and its override `Derived.Describe()`
pub struct FixtureEnvironment {
    pub env: RuntimeEnvironment,

    pub m: TypeRc,
    pub base: TypeRc,
    pub derived: TypeRc,
    pub color: TypeRc,
    pub shade: TypeRc,
    pub wide: TypeRc,

    pub int_to_int: TypeRc,
    pub m_int_to_int: TypeRc,
    pub color_to_int: TypeRc,
    pub nullary_int: TypeRc,
    pub nullary_void: TypeRc,

    pub add: MethodRc,
    pub negate: MethodRc,
    pub concat: MethodRc,
    pub nothing: MethodRc,
    pub identity: MethodRc,
    pub m_add_bias: MethodRc,
    pub m_ctor: MethodRc,
    pub increment: MethodRc,
    pub slot: MethodRc,
    pub base_describe: MethodRc,
    pub derived_describe: MethodRc,
}

impl FixtureEnvironment {
    pub fn new() -> Result<Self> {
        Self::with_env(RuntimeEnvironment::new())
    }

    pub fn with_env(env: RuntimeEnvironment) -> Result<Self> {
        let types = env.registry();
        let int32 = types.primitive(CilPrimitiveKind::I4);
        let string = types.string();

        let m = TypeBuilder::class("Demo", "M").build(&types)?;
        let base = TypeBuilder::class("Demo", "Base").build(&types)?;
        let derived = TypeBuilder::class("Demo", "Derived")
            .extends(&base)
            .build(&types)?;
        let color = TypeBuilder::enumeration("Demo", "Color", CilPrimitiveKind::I4).build(&types)?;
        let shade = TypeBuilder::enumeration("Demo", "Shade", CilPrimitiveKind::I4).build(&types)?;
        let wide = TypeBuilder::enumeration("Demo", "Wide", CilPrimitiveKind::I8).build(&types)?;

        let int_to_int = env.define_delegate("Demo", "IntToInt", &int32, &[int32.clone()])?;
        let m_int_to_int =
            env.define_delegate("Demo", "MIntToInt", &int32, &[m.clone(), int32.clone()])?;
        let color_to_int = env.define_delegate("Demo", "ColorToInt", &int32, &[color.clone()])?;
        let nullary_int = env.define_delegate("Demo", "NullaryInt", &int32, &[])?;
        let nullary_void = env.define_delegate("Demo", "NullaryVoid", &types.void(), &[])?;

        let add = MethodBuilder::new("Add")
            .static_()
            .returns(&int32)
            .param("a", &int32)
            .param("b", &int32)
            .body(|_, args| {
                let a = args[0].as_i32().unwrap_or_default();
                let b = args[1].as_i32().unwrap_or_default();
                Ok(Value::I4(a + b))
            })
            .build(&env, Some(&m))?;

        let negate = MethodBuilder::new("Negate")
            .static_()
            .returns(&int32)
            .param("value", &int32)
            .body(|_, args| {
                let value = args[0].as_i64().unwrap_or_default();
                Ok(Value::I4(-(value as i32)))
            })
            .build(&env, Some(&m))?;

        let concat = MethodBuilder::new("Concat")
            .static_()
            .returns(&int32)
            .param("prefix", &string)
            .param("value", &int32)
            .body(|_, args| {
                let prefix = args[0].as_str().map_or(0, str::len) as i32;
                Ok(Value::I4(prefix + args[1].as_i32().unwrap_or_default()))
            })
            .build(&env, Some(&m))?;

        let nothing = MethodBuilder::new("Nothing").static_().build(&env, Some(&m))?;

        let t = types.make_generic_parameter("T", 0, true);
        let identity = MethodBuilder::new("Identity")
            .static_()
            .generic_params(&[t.clone()])
            .returns(&t)
            .param("value", &t)
            .body(|_, args| Ok(args[0].clone()))
            .build(&env, Some(&m))?;

        let m_add_bias = MethodBuilder::new("AddBias")
            .returns(&int32)
            .param("x", &int32)
            .body(|this, args| {
                let bias = this
                    .and_then(Value::as_object)
                    .and_then(|object| object.field("bias"))
                    .and_then(|bias| bias.as_i32())
                    .unwrap_or_default();
                Ok(Value::I4(bias + args[0].as_i32().unwrap_or_default()))
            })
            .build(&env, Some(&m))?;

        let m_ctor = MethodBuilder::constructor()
            .param("bias", &int32)
            .body(|this, args| {
                if let Some(object) = this.and_then(Value::as_object) {
                    object.set_field("bias", args[0].clone());
                }
                Ok(Value::Null)
            })
            .build(&env, Some(&m))?;

        let increment = MethodBuilder::new("Increment")
            .static_()
            .param_with_attributes("value", &types.make_by_ref(&int32), ParamAttributes::IN)
            .body(|_, args| {
                if let Value::I4(value) = &mut args[0] {
                    *value += 1;
                }
                Ok(Value::Null)
            })
            .build(&env, Some(&m))?;

        let slot = MethodBuilder::new("Slot")
            .static_()
            .returns(&types.make_by_ref(&int32))
            .body(|_, _| Ok(Value::I4(0)))
            .build(&env, Some(&m))?;

        let base_describe = MethodBuilder::new("Describe")
            .new_slot()
            .returns(&string)
            .body(|_, _| Ok(Value::string("base")))
            .build(&env, Some(&base))?;
        let derived_describe = MethodBuilder::new("Describe")
            .virtual_()
            .returns(&string)
            .body(|_, _| Ok(Value::string("derived")))
            .build(&env, Some(&derived))?;

        Ok(FixtureEnvironment {
            env,
            m,
            base,
            derived,
            color,
            shade,
            wide,
            int_to_int,
            m_int_to_int,
            color_to_int,
            nullary_int,
            nullary_void,
            add,
            negate,
            concat,
            nothing,
            identity,
            m_add_bias,
            m_ctor,
            increment,
            slot,
            base_describe,
            derived_describe,
        })
    }
}
