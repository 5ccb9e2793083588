//! Shared setup for the integration tests.
//!
//! Builds a small `Demo` model through the public API only: a class `M` with an `Int32`
//! field, a `Base`/`Derived`/`Leaf` hierarchy with a virtual method, two `Int32` enums and one
//! `Int64` enum, and the delegate types the binding rules are exercised with.

#![allow(dead_code)]

use dotreflect::prelude::*;

pub struct Demo {
    pub env: RuntimeEnvironment,

    pub m: TypeRc,
    pub base: TypeRc,
    pub derived: TypeRc,
    pub leaf: TypeRc,
    pub color: TypeRc,
    pub shade: TypeRc,
    pub wide: TypeRc,

    /// `int(int)`
    pub int_to_int: TypeRc,
    /// `int(M, int)`
    pub m_int_to_int: TypeRc,
    /// `int(Color)`
    pub color_to_int: TypeRc,
    /// `int()`
    pub nullary_int: TypeRc,
    /// `void()`
    pub nullary_void: TypeRc,

    /// `static int Negate(int)`
    pub negate: MethodRc,
    /// `static int Concat(string, int)`
    pub concat: MethodRc,
    /// `static int Add(int, int)`
    pub add: MethodRc,
    /// `static int Answer()`
    pub answer: MethodRc,
    /// `static void Tick()`
    pub tick: MethodRc,
    /// `static Color Paint(Color)`
    pub paint: MethodRc,
    /// instance `int M.AddBias(int)`
    pub add_bias: MethodRc,
    /// `M(int bias)`
    pub m_ctor: MethodRc,
    /// `static void Swap(ref int, ref int)`
    pub swap: MethodRc,
    /// `static ref int Slot()`
    pub slot: MethodRc,

    pub base_describe: MethodRc,
    pub derived_describe: MethodRc,
    pub leaf_describe: MethodRc,
}

pub fn demo() -> Result<Demo> {
    demo_with(ReflectionConfig::default())
}

pub fn demo_with(config: ReflectionConfig) -> Result<Demo> {
    let env = RuntimeEnvironment::with_config(config);
    let types = env.registry();
    let int32 = types.primitive(CilPrimitiveKind::I4);
    let string = types.string();

    let m = TypeBuilder::class("Demo", "M").build(&types)?;
    let base = TypeBuilder::class("Demo", "Base").build(&types)?;
    let derived = TypeBuilder::class("Demo", "Derived")
        .extends(&base)
        .build(&types)?;
    let leaf = TypeBuilder::class("Demo", "Leaf")
        .extends(&derived)
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

    let answer = MethodBuilder::new("Answer")
        .static_()
        .returns(&int32)
        .body(|_, _| Ok(Value::I4(42)))
        .build(&env, Some(&m))?;

    let tick = MethodBuilder::new("Tick")
        .static_()
        .body(|_, _| Ok(Value::Null))
        .build(&env, Some(&m))?;

    let paint = MethodBuilder::new("Paint")
        .static_()
        .returns(&color)
        .param("color", &color)
        .body(|_, args| Ok(args[0].clone()))
        .build(&env, Some(&m))?;

    let add_bias = MethodBuilder::new("AddBias")
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

    let by_ref_int = types.make_by_ref(&int32);
    let swap = MethodBuilder::new("Swap")
        .static_()
        .param("left", &by_ref_int)
        .param("right", &by_ref_int)
        .body(|_, args| {
            args.swap(0, 1);
            Ok(Value::Null)
        })
        .build(&env, Some(&m))?;

    let slot = MethodBuilder::new("Slot")
        .static_()
        .returns(&by_ref_int)
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
    let leaf_describe = MethodBuilder::new("Describe")
        .virtual_()
        .returns(&string)
        .body(|_, _| Ok(Value::string("leaf")))
        .build(&env, Some(&leaf))?;

    Ok(Demo {
        env,
        m,
        base,
        derived,
        leaf,
        color,
        shade,
        wide,
        int_to_int,
        m_int_to_int,
        color_to_int,
        nullary_int,
        nullary_void,
        negate,
        concat,
        add,
        answer,
        tick,
        paint,
        add_bias,
        m_ctor,
        swap,
        slot,
        base_describe,
        derived_describe,
        leaf_describe,
    })
}

/// Allocate an `M` with its `bias` field set
pub fn m_instance(demo: &Demo, bias: i32) -> Result<Value> {
    demo.m_ctor.construct(&demo.env, Some(&mut [Value::I4(bias)]))
}
