//! Benchmarks for delegate binding and reflected invocation.
//!
//! Measures the hot paths after the per-method caches are warm:
//! - Parameter queries served from the cache
//! - Open and closed delegate binding
//! - `MethodBase::invoke` with argument validation
//! - `Delegate::dynamic_invoke` for each binding shape

extern crate dotreflect;

use criterion::{criterion_group, criterion_main, Criterion};
use dotreflect::prelude::*;
use std::hint::black_box;

struct Setup {
    env: RuntimeEnvironment,
    unary: TypeRc,
    negate: MethodRc,
    concat: MethodRc,
}

fn setup() -> Setup {
    let env = RuntimeEnvironment::with_config(ReflectionConfig::production());
    let types = env.registry();
    let int32 = types.primitive(CilPrimitiveKind::I4);
    let string = types.string();
    let math = TypeBuilder::class("Bench", "Math").build(&types).unwrap();

    let unary = env
        .define_delegate("Bench", "Unary", &int32, &[int32.clone()])
        .unwrap();

    let negate = MethodBuilder::new("Negate")
        .static_()
        .returns(&int32)
        .param("value", &int32)
        .body(|_, args| Ok(Value::I4(-args[0].as_i32().unwrap_or_default())))
        .build(&env, Some(&math))
        .unwrap();

    let concat = MethodBuilder::new("Concat")
        .static_()
        .returns(&int32)
        .param("prefix", &string)
        .param("value", &int32)
        .body(|_, args| {
            let prefix = args[0].as_str().map_or(0, str::len) as i32;
            Ok(Value::I4(prefix + args[1].as_i32().unwrap_or_default()))
        })
        .build(&env, Some(&math))
        .unwrap();

    Setup {
        env,
        unary,
        negate,
        concat,
    }
}

/// Benchmark a parameter query once the cache is populated.
fn bench_cached_parameters(c: &mut Criterion) {
    let setup = setup();
    let _ = setup.concat.parameters(&setup.env);

    c.bench_function("parameters_cached", |b| {
        b.iter(|| black_box(setup.concat.parameters(black_box(&setup.env))));
    });
}

/// Benchmark binding an open static delegate: int Negate(int) to int(int).
fn bench_bind_open_static(c: &mut Criterion) {
    let setup = setup();

    c.bench_function("bind_open_static", |b| {
        b.iter(|| {
            let delegate = setup
                .negate
                .create_delegate(&setup.env, black_box(&setup.unary))
                .unwrap();
            black_box(delegate)
        });
    });
}

/// Benchmark binding a closed static delegate: int Concat(string, int) to int(int).
fn bench_bind_closed_static(c: &mut Criterion) {
    let setup = setup();
    let target = Value::string("prefix");

    c.bench_function("bind_closed_static", |b| {
        b.iter(|| {
            let delegate = setup
                .concat
                .create_delegate_with_target(&setup.env, &setup.unary, black_box(&target))
                .unwrap();
            black_box(delegate)
        });
    });
}

/// Benchmark a rejected binding reported through the non-throwing path.
fn bench_bind_rejected(c: &mut Criterion) {
    let setup = setup();

    c.bench_function("bind_rejected", |b| {
        b.iter(|| {
            let attempt = setup
                .concat
                .try_create_delegate(&setup.env, &setup.unary, None, false)
                .unwrap();
            black_box(attempt.is_err())
        });
    });
}

/// Benchmark reflected invocation with argument validation.
fn bench_invoke(c: &mut Criterion) {
    let setup = setup();

    c.bench_function("invoke_validated", |b| {
        b.iter(|| {
            let mut args = [Value::I4(black_box(21))];
            black_box(setup.negate.invoke(&setup.env, None, Some(&mut args)).unwrap())
        });
    });
}

/// Benchmark invoking bound delegates of both static shapes.
fn bench_dynamic_invoke(c: &mut Criterion) {
    let setup = setup();
    let open = setup.negate.create_delegate(&setup.env, &setup.unary).unwrap();
    let closed = setup
        .concat
        .create_delegate_with_target(&setup.env, &setup.unary, &Value::string("prefix"))
        .unwrap();

    c.bench_function("dynamic_invoke_open_static", |b| {
        b.iter(|| {
            let mut args = [Value::I4(black_box(3))];
            black_box(open.dynamic_invoke(&mut args).unwrap())
        });
    });

    c.bench_function("dynamic_invoke_closed_static", |b| {
        b.iter(|| {
            let mut args = [Value::I4(black_box(3))];
            black_box(closed.dynamic_invoke(&mut args).unwrap())
        });
    });
}

criterion_group!(
    benches,
    bench_cached_parameters,
    bench_bind_open_static,
    bench_bind_closed_static,
    bench_bind_rejected,
    bench_invoke,
    bench_dynamic_invoke
);
criterion_main!(benches);
