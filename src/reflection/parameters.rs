//! The per-method parameter cache.
//!
//! The parameter list and the return parameter come out of the same signature pass, so they
//! are always computed together and both published into the method's cache slots, whichever
//! of the two the caller asked for.

use std::sync::Arc;

use tracing::debug;

use crate::{
    metadata::method::{MethodKind, ParamList, ParamRc, RuntimeMethod, RuntimeParameter},
    runtime::ExecutionEnvironment,
};

/// The cached parameters and return parameter of `method`, computing both on first use
pub(crate) fn runtime_parameters(
    method: &RuntimeMethod,
    env: &dyn ExecutionEnvironment,
) -> (ParamList, ParamRc) {
    if let (Some(parameters), Some(return_parameter)) = (
        method.lazy_parameters.get(),
        method.lazy_return_parameter.get(),
    ) {
        return (parameters, return_parameter);
    }

    let (parameters, return_parameter) = compute_parameters(method, env);
    debug!(
        method = %method,
        count = parameters.len(),
        "computed parameters"
    );

    (
        method.lazy_parameters.publish(parameters),
        method.lazy_return_parameter.publish(return_parameter),
    )
}

fn compute_parameters(
    method: &RuntimeMethod,
    env: &dyn ExecutionEnvironment,
) -> (ParamList, ParamRc) {
    // The synthetic CLSID constructor has no signature anywhere; it takes nothing and
    // returns nothing
    if matches!(method.kind, MethodKind::ClsidNullaryConstructor { .. }) {
        let return_parameter = Arc::new(RuntimeParameter {
            position: -1,
            name: None,
            parameter_type: env.types().void(),
            attributes: 0,
        });
        return (Arc::from(Vec::new()), return_parameter);
    }

    let signature = env.method_signature(method);
    let parameters: ParamList = signature
        .parameters
        .into_iter()
        .enumerate()
        .map(|(index, parameter)| {
            Arc::new(RuntimeParameter {
                position: i32::try_from(index).unwrap_or(i32::MAX),
                name: parameter.name,
                parameter_type: parameter.parameter_type,
                attributes: parameter.attributes,
            })
        })
        .collect();

    let return_parameter = Arc::new(RuntimeParameter {
        position: -1,
        name: None,
        parameter_type: signature.return_type,
        attributes: 0,
    });

    (parameters, return_parameter)
}

/// The ordered formal parameters of `method`
pub fn parameters(method: &RuntimeMethod, env: &dyn ExecutionEnvironment) -> ParamList {
    runtime_parameters(method, env).0
}

/// The return parameter of `method`
pub fn return_parameter(method: &RuntimeMethod, env: &dyn ExecutionEnvironment) -> ParamRc {
    runtime_parameters(method, env).1
}
