//! Built-in GREL string functions

use super::{FunctionParameters, FunctionRegistry};
use crate::error::{RmlError, RmlResult};
use crate::source::RawValue;
use crate::vocab::grel;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.register(grel::TO_UPPER_CASE, to_upper_case);
    registry.register(grel::TO_LOWER_CASE, to_lower_case);
    registry.register(grel::STRING_TRIM, string_trim);
    registry.register(grel::ARRAY_JOIN, array_join);
}

fn required_string(function: &str, params: &FunctionParameters) -> RmlResult<Option<String>> {
    match params.first(grel::VALUE_PARAMETER) {
        None => Ok(None),
        Some(RawValue::List(_)) => Err(RmlError::Function {
            function: function.to_string(),
            message: "valueParameter must be a single value".to_string(),
        }),
        Some(value) => Ok(value.lexical()),
    }
}

fn map_string(
    function: &str,
    params: &FunctionParameters,
    f: impl Fn(&str) -> String,
) -> RmlResult<RawValue> {
    Ok(required_string(function, params)?
        .map(|s| RawValue::String(f(&s)))
        .unwrap_or(RawValue::Null))
}

fn to_upper_case(params: &FunctionParameters) -> RmlResult<RawValue> {
    map_string(grel::TO_UPPER_CASE, params, str::to_uppercase)
}

fn to_lower_case(params: &FunctionParameters) -> RmlResult<RawValue> {
    map_string(grel::TO_LOWER_CASE, params, str::to_lowercase)
}

fn string_trim(params: &FunctionParameters) -> RmlResult<RawValue> {
    map_string(grel::STRING_TRIM, params, |s| s.trim().to_string())
}

/// Join every value bound to `p_array_a` with `p_string_sep`
fn array_join(params: &FunctionParameters) -> RmlResult<RawValue> {
    let separator = params.string(grel::P_STRING_SEP).unwrap_or_default();

    let mut parts = Vec::new();
    for value in params.values(grel::P_ARRAY_A) {
        value.flatten_into(&mut parts);
    }
    let parts: Vec<String> = parts.into_iter().flatten().collect();
    if parts.is_empty() {
        return Ok(RawValue::Null);
    }
    Ok(RawValue::String(parts.join(&separator)))
}
