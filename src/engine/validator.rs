//! Invocation validator
//!
//! Turns a raw, already-deserialized argument bag into typed [`Arguments`]
//! according to a parameter list. Fail-fast: the first problem is reported and
//! no handler code runs.

use std::{collections::BTreeMap, sync::OnceLock};

use regex::Regex;
use serde_json::{Map, Value};

use crate::engine::{
    handler::Arguments,
    signature::{ArgValue, ParamType, ParameterSpec},
};
use crate::errors::{ValidationError, ValidationReason};

fn number_literal() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?$")
            .expect("valid number literal pattern")
    })
}

fn integer_literal() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^-?(0|[1-9][0-9]*)$").expect("valid integer literal pattern"))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn validate(
    parameters: &[ParameterSpec],
    raw: &Map<String, Value>,
) -> Result<Arguments, ValidationError> {
    if let Some(unknown) = raw
        .keys()
        .find(|key| !parameters.iter().any(|spec| spec.name == **key))
    {
        let expected = if parameters.is_empty() {
            "no arguments".to_string()
        } else {
            format!(
                "one of: {}",
                parameters
                    .iter()
                    .map(|spec| spec.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        return Err(ValidationError {
            parameter: unknown.clone(),
            expected,
            reason: ValidationReason::Unknown,
        });
    }

    let mut values = Vec::with_capacity(parameters.len());
    for spec in parameters {
        let value = match raw.get(&spec.name) {
            None | Some(Value::Null) if !spec.required => spec.resolved_default(),
            None => return Err(failure(spec, ValidationReason::Missing)),
            Some(raw_value) => coerce(&spec.param_type, raw_value)
                .map_err(|reason| failure(spec, reason))?,
        };
        values.push((spec.name.clone(), value));
    }

    Ok(Arguments::new(values))
}

fn failure(spec: &ParameterSpec, reason: ValidationReason) -> ValidationError {
    ValidationError {
        parameter: spec.name.clone(),
        expected: spec.param_type.to_string(),
        reason,
    }
}

fn coerce(param_type: &ParamType, value: &Value) -> Result<ArgValue, ValidationReason> {
    let mismatch = || ValidationReason::TypeMismatch {
        found: json_type_name(value),
    };

    match param_type {
        ParamType::Number => coerce_number(value).ok_or_else(mismatch),
        ParamType::Integer => coerce_integer(value).ok_or_else(mismatch),
        ParamType::String => value
            .as_str()
            .map(|text| ArgValue::String(text.to_string()))
            .ok_or_else(mismatch),
        ParamType::Boolean => match value {
            Value::Bool(flag) => Ok(ArgValue::Boolean(*flag)),
            Value::String(text) if text == "true" => Ok(ArgValue::Boolean(true)),
            Value::String(text) if text == "false" => Ok(ArgValue::Boolean(false)),
            _ => Err(mismatch()),
        },
        ParamType::List(inner) => {
            let items = value.as_array().ok_or_else(mismatch)?;
            items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    coerce(inner, item).map_err(|_| ValidationReason::ElementMismatch {
                        index,
                        found: json_type_name(item),
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(ArgValue::List)
        }
        ParamType::Mapping => {
            let object = value.as_object().ok_or_else(mismatch)?;
            object
                .iter()
                .map(|(key, item)| match item.as_str() {
                    Some(text) => Ok((key.clone(), text.to_string())),
                    None => Err(ValidationReason::ValueMismatch {
                        key: key.clone(),
                        found: json_type_name(item),
                    }),
                })
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(ArgValue::Mapping)
        }
    }
}

fn coerce_number(value: &Value) -> Option<ArgValue> {
    match value {
        Value::Number(number) => number.as_f64().map(ArgValue::Number),
        Value::String(text) if number_literal().is_match(text) => text
            .parse::<f64>()
            .ok()
            .filter(|parsed| parsed.is_finite())
            .map(ArgValue::Number),
        _ => None,
    }
}

/// 2^63. `i64::MAX as f64` rounds up to this, so the upper bound is exclusive.
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

fn coerce_integer(value: &Value) -> Option<ArgValue> {
    match value {
        Value::Number(number) => number.as_i64().map(ArgValue::Integer).or_else(|| {
            number
                .as_f64()
                .filter(|float| {
                    float.fract() == 0.0 && (-I64_LIMIT..I64_LIMIT).contains(float)
                })
                .map(|float| ArgValue::Integer(float as i64))
        }),
        Value::String(text) if integer_literal().is_match(text) => {
            text.parse::<i64>().ok().map(ArgValue::Integer)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object literal")
    }

    fn add_params() -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required("a", ParamType::Number),
            ParameterSpec::required("b", ParamType::Number),
        ]
    }

    #[test]
    fn produces_positional_arguments() {
        let args = validate(&add_params(), &raw(json!({ "b": 3, "a": 2 }))).expect("valid args");

        assert_eq!(args.positional(0), Some(&ArgValue::Number(2.0)));
        assert_eq!(args.positional(1), Some(&ArgValue::Number(3.0)));
    }

    #[test]
    fn missing_required_argument_is_rejected() {
        let error = validate(&add_params(), &raw(json!({ "a": 2 }))).expect_err("missing b");

        assert_eq!(error.parameter, "b");
        assert_eq!(error.reason, ValidationReason::Missing);
    }

    #[test]
    fn type_mismatch_names_parameter_and_type() {
        let error =
            validate(&add_params(), &raw(json!({ "a": "x", "b": 3 }))).expect_err("bad a");

        assert_eq!(error.parameter, "a");
        assert_eq!(error.expected, "number");
        assert_eq!(error.reason, ValidationReason::TypeMismatch { found: "string" });
    }

    #[test]
    fn integers_outside_i64_are_rejected() {
        let params = vec![ParameterSpec::required("n", ParamType::Integer)];

        let error = validate(&params, &raw(json!({ "n": 9_223_372_036_854_775_808_u64 })))
            .expect_err("2^63 does not fit");
        assert_eq!(error.parameter, "n");
        assert_eq!(error.expected, "integer");

        let error = validate(&params, &raw(json!({ "n": 9.3e18 }))).expect_err("float above i64");
        assert_eq!(error.parameter, "n");

        let args = validate(&params, &raw(json!({ "n": i64::MAX }))).expect("i64::MAX fits");
        assert_eq!(args.integer("n"), Ok(i64::MAX));

        let args = validate(&params, &raw(json!({ "n": -9.223372036854775808e18 })))
            .expect("-2^63 fits");
        assert_eq!(args.integer("n"), Ok(i64::MIN));
    }

    #[test]
    fn numeric_literal_strings_are_numbers() {
        let args = validate(&add_params(), &raw(json!({ "a": "-3.5", "b": "1e3" })))
            .expect("numeric literals");

        assert_eq!(args.number("a"), Ok(-3.5));
        assert_eq!(args.number("b"), Ok(1000.0));
        assert!(validate(&add_params(), &raw(json!({ "a": "NaN", "b": 1 }))).is_err());
        assert!(validate(&add_params(), &raw(json!({ "a": " 2", "b": 1 }))).is_err());
    }

    #[test]
    fn integers_reject_fractions() {
        let params = vec![ParameterSpec::required("n", ParamType::Integer)];

        assert_eq!(
            validate(&params, &raw(json!({ "n": 5.0 })))
                .expect("integral float")
                .integer("n"),
            Ok(5)
        );
        assert!(validate(&params, &raw(json!({ "n": 5.5 }))).is_err());
        assert!(validate(&params, &raw(json!({ "n": "5.0" }))).is_err());
        assert_eq!(
            validate(&params, &raw(json!({ "n": "-4" })))
                .expect("integer literal")
                .integer("n"),
            Ok(-4)
        );
    }

    #[test]
    fn booleans_accept_only_literals() {
        let params = vec![ParameterSpec::required("flag", ParamType::Boolean)];

        assert!(validate(&params, &raw(json!({ "flag": "true" }))).is_ok());
        assert!(validate(&params, &raw(json!({ "flag": "yes" }))).is_err());
        assert!(validate(&params, &raw(json!({ "flag": 1 }))).is_err());
    }

    #[test]
    fn optional_argument_takes_default_unchanged() {
        let params = vec![
            ParameterSpec::required("text", ParamType::String),
            ParameterSpec::optional("include_spaces", ParamType::Boolean, true),
            ParameterSpec::nullable("note", ParamType::String),
        ];

        let args = validate(&params, &raw(json!({ "text": "a b" }))).expect("valid args");
        assert_eq!(args.get("include_spaces"), Some(&ArgValue::Boolean(true)));
        assert_eq!(args.get("note"), Some(&ArgValue::Null));

        let args = validate(&params, &raw(json!({ "text": "a b", "include_spaces": null })))
            .expect("null selects default");
        assert_eq!(args.get("include_spaces"), Some(&ArgValue::Boolean(true)));
    }

    #[test]
    fn null_for_required_argument_is_a_mismatch() {
        let error =
            validate(&add_params(), &raw(json!({ "a": null, "b": 1 }))).expect_err("null a");
        assert_eq!(error.reason, ValidationReason::TypeMismatch { found: "null" });
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let error = validate(&add_params(), &raw(json!({ "a": 1, "b": 2, "c": 3 })))
            .expect_err("unknown c");

        assert_eq!(error.parameter, "c");
        assert_eq!(error.reason, ValidationReason::Unknown);
        assert_eq!(error.expected, "one of: a, b");
    }

    #[test]
    fn list_elements_are_checked() {
        let params = vec![ParameterSpec::required(
            "numbers",
            ParamType::list_of(ParamType::Number),
        )];

        let args = validate(&params, &raw(json!({ "numbers": [1, 2.5] }))).expect("valid list");
        assert_eq!(args.numbers("numbers"), Ok(vec![1.0, 2.5]));

        let error =
            validate(&params, &raw(json!({ "numbers": [1, "two"] }))).expect_err("bad element");
        assert_eq!(
            error.reason,
            ValidationReason::ElementMismatch {
                index: 1,
                found: "string"
            }
        );
        assert_eq!(error.expected, "list<number>");
    }

    #[test]
    fn mapping_values_must_be_strings() {
        let params = vec![ParameterSpec::required("labels", ParamType::Mapping)];

        assert!(validate(&params, &raw(json!({ "labels": { "k": "v" } }))).is_ok());
        let error =
            validate(&params, &raw(json!({ "labels": { "k": 1 } }))).expect_err("bad value");
        assert_eq!(
            error.reason,
            ValidationReason::ValueMismatch {
                key: "k".to_string(),
                found: "number"
            }
        );
    }
}
