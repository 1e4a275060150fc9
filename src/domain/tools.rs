//! Tools exposed via Model Context Protocol
//!
//! Math, string, utility and data tools. Expected failures (division by zero,
//! empty lists and the like) are domain errors with user-facing messages.

use std::collections::BTreeMap;

use chrono::Local;
use rand::{seq::SliceRandom, Rng};

use crate::engine::{
    handler_fn, sync_handler, ArgValue, Arguments, HandlerDescriptor, HandlerError,
    HandlerResult, ParamType, ParameterSpec, ProgressChannel, Registry,
};
use crate::errors::RegistryError;

pub const MAX_ECHO_STEPS: i64 = 1000;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

fn binary(name: &str, description: &str, left: &str, right: &str) -> HandlerDescriptor {
    HandlerDescriptor::new(name, description, ParamType::Number)
        .param(ParameterSpec::required(left, ParamType::Number))
        .param(ParameterSpec::required(right, ParamType::Number))
}

fn text_tool(name: &str, description: &str, returns: ParamType) -> HandlerDescriptor {
    HandlerDescriptor::new(name, description, returns)
        .param(ParameterSpec::required("text", ParamType::String))
}

fn finite(value: f64) -> HandlerResult {
    if value.is_finite() {
        Ok(ArgValue::Number(value))
    } else {
        Err(HandlerError::domain("Result is not a finite number"))
    }
}

pub fn register(registry: &Registry) -> Result<(), RegistryError> {
    register_math(registry)?;
    register_strings(registry)?;
    register_utilities(registry)?;
    register_data(registry)
}

fn register_math(registry: &Registry) -> Result<(), RegistryError> {
    registry.register_tool(
        binary("add", "Add two numbers", "a", "b"),
        sync_handler(|args| finite(args.number("a")? + args.number("b")?)),
    )?;
    registry.register_tool(
        binary("subtract", "Subtract b from a", "a", "b"),
        sync_handler(|args| finite(args.number("a")? - args.number("b")?)),
    )?;
    registry.register_tool(
        binary("multiply", "Multiply two numbers", "a", "b"),
        sync_handler(|args| finite(args.number("a")? * args.number("b")?)),
    )?;
    registry.register_tool(binary("divide", "Divide a by b", "a", "b"), sync_handler(divide))?;
    registry.register_tool(
        binary("power", "Calculate base raised to exponent", "base", "exponent"),
        sync_handler(|args| finite(args.number("base")?.powf(args.number("exponent")?))),
    )?;
    registry.register_tool(
        HandlerDescriptor::new("square_root", "Calculate square root of a number", ParamType::Number)
            .param(ParameterSpec::required("n", ParamType::Number)),
        sync_handler(square_root),
    )?;
    registry.register_tool(
        HandlerDescriptor::new("factorial", "Calculate factorial of n", ParamType::Integer)
            .param(ParameterSpec::required("n", ParamType::Integer)),
        sync_handler(factorial),
    )?;
    Ok(())
}

fn divide(args: &Arguments) -> HandlerResult {
    let divisor = args.number("b")?;
    if divisor == 0.0 {
        return Err(HandlerError::domain("Cannot divide by zero"));
    }
    finite(args.number("a")? / divisor)
}

fn square_root(args: &Arguments) -> HandlerResult {
    let n = args.number("n")?;
    if n < 0.0 {
        return Err(HandlerError::domain(
            "Cannot calculate square root of negative number",
        ));
    }
    Ok(ArgValue::Number(n.sqrt()))
}

fn factorial(args: &Arguments) -> HandlerResult {
    let n = args.integer("n")?;
    if n < 0 {
        return Err(HandlerError::domain(
            "Factorial not defined for negative numbers",
        ));
    }
    (2..=n)
        .try_fold(1_i64, |product, factor| product.checked_mul(factor))
        .map(ArgValue::Integer)
        .ok_or_else(|| HandlerError::domain(format!("Factorial of {n} is too large")))
}

fn register_strings(registry: &Registry) -> Result<(), RegistryError> {
    registry.register_tool(
        text_tool("reverse_string", "Reverse a string", ParamType::String),
        sync_handler(|args| Ok(ArgValue::String(args.string("text")?.chars().rev().collect()))),
    )?;
    registry.register_tool(
        text_tool("uppercase", "Convert text to uppercase", ParamType::String),
        sync_handler(|args| Ok(ArgValue::String(args.string("text")?.to_uppercase()))),
    )?;
    registry.register_tool(
        text_tool("lowercase", "Convert text to lowercase", ParamType::String),
        sync_handler(|args| Ok(ArgValue::String(args.string("text")?.to_lowercase()))),
    )?;
    registry.register_tool(
        text_tool("count_words", "Count words in text", ParamType::Integer),
        sync_handler(|args| {
            Ok(ArgValue::Integer(
                args.string("text")?.split_whitespace().count() as i64,
            ))
        }),
    )?;
    registry.register_tool(
        text_tool("count_chars", "Count characters in text", ParamType::Integer).param(
            ParameterSpec::optional("include_spaces", ParamType::Boolean, true)
                .with_description("Count space characters too"),
        ),
        sync_handler(count_chars),
    )?;
    Ok(())
}

fn count_chars(args: &Arguments) -> HandlerResult {
    let text = args.string("text")?;
    let count = if args.boolean("include_spaces")? {
        text.chars().count()
    } else {
        text.chars().filter(|c| *c != ' ').count()
    };
    Ok(ArgValue::Integer(count as i64))
}

fn register_utilities(registry: &Registry) -> Result<(), RegistryError> {
    registry.register_tool(
        HandlerDescriptor::new("get_timestamp", "Get current timestamp", ParamType::String),
        sync_handler(|_| Ok(ArgValue::String(Local::now().format(TIMESTAMP_FORMAT).to_string()))),
    )?;
    registry.register_tool(
        HandlerDescriptor::new(
            "random_number",
            "Generate random number between min and max",
            ParamType::Integer,
        )
        .param(ParameterSpec::optional("min_val", ParamType::Integer, 0_i64))
        .param(ParameterSpec::optional("max_val", ParamType::Integer, 100_i64)),
        sync_handler(random_number),
    )?;
    registry.register_tool(
        HandlerDescriptor::new("random_choice", "Pick random item from list", ParamType::String)
            .param(ParameterSpec::required(
                "items",
                ParamType::list_of(ParamType::String),
            )),
        sync_handler(random_choice),
    )?;
    registry.register_tool(
        HandlerDescriptor::new(
            "echo_with_progress",
            "Echo message with progress reporting",
            ParamType::String,
        )
        .param(ParameterSpec::required("message", ParamType::String))
        .param(
            ParameterSpec::optional("steps", ParamType::Integer, 3_i64)
                .with_description("Number of progress steps, at most 1000; 0 or less skips progress"),
        ),
        handler_fn(echo_with_progress),
    )?;
    Ok(())
}

fn random_number(args: &Arguments) -> HandlerResult {
    let low = args.integer("min_val")?;
    let high = args.integer("max_val")?;
    if low > high {
        return Err(HandlerError::domain("min_val must not be greater than max_val"));
    }
    Ok(ArgValue::Integer(rand::thread_rng().gen_range(low..=high)))
}

fn random_choice(args: &Arguments) -> HandlerResult {
    let items = args.strings("items")?;
    items
        .choose(&mut rand::thread_rng())
        .map(|item| ArgValue::from(*item))
        .ok_or_else(|| HandlerError::domain("List cannot be empty"))
}

async fn echo_with_progress(args: Arguments, channel: ProgressChannel) -> HandlerResult {
    let message = args.string("message")?;
    let steps = args.integer("steps")?;
    if steps > MAX_ECHO_STEPS {
        return Err(HandlerError::domain(format!(
            "steps must be at most {MAX_ECHO_STEPS}"
        )));
    }

    // A rejected emission means the invocation is over; its result is discarded.
    let _ = channel.info(format!("Starting echo with {steps} steps"));
    for step in 1..=steps {
        let reported = channel.report_progress(
            step as f64 / steps as f64,
            1.0,
            format!("Step {step}/{steps}"),
        );
        if reported.is_err() {
            break;
        }
        tokio::task::yield_now().await;
    }
    let _ = channel.debug("Echo completed");

    Ok(ArgValue::String(format!("Echo: {message}")))
}

fn register_data(registry: &Registry) -> Result<(), RegistryError> {
    registry.register_tool(
        HandlerDescriptor::new(
            "create_dict",
            "Create dictionary from keys and values",
            ParamType::Mapping,
        )
        .param(ParameterSpec::required("keys", ParamType::list_of(ParamType::String)))
        .param(ParameterSpec::required("values", ParamType::list_of(ParamType::String))),
        sync_handler(create_dict),
    )?;
    registry.register_tool(
        HandlerDescriptor::new("list_length", "Get length of list", ParamType::Integer).param(
            ParameterSpec::required("items", ParamType::list_of(ParamType::String))
                .with_description("List of strings; other element types are rejected"),
        ),
        sync_handler(|args| Ok(ArgValue::Integer(args.list("items")?.len() as i64))),
    )?;
    registry.register_tool(
        HandlerDescriptor::new("sum_list", "Sum all numbers in list", ParamType::Number).param(
            ParameterSpec::required("numbers", ParamType::list_of(ParamType::Number)),
        ),
        sync_handler(|args| finite(args.numbers("numbers")?.iter().sum())),
    )?;
    registry.register_tool(
        HandlerDescriptor::new(
            "average_list",
            "Calculate average of numbers in list",
            ParamType::Number,
        )
        .param(ParameterSpec::required(
            "numbers",
            ParamType::list_of(ParamType::Number),
        )),
        sync_handler(average_list),
    )?;
    Ok(())
}

fn create_dict(args: &Arguments) -> HandlerResult {
    let keys = args.strings("keys")?;
    let values = args.strings("values")?;
    if keys.len() != values.len() {
        return Err(HandlerError::domain("Keys and values must have same length"));
    }
    let entries = keys
        .into_iter()
        .zip(values)
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect::<BTreeMap<_, _>>();
    Ok(ArgValue::Mapping(entries))
}

fn average_list(args: &Arguments) -> HandlerResult {
    let numbers = args.numbers("numbers")?;
    if numbers.is_empty() {
        return Err(HandlerError::domain("List cannot be empty"));
    }
    finite(numbers.iter().sum::<f64>() / numbers.len() as f64)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Map, Value};

    use super::*;
    use crate::engine::{
        progress::RecordingSink, Category, Dispatcher, InvocationContext, InvocationRequest,
        ProgressEvent,
    };
    use crate::errors::{ErrorKind, InvocationError};

    fn dispatcher() -> Dispatcher {
        let registry = Registry::new();
        register(&registry).expect("tools register");
        Dispatcher::new(Arc::new(registry))
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object literal")
    }

    async fn call(name: &str, arguments: Value) -> Result<ArgValue, InvocationError> {
        dispatcher()
            .dispatch(InvocationRequest::tool(name, args(arguments)))
            .await
            .into_result()
    }

    fn domain(message: &str) -> Result<ArgValue, InvocationError> {
        Err(InvocationError::Domain(message.to_string()))
    }

    #[test]
    fn registers_every_tool() {
        let registry = Registry::new();
        register(&registry).expect("tools register");
        assert_eq!(registry.len(Category::Tool), 20);
    }

    #[tokio::test]
    async fn math_tools_compute() {
        assert_eq!(call("add", json!({ "a": 2, "b": 3 })).await, Ok(ArgValue::Number(5.0)));
        assert_eq!(call("subtract", json!({ "a": 2, "b": 3 })).await, Ok(ArgValue::Number(-1.0)));
        assert_eq!(
            call("power", json!({ "base": 2, "exponent": 10 })).await,
            Ok(ArgValue::Number(1024.0))
        );
        assert_eq!(call("square_root", json!({ "n": 9 })).await, Ok(ArgValue::Number(3.0)));
        assert_eq!(call("factorial", json!({ "n": 5 })).await, Ok(ArgValue::Integer(120)));
        assert_eq!(call("factorial", json!({ "n": 0 })).await, Ok(ArgValue::Integer(1)));
    }

    #[tokio::test]
    async fn math_tools_report_domain_errors() {
        assert_eq!(
            call("divide", json!({ "a": 1, "b": 0 })).await,
            domain("Cannot divide by zero")
        );
        assert_eq!(
            call("square_root", json!({ "n": -1 })).await,
            domain("Cannot calculate square root of negative number")
        );
        assert_eq!(
            call("factorial", json!({ "n": -3 })).await,
            domain("Factorial not defined for negative numbers")
        );
        assert_eq!(
            call("factorial", json!({ "n": 21 })).await,
            domain("Factorial of 21 is too large")
        );
        assert_eq!(
            call("power", json!({ "base": -8, "exponent": 0.5 })).await,
            domain("Result is not a finite number")
        );
    }

    #[tokio::test]
    async fn string_tools_transform_text() {
        assert_eq!(
            call("reverse_string", json!({ "text": "héllo" })).await,
            Ok(ArgValue::from("olléh"))
        );
        assert_eq!(call("uppercase", json!({ "text": "abc" })).await, Ok(ArgValue::from("ABC")));
        assert_eq!(call("lowercase", json!({ "text": "ABC" })).await, Ok(ArgValue::from("abc")));
        assert_eq!(
            call("count_words", json!({ "text": "  the quick  fox " })).await,
            Ok(ArgValue::Integer(3))
        );
        assert_eq!(
            call("count_chars", json!({ "text": "a b c" })).await,
            Ok(ArgValue::Integer(5))
        );
        assert_eq!(
            call("count_chars", json!({ "text": "a b c", "include_spaces": false })).await,
            Ok(ArgValue::Integer(3))
        );
    }

    #[tokio::test]
    async fn random_tools_stay_in_bounds() {
        for _ in 0..20 {
            let Ok(ArgValue::Integer(value)) =
                call("random_number", json!({ "min_val": 3, "max_val": 5 })).await
            else {
                panic!("random_number must return an integer");
            };
            assert!((3..=5).contains(&value));
        }
        assert_eq!(
            call("random_number", json!({ "min_val": 1, "max_val": 1 })).await,
            Ok(ArgValue::Integer(1))
        );
        assert_eq!(
            call("random_number", json!({ "min_val": 5, "max_val": 1 }))
                .await
                .map_err(|err| err.kind()),
            Err(ErrorKind::Domain)
        );

        let picked = call("random_choice", json!({ "items": ["x", "y"] })).await;
        assert!(matches!(picked, Ok(ArgValue::String(ref item)) if item == "x" || item == "y"));
        assert_eq!(
            call("random_choice", json!({ "items": [] })).await,
            domain("List cannot be empty")
        );
    }

    #[tokio::test]
    async fn timestamp_is_iso_like() {
        let Ok(ArgValue::String(stamp)) = call("get_timestamp", json!({})).await else {
            panic!("timestamp must be a string");
        };
        assert!(chrono::NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT).is_ok());
    }

    #[tokio::test]
    async fn data_tools_operate_on_lists() {
        assert_eq!(
            call("create_dict", json!({ "keys": ["a", "b"], "values": ["1", "2"] })).await,
            Ok(ArgValue::Mapping(BTreeMap::from([
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ])))
        );
        assert_eq!(
            call("create_dict", json!({ "keys": ["a"], "values": [] })).await,
            domain("Keys and values must have same length")
        );
        assert_eq!(
            call("list_length", json!({ "items": ["a", "b", "c"] })).await,
            Ok(ArgValue::Integer(3))
        );
        assert_eq!(
            call("sum_list", json!({ "numbers": [1, 2.5, 3] })).await,
            Ok(ArgValue::Number(6.5))
        );
        assert_eq!(
            call("average_list", json!({ "numbers": [1, 2, 3] })).await,
            Ok(ArgValue::Number(2.0))
        );
        assert_eq!(
            call("average_list", json!({ "numbers": [] })).await,
            domain("List cannot be empty")
        );
    }

    #[tokio::test]
    async fn echo_reports_progress_and_logs() {
        let sink = Arc::new(RecordingSink::default());
        let response = dispatcher()
            .dispatch_with(
                InvocationRequest::tool("echo_with_progress", args(json!({ "message": "hi" }))),
                InvocationContext::new().with_sink(sink.clone()),
            )
            .await;

        assert_eq!(response.into_result(), Ok(ArgValue::from("Echo: hi")));
        let events = sink.events();
        assert_eq!(events.len(), 5);
        assert!(matches!(&events[0], ProgressEvent::Log { message, .. } if message == "Starting echo with 3 steps"));
        assert!(matches!(&events[3], ProgressEvent::Progress { message, fraction, .. } if message == "Step 3/3" && *fraction == 1.0));
        assert!(matches!(&events[4], ProgressEvent::Log { message, .. } if message == "Echo completed"));
    }

    #[tokio::test]
    async fn echo_without_steps_skips_progress() {
        let sink = Arc::new(RecordingSink::default());
        let response = dispatcher()
            .dispatch_with(
                InvocationRequest::tool(
                    "echo_with_progress",
                    args(json!({ "message": "hi", "steps": 0 })),
                ),
                InvocationContext::new().with_sink(sink.clone()),
            )
            .await;

        assert_eq!(response.into_result(), Ok(ArgValue::from("Echo: hi")));
        assert!(sink.fractions().is_empty());
        assert_eq!(
            call("echo_with_progress", json!({ "message": "hi", "steps": -2 })).await,
            Ok(ArgValue::from("Echo: hi"))
        );
    }

    #[tokio::test]
    async fn echo_rejects_too_many_steps() {
        assert_eq!(
            call("echo_with_progress", json!({ "message": "hi", "steps": 1001 }))
                .await
                .map_err(|err| err.kind()),
            Err(ErrorKind::Domain)
        );
    }

    #[tokio::test]
    async fn list_length_counts_strings_only() {
        let error = call("list_length", json!({ "items": [1, 2, 3] }))
            .await
            .expect_err("numbers are not strings");
        assert_eq!(error.kind(), ErrorKind::Validation);
    }
}
