//! Resources exposed via Model Context Protocol
//!
//! `info://server` is static; `greeting://{name}` and `quote://{category}` bind
//! their placeholder from the requested URI.

use crate::engine::{
    sync_handler, ArgValue, Arguments, HandlerDescriptor, HandlerResult, ParamType,
    ParameterSpec, Registry,
};
use crate::errors::RegistryError;

pub const GREETING_TEMPLATE: &str = "greeting://{name}";
pub const SERVER_INFO_URI: &str = "info://server";
pub const QUOTE_TEMPLATE: &str = "quote://{category}";

pub const NO_QUOTE_FOUND: &str = "No quote found for this category";

const SERVER_INFO: &str = "MCP Demo Server v1.0

Features:
- Math operations (add, subtract, multiply, divide, power, sqrt, factorial)
- String operations (reverse, uppercase, lowercase, word/char count)
- Utility tools (timestamp, random numbers, random choice)
- Data tools (dict creation, list operations)
- Progress reporting
- Multiple resources and prompts
";

const QUOTES: [(&str, &str); 4] = [
    (
        "motivation",
        "The only way to do great work is to love what you do. - Steve Jobs",
    ),
    (
        "wisdom",
        "The only true wisdom is in knowing you know nothing. - Socrates",
    ),
    (
        "success",
        "Success is not final, failure is not fatal. - Winston Churchill",
    ),
    (
        "life",
        "Life is what happens when you're busy making other plans. - John Lennon",
    ),
];

pub fn register(registry: &Registry) -> Result<(), RegistryError> {
    registry.register_resource(
        HandlerDescriptor::new(GREETING_TEMPLATE, "Get personalized greeting", ParamType::String)
            .with_title("get_greeting")
            .param(ParameterSpec::required("name", ParamType::String)),
        sync_handler(greeting),
    )?;
    registry.register_resource(
        HandlerDescriptor::new(SERVER_INFO_URI, "Get server information", ParamType::String)
            .with_title("get_server_info"),
        sync_handler(|_| Ok(ArgValue::from(SERVER_INFO))),
    )?;
    registry.register_resource(
        HandlerDescriptor::new(QUOTE_TEMPLATE, "Get quote by category", ParamType::String)
            .with_title("get_quote")
            .param(ParameterSpec::required("category", ParamType::String)),
        sync_handler(quote),
    )?;
    Ok(())
}

fn greeting(args: &Arguments) -> HandlerResult {
    let name = args.string("name")?;
    Ok(ArgValue::String(format!(
        "Hello, {name}! Welcome to the MCP server!"
    )))
}

/// Unknown categories are a successful read with a fixed message.
fn quote(args: &Arguments) -> HandlerResult {
    let category = args.string("category")?.to_lowercase();
    let text = QUOTES
        .iter()
        .find(|(key, _)| *key == category)
        .map(|(_, text)| *text)
        .unwrap_or(NO_QUOTE_FOUND);
    Ok(ArgValue::from(text))
}
