//! Handler contract: what registered capabilities execute

use std::{collections::BTreeMap, fmt, future::Future};

use async_trait::async_trait;
use thiserror::Error;

use crate::engine::{progress::ProgressChannel, signature::ArgValue};

/// Failure raised by handler code.
///
/// `Domain` is an expected, user-facing business-rule violation and reaches
/// the caller verbatim. `Fault` is anything else; the dispatcher logs it and
/// reports a generic internal error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Domain(String),
    #[error("handler fault: {0}")]
    Fault(String),
}

impl HandlerError {
    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain(message.into())
    }

    pub fn fault(detail: impl fmt::Display) -> Self {
        Self::Fault(detail.to_string())
    }
}

pub type HandlerResult = Result<ArgValue, HandlerError>;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, args: Arguments, channel: ProgressChannel) -> HandlerResult;
}

/// Handler backed by an async closure that receives the progress channel.
pub struct FnHandler<F> {
    func: F,
}

pub fn handler_fn<F, Fut>(func: F) -> FnHandler<F>
where
    F: Fn(Arguments, ProgressChannel) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHandler { func }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Arguments, ProgressChannel) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn call(&self, args: Arguments, channel: ProgressChannel) -> HandlerResult {
        (self.func)(args, channel).await
    }
}

/// Handler backed by a plain function that never touches the progress channel.
pub struct SyncHandler<F> {
    func: F,
}

pub fn sync_handler<F>(func: F) -> SyncHandler<F>
where
    F: Fn(&Arguments) -> HandlerResult + Send + Sync + 'static,
{
    SyncHandler { func }
}

#[async_trait]
impl<F> Handler for SyncHandler<F>
where
    F: Fn(&Arguments) -> HandlerResult + Send + Sync + 'static,
{
    async fn call(&self, args: Arguments, _channel: ProgressChannel) -> HandlerResult {
        (self.func)(&args)
    }
}

/// Validated arguments in declaration order.
///
/// Accessors only fail when a handler asks for a parameter it did not declare
/// or with the wrong type; that is a handler bug and surfaces as a fault.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: Vec<(String, ArgValue)>,
}

impl Arguments {
    pub fn new(values: Vec<(String, ArgValue)>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.values
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn positional(&self, index: usize) -> Option<&ArgValue> {
        self.values.get(index).map(|(_, value)| value)
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, value)| value)
    }

    fn require(&self, name: &str) -> Result<&ArgValue, HandlerError> {
        self.get(name)
            .ok_or_else(|| HandlerError::fault(format!("argument `{name}` was not declared")))
    }

    pub fn number(&self, name: &str) -> Result<f64, HandlerError> {
        match self.require(name)? {
            ArgValue::Number(value) => Ok(*value),
            ArgValue::Integer(value) => Ok(*value as f64),
            _ => Err(mismatch(name, "number")),
        }
    }

    pub fn integer(&self, name: &str) -> Result<i64, HandlerError> {
        match self.require(name)? {
            ArgValue::Integer(value) => Ok(*value),
            _ => Err(mismatch(name, "integer")),
        }
    }

    pub fn string(&self, name: &str) -> Result<&str, HandlerError> {
        match self.require(name)? {
            ArgValue::String(value) => Ok(value),
            _ => Err(mismatch(name, "string")),
        }
    }

    pub fn boolean(&self, name: &str) -> Result<bool, HandlerError> {
        match self.require(name)? {
            ArgValue::Boolean(value) => Ok(*value),
            _ => Err(mismatch(name, "boolean")),
        }
    }

    pub fn list(&self, name: &str) -> Result<&[ArgValue], HandlerError> {
        match self.require(name)? {
            ArgValue::List(items) => Ok(items),
            _ => Err(mismatch(name, "list")),
        }
    }

    pub fn numbers(&self, name: &str) -> Result<Vec<f64>, HandlerError> {
        self.list(name)?
            .iter()
            .map(|item| match item {
                ArgValue::Number(value) => Ok(*value),
                ArgValue::Integer(value) => Ok(*value as f64),
                _ => Err(mismatch(name, "list<number>")),
            })
            .collect()
    }

    pub fn strings(&self, name: &str) -> Result<Vec<&str>, HandlerError> {
        self.list(name)?
            .iter()
            .map(|item| match item {
                ArgValue::String(value) => Ok(value.as_str()),
                _ => Err(mismatch(name, "list<string>")),
            })
            .collect()
    }

    pub fn mapping(&self, name: &str) -> Result<&BTreeMap<String, String>, HandlerError> {
        match self.require(name)? {
            ArgValue::Mapping(entries) => Ok(entries),
            _ => Err(mismatch(name, "mapping")),
        }
    }
}

fn mismatch(name: &str, expected: &str) -> HandlerError {
    HandlerError::fault(format!("argument `{name}` is not a {expected}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Arguments {
        Arguments::new(vec![
            ("a".to_string(), ArgValue::Integer(2)),
            ("text".to_string(), ArgValue::from("hello")),
            (
                "numbers".to_string(),
                ArgValue::List(vec![ArgValue::Number(1.5), ArgValue::Integer(2)]),
            ),
        ])
    }

    #[test]
    fn integers_read_as_numbers() {
        let args = sample();
        assert_eq!(args.number("a"), Ok(2.0));
        assert_eq!(args.numbers("numbers"), Ok(vec![1.5, 2.0]));
    }

    #[test]
    fn wrong_accessor_is_a_fault() {
        let args = sample();
        assert!(matches!(args.boolean("text"), Err(HandlerError::Fault(_))));
        assert!(matches!(args.string("missing"), Err(HandlerError::Fault(_))));
    }

    #[test]
    fn keeps_declaration_order() {
        let args = sample();
        assert_eq!(args.positional(1), Some(&ArgValue::from("hello")));
        let names = args.iter().map(|(name, _)| name).collect::<Vec<_>>();
        assert_eq!(names, vec!["a", "text", "numbers"]);
    }

    #[tokio::test]
    async fn sync_handler_ignores_channel() {
        let handler = sync_handler(|args| Ok(ArgValue::from(args.string("text")?.len() as i64)));
        let result = handler.call(sample(), ProgressChannel::detached()).await;
        assert_eq!(result, Ok(ArgValue::Integer(5)));
    }
}
