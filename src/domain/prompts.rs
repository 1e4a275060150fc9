//! Prompt templates exposed via Model Context Protocol

use crate::engine::{
    sync_handler, ArgValue, Arguments, HandlerDescriptor, HandlerResult, ParamType,
    ParameterSpec, Registry,
};
use crate::errors::RegistryError;

const GREETING_STYLES: [(&str, &str); 4] = [
    ("friendly", "Please write a warm, friendly greeting"),
    ("formal", "Please write a formal, professional greeting"),
    ("casual", "Please write a casual, relaxed greeting"),
    ("enthusiastic", "Please write an enthusiastic, energetic greeting"),
];

const EXPLANATION_LEVELS: [(&str, &str); 3] = [
    ("beginner", "like I'm 5 years old"),
    ("intermediate", "with some technical detail"),
    ("advanced", "with deep technical insights"),
];

/// Looks `key` up in `table`, falling back to the first entry.
fn pick(table: &[(&'static str, &'static str)], key: &str) -> &'static str {
    table
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .or_else(|| table.first())
        .map(|(_, text)| *text)
        .unwrap_or_default()
}

pub fn register(registry: &Registry) -> Result<(), RegistryError> {
    registry.register_prompt(
        HandlerDescriptor::new("greet_user", "Generate greeting prompt", ParamType::String)
            .param(ParameterSpec::required("name", ParamType::String))
            .param(
                ParameterSpec::optional("style", ParamType::String, "friendly")
                    .with_description("friendly, formal, casual or enthusiastic"),
            ),
        sync_handler(greet_user),
    )?;
    registry.register_prompt(
        HandlerDescriptor::new("code_review", "Generate code review prompt", ParamType::String)
            .param(ParameterSpec::required("language", ParamType::String))
            .param(ParameterSpec::required("code", ParamType::String)),
        sync_handler(code_review),
    )?;
    registry.register_prompt(
        HandlerDescriptor::new("explain_concept", "Generate explanation prompt", ParamType::String)
            .param(ParameterSpec::required("topic", ParamType::String))
            .param(
                ParameterSpec::optional("level", ParamType::String, "beginner")
                    .with_description("beginner, intermediate or advanced"),
            ),
        sync_handler(explain_concept),
    )?;
    registry.register_prompt(
        HandlerDescriptor::new("debug_assistant", "Generate debugging prompt", ParamType::String)
            .param(ParameterSpec::required("error", ParamType::String))
            .param(ParameterSpec::optional("context", ParamType::String, "")),
        sync_handler(debug_assistant),
    )?;
    Ok(())
}

fn greet_user(args: &Arguments) -> HandlerResult {
    let style = pick(&GREETING_STYLES, args.string("style")?);
    Ok(ArgValue::String(format!(
        "{style} for someone named {}.",
        args.string("name")?
    )))
}

fn code_review(args: &Arguments) -> HandlerResult {
    let language = args.string("language")?;
    let code = args.string("code")?;
    Ok(ArgValue::String(format!(
        "Please review this {language} code:

```{language}
{code}
```

Provide:
1. Code quality assessment
2. Potential bugs or issues
3. Performance considerations
4. Best practices recommendations
5. Refactoring suggestions
"
    )))
}

fn explain_concept(args: &Arguments) -> HandlerResult {
    let level = pick(&EXPLANATION_LEVELS, args.string("level")?);
    Ok(ArgValue::String(format!(
        "Explain {} {level}.",
        args.string("topic")?
    )))
}

fn debug_assistant(args: &Arguments) -> HandlerResult {
    let mut prompt = format!("I'm seeing this error: {}", args.string("error")?);
    let context = args.string("context")?;
    if !context.is_empty() {
        prompt.push_str(&format!("\n\nContext: {context}"));
    }
    prompt.push_str("\n\nPlease help me debug this issue.");
    Ok(ArgValue::String(prompt))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Map, Value};

    use super::*;
    use crate::engine::{Dispatcher, InvocationRequest};

    async fn render(name: &str, arguments: Value) -> String {
        let registry = Registry::new();
        register(&registry).expect("prompts register");
        let arguments: Map<String, Value> = arguments.as_object().cloned().expect("object literal");
        match Dispatcher::new(Arc::new(registry))
            .dispatch(InvocationRequest::prompt(name, arguments))
            .await
            .into_result()
        {
            Ok(ArgValue::String(text)) => text,
            other => panic!("prompt {name} failed: {other:?}"),
        }
    }

    #[tokio::test]
    async fn greet_user_uses_style_with_fallback() {
        assert_eq!(
            render("greet_user", json!({ "name": "Ada", "style": "formal" })).await,
            "Please write a formal, professional greeting for someone named Ada."
        );
        assert_eq!(
            render("greet_user", json!({ "name": "Ada", "style": "grumpy" })).await,
            "Please write a warm, friendly greeting for someone named Ada."
        );
    }

    #[tokio::test]
    async fn code_review_embeds_code_block() {
        let text = render(
            "code_review",
            json!({ "language": "rust", "code": "fn main() {}" }),
        )
        .await;

        assert!(text.starts_with("Please review this rust code:\n\n```rust\nfn main() {}\n```"));
        assert!(text.contains("5. Refactoring suggestions"));
    }

    #[tokio::test]
    async fn explain_concept_defaults_to_beginner() {
        assert_eq!(
            render("explain_concept", json!({ "topic": "lifetimes", "level": "advanced" })).await,
            "Explain lifetimes with deep technical insights."
        );
        assert_eq!(
            render("explain_concept", json!({ "topic": "lifetimes" })).await,
            "Explain lifetimes like I'm 5 years old."
        );
    }

    #[tokio::test]
    async fn debug_assistant_includes_context_only_when_given() {
        assert_eq!(
            render("debug_assistant", json!({ "error": "E0382" })).await,
            "I'm seeing this error: E0382\n\nPlease help me debug this issue."
        );
        assert_eq!(
            render("debug_assistant", json!({ "error": "E0382", "context": "in a loop" })).await,
            "I'm seeing this error: E0382\n\nContext: in a loop\n\nPlease help me debug this issue."
        );
    }
}
