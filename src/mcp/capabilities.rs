//! MCP methods backed by the capability registry
//!
//! Listing methods describe what the registry holds; `tools/call`,
//! `resources/read` and `prompts/get` run through the dispatcher and package
//! its outcome as MCP results.

use std::sync::Arc;

use rust_mcp_sdk::schema::{
    CallToolRequestParams, CallToolResult, ContentBlock, ListResourcesResult,
    ReadResourceContent, ReadResourceRequestParams, ReadResourceResult, Resource, TextContent,
    TextResourceContents,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::engine::{
    ArgValue, Category, HandlerDescriptor, InvocationContext, InvocationRequest,
    InvocationResponse, Registry,
};
use crate::errors::InvocationError;
use crate::mcp::{
    notify::{progress_token, NotificationSink},
    rpc::{invocation_error_to_json_rpc, json_rpc_error, json_rpc_result, INVALID_PARAMS},
};
use crate::AppState;

const DEFAULT_RESOURCE_MIME_TYPE: &str = "text/plain";

#[derive(Debug, Deserialize)]
struct GetPromptParams {
    name: String,
    #[serde(default)]
    arguments: Map<String, Value>,
}

pub fn build_tools_list(registry: &Registry) -> Value {
    let tools = registry
        .tools()
        .iter()
        .map(|descriptor| {
            let mut tool = json!({
                "name": descriptor.name,
                "description": descriptor.description,
                "inputSchema": descriptor.input_schema(),
            });
            if let Some(title) = &descriptor.title {
                tool["title"] = json!(title);
            }
            tool
        })
        .collect::<Vec<_>>();

    json!({ "tools": tools })
}

pub fn build_resources_list(registry: &Registry) -> ListResourcesResult {
    let resources = registry
        .resources()
        .into_iter()
        .map(|descriptor| Resource {
            annotations: None,
            description: Some(descriptor.description.clone()),
            icons: vec![],
            meta: None,
            mime_type: Some(resource_mime_type(&descriptor)),
            name: descriptor.title.clone().unwrap_or_else(|| descriptor.name.clone()),
            size: None,
            title: None,
            uri: descriptor.name,
        })
        .collect();

    ListResourcesResult {
        meta: None,
        next_cursor: None,
        resources,
    }
}

pub fn build_resource_templates_list(registry: &Registry) -> Value {
    let templates = registry
        .resource_templates()
        .iter()
        .map(|descriptor| {
            json!({
                "uriTemplate": descriptor.name,
                "name": descriptor.title.as_deref().unwrap_or(&descriptor.name),
                "description": descriptor.description,
                "mimeType": resource_mime_type(descriptor),
            })
        })
        .collect::<Vec<_>>();

    json!({ "resourceTemplates": templates })
}

pub fn build_prompts_list(registry: &Registry) -> Value {
    let prompts = registry
        .prompts()
        .iter()
        .map(|descriptor| {
            let arguments = descriptor
                .parameters
                .iter()
                .map(|spec| {
                    let mut argument = json!({
                        "name": spec.name,
                        "required": spec.required,
                    });
                    if let Some(description) = &spec.description {
                        argument["description"] = json!(description);
                    }
                    argument
                })
                .collect::<Vec<_>>();

            json!({
                "name": descriptor.name,
                "description": descriptor.description,
                "arguments": arguments,
            })
        })
        .collect::<Vec<_>>();

    json!({ "prompts": prompts })
}

fn resource_mime_type(descriptor: &HandlerDescriptor) -> String {
    descriptor
        .mime_type
        .clone()
        .unwrap_or_else(|| DEFAULT_RESOURCE_MIME_TYPE.to_string())
}

/// Runs one invocation with the request's cancellation token and, when the
/// transport can push notifications, a sink that forwards progress and logs.
async fn invoke(
    state: &AppState,
    id: Option<&Value>,
    params: &Value,
    request: InvocationRequest,
) -> InvocationResponse {
    let guard = state
        .in_flight
        .as_ref()
        .zip(id)
        .map(|(in_flight, id)| in_flight.track(id));
    let mut context = InvocationContext::new();
    if let Some(guard) = &guard {
        context = context.with_cancellation(guard.token());
    }
    if let Some(outbound) = &state.outbound {
        context = context.with_sink(Arc::new(NotificationSink::new(
            outbound.clone(),
            progress_token(Some(params)),
        )));
    }

    state.dispatcher.dispatch_with(request, context).await
}

fn text_tool_result(text: String, is_error: Option<bool>, structured: Option<Map<String, Value>>) -> Value {
    serde_json::to_value(CallToolResult {
        content: vec![ContentBlock::from(TextContent::new(text, None, None))],
        is_error,
        meta: None,
        structured_content: structured,
    })
    .expect("call tool result serialization")
}

pub async fn handle_tools_call(state: &AppState, id: Option<Value>, params: Option<Value>) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
    };

    let tool_call: CallToolRequestParams = match serde_json::from_value(raw_params.clone()) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
    };

    let request = InvocationRequest::tool(tool_call.name, tool_call.arguments.unwrap_or_default());
    match invoke(state, id.as_ref(), &raw_params, request).await {
        InvocationResponse::Success(value) => json_rpc_result(
            id,
            text_tool_result(
                value.to_text(),
                None,
                Some(Map::from_iter([("result".to_string(), value.to_json())])),
            ),
        ),
        InvocationResponse::Failure(InvocationError::Domain(message)) => {
            json_rpc_result(id, text_tool_result(message, Some(true), None))
        }
        InvocationResponse::Failure(err) => invocation_error_to_json_rpc(id, Category::Tool, &err),
    }
}

pub async fn handle_resources_read(
    state: &AppState,
    id: Option<Value>,
    params: Option<Value>,
) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
    };

    let resource_read: ReadResourceRequestParams = match serde_json::from_value(raw_params.clone()) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
    };

    let uri = resource_read.uri;
    let request = InvocationRequest::resource(uri.clone());
    match invoke(state, id.as_ref(), &raw_params, request).await {
        InvocationResponse::Success(value) => {
            let mime_type = state
                .dispatcher
                .registry()
                .resolve(Category::Resource, &uri)
                .map(|resolved| resource_mime_type(resolved.descriptor()))
                .unwrap_or_else(|_| DEFAULT_RESOURCE_MIME_TYPE.to_string());

            let result = serde_json::to_value(ReadResourceResult {
                contents: vec![ReadResourceContent::from(TextResourceContents {
                    meta: None,
                    mime_type: Some(mime_type),
                    text: value.to_text(),
                    uri,
                })],
                meta: None,
            })
            .expect("read resource result serialization");

            json_rpc_result(id, result)
        }
        InvocationResponse::Failure(err) => {
            invocation_error_to_json_rpc(id, Category::Resource, &err)
        }
    }
}

pub async fn handle_prompts_get(state: &AppState, id: Option<Value>, params: Option<Value>) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
    };

    let prompt_get: GetPromptParams = match serde_json::from_value(raw_params.clone()) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
    };

    let description = state
        .dispatcher
        .registry()
        .resolve(Category::Prompt, &prompt_get.name)
        .map(|resolved| resolved.descriptor().description.clone())
        .ok();

    let request = InvocationRequest::prompt(prompt_get.name, prompt_get.arguments);
    match invoke(state, id.as_ref(), &raw_params, request).await {
        InvocationResponse::Success(value) => json_rpc_result(id, prompt_result(description, &value)),
        InvocationResponse::Failure(err) => invocation_error_to_json_rpc(id, Category::Prompt, &err),
    }
}

fn prompt_result(description: Option<String>, value: &ArgValue) -> Value {
    let mut result = json!({
        "messages": [{
            "role": "user",
            "content": { "type": "text", "text": value.to_text() }
        }]
    });
    if let Some(description) = description {
        result["description"] = json!(description);
    }
    result
}
