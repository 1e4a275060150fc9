//! JSON-RPC protocol representations and formatting utilities
//!
//! Maps transport and invocation failures onto JSON-RPC error payloads.

use rust_mcp_sdk::schema::{
    JsonrpcErrorResponse, JsonrpcResultResponse, RequestId, Result as McpResult, RpcError,
};
use serde_json::{json, Value};

use crate::engine::Category;
use crate::errors::{AppError, InvocationError};

pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const DOMAIN_ERROR: i32 = -32000;
pub const RESOURCE_NOT_FOUND: i32 = -32002;
pub const REQUEST_CANCELLED: i32 = -32800;

pub fn is_json_rpc_error(value: &Value) -> bool {
    value.get("error").is_some()
}

pub fn app_error_to_json_rpc(id: Option<Value>, err: AppError) -> Value {
    match err {
        AppError::BadRequest { code, message } => json_rpc_error_with_data(
            id,
            INVALID_PARAMS,
            "Invalid params",
            Some(error_data(code, message, json!({}))),
        ),
    }
}

/// Error response for a failed invocation. Tool domain errors are not routed
/// here; they travel inside a successful `tools/call` result.
pub fn invocation_error_to_json_rpc(
    id: Option<Value>,
    category: Category,
    err: &InvocationError,
) -> Value {
    match err {
        InvocationError::NotFound { name, .. } => {
            let (code, message) = match category {
                Category::Tool => (INVALID_PARAMS, "Unknown tool"),
                Category::Resource => (RESOURCE_NOT_FOUND, "Resource not found"),
                Category::Prompt => (INVALID_PARAMS, "Unknown prompt"),
            };
            json_rpc_error_with_data(
                id,
                code,
                message,
                Some(error_data(
                    &format!("{}_not_found", category.as_str()),
                    &err.to_string(),
                    json!({ "name": name }),
                )),
            )
        }
        InvocationError::Validation(validation) => json_rpc_error_with_data(
            id,
            INVALID_PARAMS,
            "Invalid params",
            Some(error_data(
                validation.code(),
                &validation.to_string(),
                json!({
                    "parameter": validation.parameter,
                    "expected": validation.expected,
                    "reason": validation.reason.to_string(),
                }),
            )),
        ),
        InvocationError::Domain(message) => json_rpc_error_with_data(
            id,
            DOMAIN_ERROR,
            message,
            Some(error_data("domain_error", message, json!({}))),
        ),
        InvocationError::Internal => json_rpc_error(id, INTERNAL_ERROR, "Internal error"),
        InvocationError::Cancelled => json_rpc_error(id, REQUEST_CANCELLED, "Request cancelled"),
    }
}

fn error_data(code: &str, message: &str, details: Value) -> Value {
    json!({
        "code": code,
        "message": message,
        "details": details
    })
}

pub fn json_rpc_error(id: Option<Value>, code: i32, message: &str) -> Value {
    json_rpc_error_with_data(id, code, message, None)
}

pub fn json_rpc_error_with_data(
    id: Option<Value>,
    code: i32,
    message: &str,
    data: Option<Value>,
) -> Value {
    let response = JsonrpcErrorResponse::new(
        RpcError {
            code: i64::from(code),
            data,
            message: message.to_string(),
        },
        id.as_ref().and_then(value_to_request_id),
    );
    serde_json::to_value(response).expect("jsonrpc error response serialization")
}

pub fn json_rpc_result(id: Option<Value>, result: Value) -> Value {
    if let Some(request_id) = id.as_ref().and_then(value_to_request_id) {
        let extra = result.as_object().cloned();
        let response = JsonrpcResultResponse::new(request_id, McpResult { meta: None, extra });
        return serde_json::to_value(response).expect("jsonrpc result response serialization");
    }

    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

pub fn json_rpc_notification(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params
    })
}

pub fn value_to_request_id(value: &Value) -> Option<RequestId> {
    if let Some(string_id) = value.as_str() {
        return Some(RequestId::String(string_id.to_string()));
    }

    value.as_i64().map(RequestId::Integer)
}

pub fn request_id_to_value(id: RequestId) -> Value {
    match id {
        RequestId::String(value) => Value::String(value),
        RequestId::Integer(value) => Value::Number(value.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ValidationError, ValidationReason};

    #[test]
    fn validation_errors_carry_parameter_details() {
        let err = InvocationError::Validation(ValidationError {
            parameter: "a".to_string(),
            expected: "number".to_string(),
            reason: ValidationReason::TypeMismatch { found: "string" },
        });

        let response = invocation_error_to_json_rpc(Some(json!(4)), Category::Tool, &err);

        assert_eq!(response["id"], json!(4));
        assert_eq!(response["error"]["code"], json!(INVALID_PARAMS));
        assert_eq!(response["error"]["data"]["code"], json!("invalid_argument"));
        assert_eq!(response["error"]["data"]["details"]["parameter"], json!("a"));
        assert_eq!(response["error"]["data"]["details"]["expected"], json!("number"));
    }

    #[test]
    fn not_found_code_depends_on_category() {
        let tool = invocation_error_to_json_rpc(
            Some(json!(1)),
            Category::Tool,
            &InvocationError::not_found(Category::Tool, "nope"),
        );
        let resource = invocation_error_to_json_rpc(
            Some(json!(2)),
            Category::Resource,
            &InvocationError::not_found(Category::Resource, "x://y"),
        );

        assert_eq!(tool["error"]["code"], json!(INVALID_PARAMS));
        assert_eq!(tool["error"]["data"]["code"], json!("tool_not_found"));
        assert_eq!(resource["error"]["code"], json!(RESOURCE_NOT_FOUND));
        assert_eq!(resource["error"]["data"]["details"]["name"], json!("x://y"));
    }

    #[test]
    fn internal_errors_have_no_detail() {
        let response =
            invocation_error_to_json_rpc(Some(json!("a")), Category::Prompt, &InvocationError::Internal);

        assert_eq!(response["error"]["code"], json!(INTERNAL_ERROR));
        assert_eq!(response["error"]["message"], json!("Internal error"));
        assert!(response["error"]["data"].is_null());
    }

    #[test]
    fn domain_message_is_verbatim() {
        let response = invocation_error_to_json_rpc(
            Some(json!(9)),
            Category::Resource,
            &InvocationError::Domain("Cannot divide by zero".to_string()),
        );

        assert_eq!(response["error"]["code"], json!(DOMAIN_ERROR));
        assert_eq!(response["error"]["message"], json!("Cannot divide by zero"));
    }
}
