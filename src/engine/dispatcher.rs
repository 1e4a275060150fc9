//! Dispatcher: resolve, validate, execute, package
//!
//! Every invocation walks `Received → Resolved → Validated → Executing →
//! Completed | Failed`. Handlers run on their own tokio task so a panic or a
//! long suspension in one invocation never affects another.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use serde_json::{Map, Value};
use tokio::{
    sync::Semaphore,
    task::{JoinError, JoinHandle},
};
use tracing::{debug, error, warn};

use crate::engine::{
    handler::{HandlerError, HandlerResult},
    progress::{CancellationToken, ProgressChannel, ProgressSink, TracingSink},
    registry::{Category, Registry},
    signature::{ArgValue, HandlerDescriptor},
    validator::validate,
};
use crate::errors::InvocationError;

pub const DEFAULT_MAX_CONCURRENCY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    pub category: Category,
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl InvocationRequest {
    pub fn new(category: Category, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            category,
            name: name.into(),
            arguments,
        }
    }

    pub fn tool(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self::new(Category::Tool, name, arguments)
    }

    /// Resource reads carry no explicit arguments; placeholders bound from the
    /// URI become the argument bag.
    pub fn resource(uri: impl Into<String>) -> Self {
        Self::new(Category::Resource, uri, Map::new())
    }

    pub fn prompt(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self::new(Category::Prompt, name, arguments)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResponse {
    Success(ArgValue),
    Failure(InvocationError),
}

impl InvocationResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn into_result(self) -> Result<ArgValue, InvocationError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(error) => Err(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Received,
    Resolved,
    Validated,
    Executing,
    Completed,
    Failed,
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Received => "received",
            Self::Resolved => "resolved",
            Self::Validated => "validated",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Per-call wiring supplied by the transport.
#[derive(Clone, Default)]
pub struct InvocationContext {
    pub sink: Option<Arc<dyn ProgressSink>>,
    pub cancel: CancellationToken,
}

impl InvocationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    default_sink: Arc<dyn ProgressSink>,
    permits: Arc<Semaphore>,
    next_invocation_id: AtomicU64,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            default_sink: Arc::new(TracingSink),
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENCY)),
            next_invocation_id: AtomicU64::new(1),
        }
    }

    pub fn with_default_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.default_sink = sink;
        self
    }

    /// Bounds how many handlers execute at once. Zero is treated as one.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(limit.max(1)));
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub async fn dispatch(&self, request: InvocationRequest) -> InvocationResponse {
        self.dispatch_with(request, InvocationContext::new()).await
    }

    pub async fn dispatch_with(
        &self,
        request: InvocationRequest,
        context: InvocationContext,
    ) -> InvocationResponse {
        let invocation_id = self.next_invocation_id.fetch_add(1, Ordering::Relaxed);
        let InvocationRequest {
            category,
            name,
            mut arguments,
        } = request;
        trace_state(invocation_id, category, &name, InvocationState::Received);

        let resolved = match self.registry.resolve(category, &name) {
            Ok(resolved) => resolved,
            Err(err) => return failed(invocation_id, category, &name, err),
        };
        trace_state(invocation_id, category, &name, InvocationState::Resolved);

        for (placeholder, value) in &resolved.bindings {
            arguments.insert(placeholder.clone(), Value::String(value.clone()));
        }

        let descriptor = resolved.descriptor().clone();
        let args = match validate(&descriptor.parameters, &arguments) {
            Ok(args) => args,
            Err(err) => return failed(invocation_id, category, &name, err.into()),
        };
        trace_state(invocation_id, category, &name, InvocationState::Validated);

        let cancel = context.cancel;
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return failed(invocation_id, category, &name, InvocationError::Cancelled);
            }
            permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(err) => {
                    error!(invocation_id, error = %err, "concurrency limiter closed");
                    return failed(invocation_id, category, &name, InvocationError::Internal);
                }
            },
        };

        let sink = context
            .sink
            .unwrap_or_else(|| Arc::clone(&self.default_sink));
        let channel = ProgressChannel::open(invocation_id, sink, cancel.clone());
        let handler = resolved.entry.handler();
        let handler_channel = channel.clone();
        trace_state(invocation_id, category, &name, InvocationState::Executing);

        let mut execution = Execution {
            task: tokio::spawn(async move {
                let _permit = permit;
                handler.call(args, handler_channel).await
            }),
            channel,
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(InvocationError::Cancelled),
            joined = &mut execution.task => settle(invocation_id, &descriptor, joined),
        };
        drop(execution);

        match outcome {
            Ok(value) => {
                trace_state(invocation_id, category, &name, InvocationState::Completed);
                InvocationResponse::Success(value)
            }
            Err(err) => failed(invocation_id, category, &name, err),
        }
    }
}

/// A running handler task and its channel. Dropping it, including when the
/// caller drops the dispatch future, aborts the task and closes the channel.
struct Execution {
    task: JoinHandle<HandlerResult>,
    channel: ProgressChannel,
}

impl Drop for Execution {
    fn drop(&mut self) {
        self.channel.close();
        self.task.abort();
    }
}

/// Classifies what the handler task produced.
fn settle(
    invocation_id: u64,
    descriptor: &HandlerDescriptor,
    joined: Result<HandlerResult, JoinError>,
) -> Result<ArgValue, InvocationError> {
    match joined {
        Ok(Ok(value)) if descriptor.returns.accepts(&value) => Ok(value),
        Ok(Ok(value)) => {
            error!(
                invocation_id,
                handler = %descriptor.name,
                declared = %descriptor.returns,
                returned = %value.to_text(),
                "handler returned a value that does not match its declared type"
            );
            Err(InvocationError::Internal)
        }
        Ok(Err(HandlerError::Domain(message))) => Err(InvocationError::Domain(message)),
        Ok(Err(HandlerError::Fault(detail))) => {
            error!(invocation_id, handler = %descriptor.name, error = %detail, "handler fault");
            Err(InvocationError::Internal)
        }
        Err(join_error) if join_error.is_panic() => {
            error!(invocation_id, handler = %descriptor.name, error = %join_error, "handler panicked");
            Err(InvocationError::Internal)
        }
        Err(_) => Err(InvocationError::Cancelled),
    }
}

fn trace_state(invocation_id: u64, category: Category, name: &str, state: InvocationState) {
    debug!(invocation_id, category = %category, name = %name, state = %state, "invocation transition");
}

fn failed(
    invocation_id: u64,
    category: Category,
    name: &str,
    err: InvocationError,
) -> InvocationResponse {
    match &err {
        InvocationError::Internal => {}
        InvocationError::Cancelled => {
            warn!(invocation_id, category = %category, name = %name, "invocation cancelled")
        }
        other => debug!(
            invocation_id,
            category = %category,
            name = %name,
            kind = other.kind().as_str(),
            error = %other,
            "invocation rejected"
        ),
    }
    trace_state(invocation_id, category, name, InvocationState::Failed);
    InvocationResponse::Failure(err)
}
