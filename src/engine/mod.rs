//! Capability execution engine: registry, validation, dispatch and progress.

pub mod dispatcher;
pub mod handler;
pub mod progress;
pub mod registry;
pub mod signature;
pub mod template;
pub mod validator;

pub use dispatcher::{
    Dispatcher, InvocationContext, InvocationRequest, InvocationResponse, InvocationState,
    DEFAULT_MAX_CONCURRENCY,
};
pub use handler::{
    handler_fn, sync_handler, Arguments, FnHandler, Handler, HandlerError, HandlerResult,
    SyncHandler,
};
pub use progress::{
    CancellationToken, LogLevel, NullSink, ProgressChannel, ProgressEvent, ProgressSink,
    TracingSink,
};
pub use registry::{Category, Registration, Registry, Resolved};
pub use signature::{ArgValue, HandlerDescriptor, ParamType, ParameterSpec};
pub use template::UriTemplate;
pub use validator::validate;
