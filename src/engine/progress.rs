//! Progress/session channel for running invocations
//!
//! A handler receives a [`ProgressChannel`] bound to its invocation. Events flow
//! through it, in emission order, to a [`ProgressSink`] chosen by the transport.
//! Once the invocation ends the channel is closed and every further emission is
//! rejected with [`ChannelClosed`].

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};

use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::errors::ChannelClosed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Progress {
        fraction: f64,
        total: f64,
        message: String,
    },
    Log {
        level: LogLevel,
        message: String,
    },
}

/// Destination of progress events. Implementations must not block: they are
/// called while the emitting channel holds its ordering lock.
pub trait ProgressSink: Send + Sync {
    fn deliver(&self, invocation_id: u64, event: ProgressEvent);
}

/// Default sink: events become structured log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn deliver(&self, invocation_id: u64, event: ProgressEvent) {
        match event {
            ProgressEvent::Progress {
                fraction,
                total,
                message,
            } => info!(invocation_id, fraction, total, message = %message, "invocation progress"),
            ProgressEvent::Log {
                level: LogLevel::Debug,
                message,
            } => debug!(invocation_id, message = %message, "invocation log"),
            ProgressEvent::Log {
                level: LogLevel::Info,
                message,
            } => info!(invocation_id, message = %message, "invocation log"),
            ProgressEvent::Log {
                level: LogLevel::Warning,
                message,
            } => warn!(invocation_id, message = %message, "invocation log"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn deliver(&self, _invocation_id: u64, _event: ProgressEvent) {}
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cooperative cancellation flag shared between a transport and an invocation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    state: Arc<CancelState>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.state.cancelled.swap(true, Ordering::SeqCst) {
            self.state.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug)]
struct ChannelState {
    open: bool,
    last_fraction: f64,
}

struct ChannelInner {
    invocation_id: u64,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
    state: Mutex<ChannelState>,
}

/// Handle a running handler uses to report progress, log, and check for
/// cancellation.
#[derive(Clone)]
pub struct ProgressChannel {
    inner: Arc<ChannelInner>,
}

impl ProgressChannel {
    pub(crate) fn open(
        invocation_id: u64,
        sink: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                invocation_id,
                sink,
                cancel,
                state: Mutex::new(ChannelState {
                    open: true,
                    last_fraction: 0.0,
                }),
            }),
        }
    }

    /// An open channel that discards every event, for running handlers outside
    /// a dispatcher.
    pub fn detached() -> Self {
        Self::open(0, Arc::new(NullSink), CancellationToken::new())
    }

    pub fn invocation_id(&self) -> u64 {
        self.inner.invocation_id
    }

    /// Reports absolute progress `fraction` against `total`, the way MCP
    /// progress notifications carry it. With `total = 1.0` this is the plain
    /// `[0, 1]` fraction. A missing or non-positive `total` is treated as 1.0.
    /// Out-of-range values are clamped into `[0, total]`, a value below the
    /// previous one is raised to it, and non-finite values are dropped; none
    /// of these raise into the handler.
    pub fn report_progress(
        &self,
        fraction: f64,
        total: f64,
        message: impl Into<String>,
    ) -> Result<(), ChannelClosed> {
        let message = message.into();
        self.emit(|state| {
            if !fraction.is_finite() {
                warn!(
                    invocation_id = self.inner.invocation_id,
                    "dropping non-finite progress value"
                );
                return None;
            }

            let total = if total.is_finite() && total > 0.0 {
                total
            } else {
                1.0
            };
            let mut fraction = fraction.clamp(0.0, total);
            if fraction < state.last_fraction {
                warn!(
                    invocation_id = self.inner.invocation_id,
                    reported = fraction,
                    previous = state.last_fraction,
                    "progress went backwards; holding previous value"
                );
                fraction = state.last_fraction;
            }
            state.last_fraction = fraction;

            Some(ProgressEvent::Progress {
                fraction,
                total,
                message,
            })
        })
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) -> Result<(), ChannelClosed> {
        let message = message.into();
        self.emit(|_| Some(ProgressEvent::Log { level, message }))
    }

    pub fn debug(&self, message: impl Into<String>) -> Result<(), ChannelClosed> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: impl Into<String>) -> Result<(), ChannelClosed> {
        self.log(LogLevel::Info, message)
    }

    pub fn warning(&self, message: impl Into<String>) -> Result<(), ChannelClosed> {
        self.log(LogLevel::Warning, message)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.inner.cancel.cancelled().await
    }

    pub fn is_closed(&self) -> bool {
        !self.lock().open
    }

    /// After this returns no event of this invocation reaches the sink.
    pub(crate) fn close(&self) {
        self.lock().open = false;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChannelState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn emit<F>(&self, build: F) -> Result<(), ChannelClosed>
    where
        F: FnOnce(&mut ChannelState) -> Option<ProgressEvent>,
    {
        let mut state = self.lock();
        if !state.open || self.inner.cancel.is_cancelled() {
            return Err(ChannelClosed);
        }

        if let Some(event) = build(&mut state) {
            self.inner.sink.deliver(self.inner.invocation_id, event);
        }
        Ok(())
    }
}

/// Sink that keeps every event, for tests.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<(u64, ProgressEvent)>>,
}

#[cfg(test)]
impl RecordingSink {
    pub(crate) fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub(crate) fn fractions(&self) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::Progress { fraction, .. } => Some(fraction),
                ProgressEvent::Log { .. } => None,
            })
            .collect()
    }
}

#[cfg(test)]
impl ProgressSink for RecordingSink {
    fn deliver(&self, invocation_id: u64, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((invocation_id, event));
    }
}
