//! Progress sink that turns invocation events into MCP notifications
//!
//! Used by transports that can push server-initiated messages (stdio). Events
//! are handed to an unbounded queue drained by the transport's writer, so
//! delivery never blocks the emitting handler.

use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::engine::{ProgressEvent, ProgressSink};
use crate::mcp::rpc::json_rpc_notification;

pub const PROGRESS_METHOD: &str = "notifications/progress";
pub const MESSAGE_METHOD: &str = "notifications/message";
const LOGGER_NAME: &str = "capability";

pub struct NotificationSink {
    outbound: UnboundedSender<Value>,
    progress_token: Option<Value>,
}

impl NotificationSink {
    pub fn new(outbound: UnboundedSender<Value>, progress_token: Option<Value>) -> Self {
        Self {
            outbound,
            progress_token,
        }
    }

    fn send(&self, invocation_id: u64, message: Value) {
        if self.outbound.send(message).is_err() {
            debug!(invocation_id, "notification dropped; transport writer has stopped");
        }
    }
}

impl ProgressSink for NotificationSink {
    fn deliver(&self, invocation_id: u64, event: ProgressEvent) {
        match event {
            ProgressEvent::Progress {
                fraction,
                total,
                message,
            } => {
                let Some(token) = &self.progress_token else {
                    debug!(invocation_id, fraction, "no progress token; progress not forwarded");
                    return;
                };
                self.send(
                    invocation_id,
                    json_rpc_notification(
                        PROGRESS_METHOD,
                        json!({
                            "progressToken": token,
                            "progress": fraction,
                            "total": total,
                            "message": message,
                        }),
                    ),
                );
            }
            ProgressEvent::Log { level, message } => self.send(
                invocation_id,
                json_rpc_notification(
                    MESSAGE_METHOD,
                    json!({
                        "level": level.as_str(),
                        "logger": LOGGER_NAME,
                        "data": message,
                    }),
                ),
            ),
        }
    }
}

/// Reads `_meta.progressToken` from request params.
pub fn progress_token(params: Option<&Value>) -> Option<Value> {
    params
        .and_then(|params| params.get("_meta"))
        .and_then(|meta| meta.get("progressToken"))
        .filter(|token| token.is_string() || token.is_i64() || token.is_u64())
        .cloned()
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::engine::LogLevel;

    #[test]
    fn progress_carries_token() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = NotificationSink::new(tx, Some(json!("tok-1")));

        sink.deliver(
            1,
            ProgressEvent::Progress {
                fraction: 0.5,
                total: 1.0,
                message: "Step 1/2".to_string(),
            },
        );

        let notification = rx.try_recv().expect("progress notification");
        assert_eq!(notification["method"], json!(PROGRESS_METHOD));
        assert_eq!(notification["params"]["progressToken"], json!("tok-1"));
        assert_eq!(notification["params"]["progress"], json!(0.5));
        assert_eq!(notification["params"]["message"], json!("Step 1/2"));
    }

    #[test]
    fn progress_without_token_is_not_sent_but_logs_are() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = NotificationSink::new(tx, None);

        sink.deliver(
            1,
            ProgressEvent::Progress {
                fraction: 1.0,
                total: 1.0,
                message: "done".to_string(),
            },
        );
        sink.deliver(
            1,
            ProgressEvent::Log {
                level: LogLevel::Warning,
                message: "careful".to_string(),
            },
        );

        let notification = rx.try_recv().expect("log notification");
        assert_eq!(notification["method"], json!(MESSAGE_METHOD));
        assert_eq!(notification["params"]["level"], json!("warning"));
        assert_eq!(notification["params"]["data"], json!("careful"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn extracts_progress_token_from_meta() {
        let params = json!({ "name": "add", "_meta": { "progressToken": 7 } });
        assert_eq!(progress_token(Some(&params)), Some(json!(7)));
        assert_eq!(progress_token(Some(&json!({ "name": "add" }))), None);
        assert_eq!(
            progress_token(Some(&json!({ "_meta": { "progressToken": [1] } }))),
            None
        );
    }
}
