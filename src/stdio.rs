//! Stdio transport: newline-delimited JSON-RPC over stdin/stdout
//!
//! Each request runs as its own task so a slow handler never blocks the read
//! loop. Responses and notifications share one writer task, so frames are
//! never interleaved on the output stream.

use std::io;

use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinSet,
};
use tracing::{debug, error, info, warn};

use crate::mcp::{
    inflight::InFlightRequests,
    rpc::json_rpc_error,
    server::{handle_json_rpc_value, handle_notification},
};
use crate::AppState;

const PARSE_ERROR: i32 = -32700;
const INVALID_REQUEST: i32 = -32600;

pub async fn serve_stdio(state: AppState) -> io::Result<()> {
    serve(state, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Runs the transport until `reader` reaches EOF and every running request has
/// been answered.
pub async fn serve<R, W>(state: AppState, reader: R, writer: W) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbound, queue) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_frames(queue, writer));
    let in_flight = InFlightRequests::new();
    let state = state
        .with_outbound(outbound.clone())
        .with_in_flight(in_flight.clone());

    let mut requests = JoinSet::new();
    let mut lines = BufReader::new(reader).lines();
    info!("stdio transport started");

    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let payload: Value = match serde_json::from_str(trimmed) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "unparseable frame");
                send(&outbound, json_rpc_error(None, PARSE_ERROR, "Parse error"));
                continue;
            }
        };

        match classify(&payload) {
            Frame::Notification(method) => {
                handle_notification(&state, &method, payload.get("params"));
            }
            Frame::Request(id) => {
                // Registered before the task starts so an immediate
                // cancellation for this id finds it.
                let Some(guard) = in_flight.register(&id) else {
                    send(&outbound, duplicate_id(id));
                    continue;
                };
                let state = state.clone();
                let outbound = outbound.clone();
                requests.spawn(async move {
                    let _guard = guard;
                    if let Some(response) = handle_json_rpc_value(&state, payload).await {
                        send(&outbound, response);
                    }
                });
            }
            Frame::Batch(items) => {
                let state = state.clone();
                let outbound = outbound.clone();
                let in_flight = in_flight.clone();
                requests.spawn(async move {
                    let mut responses = Vec::new();
                    for item in items {
                        let _guard = match item.get("id") {
                            Some(id) => match in_flight.register(id) {
                                Some(guard) => Some(guard),
                                None => {
                                    responses.push(duplicate_id(id.clone()));
                                    continue;
                                }
                            },
                            None => None,
                        };
                        if let Some(response) = handle_json_rpc_value(&state, item).await {
                            responses.push(response);
                        }
                    }
                    if !responses.is_empty() {
                        send(&outbound, Value::Array(responses));
                    }
                });
            }
            Frame::Invalid => {
                send(
                    &outbound,
                    json_rpc_error(payload.get("id").cloned(), INVALID_REQUEST, "Invalid Request"),
                );
            }
        }

        while let Some(finished) = requests.try_join_next() {
            log_join(finished);
        }
    }

    info!(pending = requests.len(), "EOF on stdin, draining requests");
    while let Some(finished) = requests.join_next().await {
        log_join(finished);
    }

    drop(state);
    drop(outbound);
    match writer_task.await {
        Ok(result) => result,
        Err(err) => Err(io::Error::new(io::ErrorKind::Other, err)),
    }
}

enum Frame {
    Request(Value),
    Notification(String),
    Batch(Vec<Value>),
    Invalid,
}

fn classify(payload: &Value) -> Frame {
    if let Some(items) = payload.as_array() {
        if items.is_empty() {
            return Frame::Invalid;
        }
        return Frame::Batch(items.clone());
    }

    let Some(object) = payload.as_object() else {
        return Frame::Invalid;
    };
    match (object.get("id"), object.get("method").and_then(Value::as_str)) {
        (Some(id), Some(_)) => Frame::Request(id.clone()),
        (None, Some(method)) => Frame::Notification(method.to_string()),
        _ => Frame::Invalid,
    }
}

fn duplicate_id(id: Value) -> Value {
    warn!(id = %id, "request id already in flight");
    json_rpc_error(Some(id), INVALID_REQUEST, "Request id already in flight")
}

fn send(outbound: &UnboundedSender<Value>, message: Value) {
    if outbound.send(message).is_err() {
        debug!("writer stopped; dropping outbound frame");
    }
}

fn log_join(finished: Result<(), tokio::task::JoinError>) {
    if let Err(err) = finished {
        error!(error = %err, "request task failed");
    }
}

async fn write_frames<W>(mut queue: UnboundedReceiver<Value>, mut writer: W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = queue.recv().await {
        let mut frame = serde_json::to_string(&message)?;
        frame.push('\n');
        if let Err(err) = writer.write_all(frame.as_bytes()).await {
            error!(error = %err, "failed to write frame");
            return Err(err);
        }
        writer.flush().await?;
    }
    writer.shutdown().await
}
