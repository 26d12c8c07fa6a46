//! # Protocol Envelopes
//!
//! JSON envelopes exchanged with the content host. Requests are parsed
//! leniently (missing fields default to empty) so the dispatcher can
//! always answer with correlation fields intact; only structurally
//! unparseable text is dropped.
//!
//! Every response carries back `trace`, `cmd`, `handler`, and a timeline
//! (request timestamp, completion timestamp, processing duration) on
//! success and failure alike, so the content host can correlate and
//! measure latency even on error paths.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound message from the content host.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestEnvelope {
    /// Caller-chosen correlation id, echoed back verbatim.
    pub trace: String,

    /// Command name; built-ins are `list-file`, `get-file`, `write-file`.
    pub cmd: String,

    /// Registered handler id; empty routes to the built-ins.
    pub handler: String,

    /// Command arguments.
    pub data: Value,

    /// Free-form caller metadata, echoed back verbatim.
    pub info: Value,

    /// Free-form caller context, echoed back verbatim.
    pub context: Value,
}

impl RequestEnvelope {
    /// Parses inbound text. Returns `None` for unparseable input; the
    /// content host owns retry semantics for dropped messages.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Timing of one request, measured by the dispatcher.
#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    pub received_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl Timeline {
    /// Closes the timeline at the current instant.
    pub fn close(received_at: DateTime<Utc>) -> Self {
        let completed_at = Utc::now();
        Self {
            received_at,
            completed_at,
            duration_ms: (completed_at - received_at).num_milliseconds(),
        }
    }
}

/// Outbound reply to the content host.
///
/// Failures are encoded here, never raised across the protocol boundary:
/// the content host always gets a well-formed reply with `error: true`
/// and a message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub trace: String,
    pub cmd: String,
    pub handler: String,

    #[serde(skip_serializing_if = "Value::is_null")]
    pub data: Value,

    #[serde(skip_serializing_if = "Value::is_null")]
    pub info: Value,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,

    pub error: bool,

    #[serde(skip_serializing_if = "Value::is_null")]
    pub context: Value,

    pub timeline: Timeline,
}

impl ResponseEnvelope {
    /// A successful reply carrying `data`.
    pub fn success(request: &RequestEnvelope, data: Value, received_at: DateTime<Utc>) -> Self {
        Self::reply(request, data, String::new(), false, received_at)
    }

    /// A failed reply carrying a user-facing message.
    pub fn failure(request: &RequestEnvelope, message: &str, received_at: DateTime<Utc>) -> Self {
        Self::reply(request, Value::Null, message.to_string(), true, received_at)
    }

    fn reply(
        request: &RequestEnvelope,
        data: Value,
        message: String,
        error: bool,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            trace: request.trace.clone(),
            cmd: request.cmd.clone(),
            handler: request.handler.clone(),
            data,
            info: request.info.clone(),
            message,
            error,
            context: request.context.clone(),
            timeline: Timeline::close(received_at),
        }
    }

    /// Serializes the reply. Falls back to a minimal hand-built error
    /// document if the envelope itself will not serialize.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            serde_json::json!({
                "trace": self.trace,
                "cmd": self.cmd,
                "error": true,
                "message": "response serialization failed",
            })
            .to_string()
        })
    }
}
