//! # Caplet Dispatch - Protocol Messages Between Package and Content Host
//!
//! The message surface of a hosted package: JSON request/response
//! envelopes, origin-based trust gating, built-in file commands, and a
//! registry for caller-provided command handlers.
//!
//! ## Architecture
//!
//! ```text
//!   content host ── inbound text ──> Dispatcher
//!                                        │ parse (drop unparseable)
//!                                        │ trust = is_trusted(origin)
//!                                        ├─ handler id ──> registry ──> CommandHandler
//!                                        └─ built-ins ──┬─ get-file  (trusted only)
//!                                                       ├─ list-file (trusted only)
//!                                                       └─ write-file (refused)
//!                                        │
//!   content host <── reply text ────────┘  (always well-formed, timeline attached)
//! ```
//!
//! ## Purpose
//!
//! 1. **Envelopes** - Lenient request parsing, responses that always echo
//!    `trace`/`cmd`/`handler` and carry request/completion timing.
//!
//! 2. **Trust Gate** - Built-in file commands are reachable only from the
//!    package's own synthetic origin, checked before any path resolution.
//!
//! 3. **Built-ins** - `get-file` and `list-file` over context-resolved
//!    paths with best-effort metadata; `write-file` is reserved.
//!
//! 4. **Handler Registry** - Caller-chosen ids mapped to async handlers;
//!    the only dynamic dispatch in the protocol.
//!
//! ## Security Notes
//!
//! - The trust verdict is computed once per request from the originating
//!   URI and passed down; handlers must not re-derive it.
//! - Failures never cross the protocol boundary as errors; the content
//!   host always receives `{error: true, message}` in a complete reply.

pub mod commands;
pub mod dispatcher;
pub mod envelope;

pub use commands::{EntryMetadata, GetFileArgs, ListFileArgs, INLINE_THRESHOLD};
pub use dispatcher::{CommandHandler, ContentHost, Dispatcher};
pub use envelope::{RequestEnvelope, ResponseEnvelope, Timeline};
