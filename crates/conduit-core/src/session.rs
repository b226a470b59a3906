//! Session identity and state machine data types (spec.md §3, §4.3).
//!
//! This module only holds the shared vocabulary; the state machine's
//! behavior (transitions, reconnect, buffering) lives in `conduit-session`
//! so that crate can own the mutable transport actor without conduit-core
//! depending on an async runtime.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Ready,
    Querying,
    Reconnecting,
}

/// A locally generated opaque tag correlating one caller invocation with its
/// stream of events (GLOSSARY: Query ref).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryRef(pub u64);

/// Pool-local handle identifying one Session entry, distinct from the
/// provider-issued `session_id` string (spec.md §3 Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionRef(pub u64);
