//! Session Transport (spec.md §4.3): one long-lived subprocess worker
//! speaking NDJSON over stdio, modeled as a single-threaded actor owning a
//! mailbox (spec.md §5). No teacher crate has a direct analogue for this
//! component (the corpus's `session` modules are SQLite-backed conversation
//! persistence, not subprocess transports) — this is grounded instead on
//! spec.md §4.3/§6.2 directly, using the `tokio::process::Command` idiom
//! from `examples/querymt-querymt/crates/agent/src/tools/builtins/shell.rs`.

use crate::protocol::{SpawnOpts, StdinQuery};
use conduit_core::session::{QueryRef, SessionState};
use conduit_provider::StreamParser;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::{mpsc, oneshot};

const MAX_BUFFER_BYTES: usize = 50 * 1024 * 1024;
const RECONNECT_BACKOFF: [u64; 3] = [1, 2, 4];

#[derive(Debug, Clone)]
pub enum CloseReason {
    Normal,
    ProcessError { exit_code: i32, stderr: String },
}

#[derive(Debug, Clone)]
pub enum TransportEvent {
    Ready,
    Assistant { query_ref: QueryRef, message: Value },
    Result { query_ref: Option<QueryRef>, event: Value },
    ThinkingComplete { query_ref: QueryRef },
    BufferOverflow { query_ref: Option<QueryRef> },
    TransportClosed { reason: CloseReason },
    Reconnecting { attempt: u32 },
    ReconnectFailed { attempts: u32 },
}

#[derive(Debug)]
pub enum SendQueryError {
    NotReady,
}

enum Command {
    SendQuery { prompt: String, reply: oneshot::Sender<Result<QueryRef, SendQueryError>> },
    Close,
}

/// Caller-facing handle to a running Session Transport actor.
#[derive(Clone)]
pub struct TransportHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl TransportHandle {
    pub async fn send_query(&self, prompt: impl Into<String>) -> Result<QueryRef, SendQueryError> {
        let (reply, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::SendQuery { prompt: prompt.into(), reply }).await.is_err() {
            return Err(SendQueryError::NotReady);
        }
        rx.await.unwrap_or(Err(SendQueryError::NotReady))
    }

    pub async fn close(&self) {
        let _ = self.cmd_tx.send(Command::Close).await;
    }
}

/// Spawns the Session Transport actor and returns a handle plus its event
/// stream (spec.md §4.3 `start(opts) -> handle`).
pub fn spawn_transport(opts: SpawnOpts) -> (TransportHandle, mpsc::Receiver<TransportEvent>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (events_tx, events_rx) = mpsc::channel(256);
    let actor = TransportActor::new(opts);
    tokio::spawn(actor.run(cmd_rx, events_tx));
    (TransportHandle { cmd_tx }, events_rx)
}

struct TransportActor {
    opts: SpawnOpts,
    state: SessionState,
    session_id: Option<String>,
    next_query_ref: u64,
}

enum Internal {
    Bytes(Vec<u8>),
    ReaderClosed,
}

enum DriveOutcome {
    ClosedByCaller,
    ExitedCleanly,
    ExitedWithError { exit_code: i32, stderr: String },
}

impl TransportActor {
    fn new(opts: SpawnOpts) -> Self {
        Self { opts, state: SessionState::Disconnected, session_id: None, next_query_ref: 0 }
    }

    async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>, events_tx: mpsc::Sender<TransportEvent>) {
        self.state = SessionState::Connecting;
        let mut spawned = match self.connect().await {
            Ok(spawned) => spawned,
            Err(reason) => {
                let _ = events_tx
                    .send(TransportEvent::TransportClosed {
                        reason: CloseReason::ProcessError { exit_code: -1, stderr: reason },
                    })
                    .await;
                return;
            }
        };
        self.state = SessionState::Ready;
        let _ = events_tx.send(TransportEvent::Ready).await;

        loop {
            let outcome = self.drive_one_process(&mut spawned, &mut cmd_rx, &events_tx).await;
            match outcome {
                DriveOutcome::ClosedByCaller => {
                    let _ = events_tx.send(TransportEvent::TransportClosed { reason: CloseReason::Normal }).await;
                    self.state = SessionState::Disconnected;
                    return;
                }
                DriveOutcome::ExitedCleanly => {
                    let _ = events_tx.send(TransportEvent::TransportClosed { reason: CloseReason::Normal }).await;
                    self.state = SessionState::Disconnected;
                    return;
                }
                DriveOutcome::ExitedWithError { exit_code, stderr } => {
                    self.state = SessionState::Reconnecting;
                    let mut attempts = 0u32;
                    let mut reconnected = None;
                    for delay_secs in RECONNECT_BACKOFF {
                        attempts += 1;
                        tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                        let _ = events_tx.send(TransportEvent::Reconnecting { attempt: attempts }).await;
                        // Reconnect reuses the last session_id via --resume
                        // (spec.md §4.3) to preserve conversational continuity.
                        let mut resumed_opts = self.opts.clone();
                        resumed_opts.resume_session_id = self.session_id.clone();
                        let prior_opts = std::mem::replace(&mut self.opts, resumed_opts);
                        match self.connect().await {
                            Ok(new_spawned) => {
                                reconnected = Some(new_spawned);
                                break;
                            }
                            Err(_) => {
                                self.opts = prior_opts;
                            }
                        }
                    }
                    match reconnected {
                        Some(new_spawned) => {
                            spawned = new_spawned;
                            self.state = SessionState::Ready;
                            let _ = events_tx.send(TransportEvent::Ready).await;
                        }
                        None => {
                            tracing::warn!(exit_code, %stderr, "session transport reconnect exhausted");
                            let _ = events_tx.send(TransportEvent::ReconnectFailed { attempts }).await;
                            self.state = SessionState::Disconnected;
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn connect(&mut self) -> Result<Spawned, String> {
        let command = self.opts.resolve_command().ok_or_else(|| "cli not found".to_string())?;
        let mut cmd = tokio::process::Command::new(&command);
        cmd.args(self.opts.compose_args());
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        let mut child = cmd.spawn().map_err(|e| e.to_string())?;
        let stdin = child.stdin.take().ok_or("no stdin")?;
        let stdout = child.stdout.take().ok_or("no stdout")?;

        let (bytes_tx, bytes_rx) = mpsc::channel(64);
        tokio::spawn(read_loop(stdout, bytes_tx));

        Ok(Spawned { child, stdin, bytes_rx })
    }

    async fn drive_one_process(
        &mut self,
        spawned: &mut Spawned,
        cmd_rx: &mut mpsc::Receiver<Command>,
        events_tx: &mpsc::Sender<TransportEvent>,
    ) -> DriveOutcome {
        let mut buffer: Vec<u8> = Vec::new();
        let mut parser = StreamParser::new();
        let mut current_query_ref: Option<QueryRef> = None;
        let mut reader_closed = false;

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(Command::SendQuery { prompt, reply }) => {
                            if self.state != SessionState::Ready {
                                let _ = reply.send(Err(SendQueryError::NotReady));
                                continue;
                            }
                            let query_ref = QueryRef(self.next_query_ref);
                            self.next_query_ref += 1;
                            let line = StdinQuery::new(prompt, self.session_id.clone()).to_line();
                            if spawned.stdin.write_all(line.as_bytes()).await.is_err()
                                || spawned.stdin.write_all(b"\n").await.is_err()
                            {
                                let _ = reply.send(Err(SendQueryError::NotReady));
                                continue;
                            }
                            self.state = SessionState::Querying;
                            parser.reset();
                            current_query_ref = Some(query_ref.clone());
                            let _ = reply.send(Ok(query_ref));
                        }
                        Some(Command::Close) | None => {
                            let _ = spawned.child.start_kill();
                            return DriveOutcome::ClosedByCaller;
                        }
                    }
                }
                chunk = spawned.bytes_rx.recv(), if !reader_closed => {
                    match chunk {
                        Some(Internal::Bytes(bytes)) => {
                            buffer.extend_from_slice(&bytes);
                            if buffer.len() > MAX_BUFFER_BYTES {
                                let _ = events_tx.send(TransportEvent::BufferOverflow {
                                    query_ref: current_query_ref.clone(),
                                }).await;
                                buffer.clear();
                                continue;
                            }
                            self.process_buffer(
                                &mut buffer,
                                &mut parser,
                                &mut current_query_ref,
                                events_tx,
                            ).await;
                        }
                        Some(Internal::ReaderClosed) | None => {
                            reader_closed = true;
                        }
                    }
                }
                status = spawned.child.wait() => {
                    let status = match status {
                        Ok(status) => status,
                        Err(e) => {
                            return DriveOutcome::ExitedWithError { exit_code: -1, stderr: e.to_string() };
                        }
                    };
                    if let Some(query_ref) = current_query_ref.take() {
                        tracing::debug!(?query_ref, "pending query failed by process exit");
                    }
                    if status.success() {
                        return DriveOutcome::ExitedCleanly;
                    }
                    return DriveOutcome::ExitedWithError {
                        exit_code: status.code().unwrap_or(-1),
                        stderr: String::new(),
                    };
                }
            }
        }
    }

    async fn process_buffer(
        &mut self,
        buffer: &mut Vec<u8>,
        parser: &mut StreamParser,
        current_query_ref: &mut Option<QueryRef>,
        events_tx: &mpsc::Sender<TransportEvent>,
    ) {
        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            let line = &line[..line.len() - 1];
            if line.is_empty() {
                continue;
            }
            let Ok(event) = serde_json::from_slice::<Value>(line) else {
                // decode errors are silently dropped (spec.md §4.3)
                continue;
            };
            self.handle_event(event, parser, current_query_ref, events_tx).await;
        }
    }

    async fn handle_event(
        &mut self,
        event: Value,
        parser: &mut StreamParser,
        current_query_ref: &mut Option<QueryRef>,
        events_tx: &mpsc::Sender<TransportEvent>,
    ) {
        let Some(kind) = event.get("type").and_then(Value::as_str) else {
            return;
        };

        // `session_id` is captured from any `result` event regardless of
        // state; dispatch to the caller happens only while `querying`
        // (spec.md §9, resolving the open question about capture timing).
        if self.state != SessionState::Querying {
            if kind == "result" {
                if let Some(sid) = event.get("session_id").and_then(Value::as_str) {
                    self.session_id = Some(sid.to_string());
                }
            }
            return;
        }
        match kind {
            "assistant" => {
                if let Some(message) = event.get("message") {
                    parser.handle_assistant_message(message);
                    if let Some(query_ref) = current_query_ref.clone() {
                        let _ = events_tx
                            .send(TransportEvent::Assistant { query_ref, message: message.clone() })
                            .await;
                    }
                }
            }
            "result" => {
                parser.handle_result_event(&event);
                self.session_id = parser.session_id().map(str::to_string);
                let query_ref = current_query_ref.take();
                let _ = events_tx.send(TransportEvent::Result { query_ref, event }).await;
                self.state = SessionState::Ready;
            }
            "stream_event" => {
                let is_block_stop = event
                    .get("event")
                    .and_then(|e| e.get("type"))
                    .and_then(Value::as_str)
                    == Some("content_block_stop");
                if is_block_stop && parser.seal_current_thinking_block() {
                    if let Some(query_ref) = current_query_ref.clone() {
                        let _ = events_tx.send(TransportEvent::ThinkingComplete { query_ref }).await;
                    }
                }
            }
            _ => {}
        }
    }
}

struct Spawned {
    child: Child,
    stdin: ChildStdin,
    bytes_rx: mpsc::Receiver<Internal>,
}

async fn read_loop(mut stdout: ChildStdout, tx: mpsc::Sender<Internal>) {
    let mut chunk = [0u8; 8192];
    loop {
        match stdout.read(&mut chunk).await {
            Ok(0) => {
                let _ = tx.send(Internal::ReaderClosed).await;
                return;
            }
            Ok(n) => {
                if tx.send(Internal::Bytes(chunk[..n].to_vec())).await.is_err() {
                    return;
                }
            }
            Err(_) => {
                let _ = tx.send(Internal::ReaderClosed).await;
                return;
            }
        }
    }
}
