//! Stream Parser (spec.md §4.11): incremental NDJSON event assembler.
//!
//! Consumes one JSON-decoded event at a time (as emitted by the subprocess
//! CLI protocol, spec.md §6.2) and accumulates text/thinking/tool-use
//! content blocks for the current assistant turn. Never panics on malformed
//! inner structures; unknown block types and missing fields are dropped
//! silently, matching the corpus's tolerant-decode style throughout
//! `examples/querymt-querymt/crates/querymt/src/chat/mod.rs`'s `StreamChunk`.

use conduit_core::model::{ThinkingBlock, Usage};
use serde_json::Value;

/// A tool-use block as emitted by the model, before pre-flight authorization
/// or hooks have run (spec.md §4.2 step 3). The Tool Loop Kernel turns these
/// into full `ToolUse` records once hook/result information is known.
#[derive(Debug, Clone, PartialEq)]
pub struct RawToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

#[derive(Debug, Clone, Default)]
struct ThinkingAccumulator {
    text: String,
    signature: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StreamParser {
    text: String,
    sealed_thinking: Vec<ThinkingBlock>,
    current_thinking: Option<ThinkingAccumulator>,
    tool_calls: Vec<RawToolCall>,
    usage: Usage,
    session_id: Option<String>,
    model: Option<String>,
}

/// Immutable snapshot of everything accumulated for the current turn
/// (spec.md §4.11 `finalize()`).
#[derive(Debug, Clone, Default)]
pub struct StreamSnapshot {
    pub text: String,
    pub thinking: Vec<ThinkingBlock>,
    pub tool_calls: Vec<RawToolCall>,
    pub usage: Usage,
    pub session_id: Option<String>,
    pub model: Option<String>,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears accumulators to start a new turn (spec.md §4.11 `reset()`).
    /// `session_id` is intentionally NOT cleared by the owning Transport;
    /// callers that want a truly blank parser construct a fresh one.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Handles one decoded `assistant` message's content array.
    pub fn handle_assistant_message(&mut self, message: &Value) {
        if let Some(model) = message.get("model").and_then(Value::as_str) {
            self.model = Some(model.to_string());
        }
        let Some(blocks) = message.get("content").and_then(Value::as_array) else {
            return;
        };
        for block in blocks {
            self.handle_content_block(block);
        }
    }

    fn handle_content_block(&mut self, block: &Value) {
        let Some(kind) = block.get("type").and_then(Value::as_str) else {
            return;
        };
        match kind {
            "text" => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    self.text.push_str(text);
                }
            }
            "thinking" => {
                let text = block.get("thinking").and_then(Value::as_str).unwrap_or("");
                let signature = block.get("signature").and_then(Value::as_str).map(str::to_string);
                let acc = self.current_thinking.get_or_insert_with(ThinkingAccumulator::default);
                acc.text.push_str(text);
                if signature.is_some() {
                    acc.signature = signature;
                }
            }
            "tool_use" => {
                let (Some(id), Some(name)) = (
                    block.get("id").and_then(Value::as_str),
                    block.get("name").and_then(Value::as_str),
                ) else {
                    return;
                };
                let input = block.get("input").cloned().unwrap_or(Value::Null);
                self.tool_calls.push(RawToolCall { id: id.to_string(), name: name.to_string(), input });
            }
            _ => {
                // unknown block types are dropped, not an error.
            }
        }
    }

    /// `result` events carry usage/session_id/cost totals (spec.md §6.2).
    /// Per spec.md §9 open question 3, this is called on ANY `result` event
    /// regardless of transport state; dispatching it to the waiting caller
    /// is the Transport's job, gated on being in `querying`.
    pub fn handle_result_event(&mut self, event: &Value) {
        if let Some(session_id) = event.get("session_id").and_then(Value::as_str) {
            self.session_id = Some(session_id.to_string());
        }
        if let Some(usage) = event.get("usage") {
            self.usage.input_tokens = usage.get("input_tokens").and_then(Value::as_u64).unwrap_or(0);
            self.usage.output_tokens = usage.get("output_tokens").and_then(Value::as_u64).unwrap_or(0);
            self.usage.cache_read_tokens = usage.get("cache_read_tokens").and_then(Value::as_u64);
            self.usage.cache_creation_tokens = usage.get("cache_creation_tokens").and_then(Value::as_u64);
            self.usage.total_tokens =
                self.usage.input_tokens + self.usage.output_tokens + self.usage.cache_read_tokens.unwrap_or(0);
        }
        if let Some(cost) = event.get("total_cost_usd").and_then(Value::as_f64) {
            self.usage.cost_usd = Some(cost);
        }
    }

    /// Seals the current thinking block on `content_block_stop`
    /// (spec.md §4.3: "if Stream Parser has accumulated thinking blocks,
    /// emit a synthetic `thinking_complete`"). Returns true if a block was
    /// sealed, telling the Transport whether to emit that synthetic event.
    pub fn seal_current_thinking_block(&mut self) -> bool {
        if let Some(acc) = self.current_thinking.take() {
            self.sealed_thinking.push(ThinkingBlock { text: acc.text, signature: acc.signature });
            true
        } else {
            false
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn finalize(&self) -> StreamSnapshot {
        let mut thinking = self.sealed_thinking.clone();
        if let Some(acc) = &self.current_thinking {
            thinking.push(ThinkingBlock { text: acc.text.clone(), signature: acc.signature.clone() });
        }
        StreamSnapshot {
            text: self.text.clone(),
            thinking,
            tool_calls: self.tool_calls.clone(),
            usage: self.usage,
            session_id: self.session_id.clone(),
            model: self.model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accumulates_text_across_multiple_blocks() {
        let mut parser = StreamParser::new();
        parser.handle_assistant_message(&json!({
            "content": [{"type": "text", "text": "hello "}, {"type": "text", "text": "world"}]
        }));
        assert_eq!(parser.finalize().text, "hello world");
    }

    #[test]
    fn unknown_block_type_is_dropped_not_panicking() {
        let mut parser = StreamParser::new();
        parser.handle_assistant_message(&json!({
            "content": [{"type": "redaction", "mystery": 1}, {"type": "text", "text": "ok"}]
        }));
        assert_eq!(parser.finalize().text, "ok");
    }

    #[test]
    fn tool_use_missing_id_is_dropped() {
        let mut parser = StreamParser::new();
        parser.handle_assistant_message(&json!({
            "content": [{"type": "tool_use", "name": "echo", "input": {}}]
        }));
        assert!(parser.finalize().tool_calls.is_empty());
    }

    #[test]
    fn seals_thinking_block_on_content_block_stop() {
        let mut parser = StreamParser::new();
        parser.handle_assistant_message(&json!({
            "content": [{"type": "thinking", "thinking": "reasoning...", "signature": "sig1"}]
        }));
        assert!(parser.seal_current_thinking_block());
        let snap = parser.finalize();
        assert_eq!(snap.thinking.len(), 1);
        assert_eq!(snap.thinking[0].signature.as_deref(), Some("sig1"));
    }

    #[test]
    fn result_event_captures_session_id_and_usage() {
        let mut parser = StreamParser::new();
        parser.handle_result_event(&json!({
            "session_id": "abc",
            "usage": {"input_tokens": 10, "output_tokens": 5},
            "total_cost_usd": 0.002
        }));
        let snap = parser.finalize();
        assert_eq!(snap.session_id.as_deref(), Some("abc"));
        assert_eq!(snap.usage.input_tokens, 10);
        assert_eq!(snap.usage.cost_usd, Some(0.002));
    }
}
