//! Subprocess CLI protocol: argument composition and permission-mode flags
//! (spec.md §6.2, §6.4). Grounded on the `tokio::process::Command` usage in
//! `examples/querymt-querymt/crates/agent/src/tools/builtins/shell.rs`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    #[default]
    Default,
    AcceptEdits,
    Plan,
    Bypass,
}

impl PermissionMode {
    /// Mode-derived flags (spec.md §6.4). Caller-provided allowed/disallowed
    /// tool lists override these entirely rather than merge with them.
    fn mode_flags(self) -> Vec<String> {
        match self {
            PermissionMode::Default => vec![],
            PermissionMode::AcceptEdits => {
                vec!["--allowedTools".into(), "Edit,Write,NotebookEdit".into()]
            }
            PermissionMode::Plan => {
                vec!["--allowedTools".into(), "Read,Glob,Grep,WebFetch,WebSearch".into()]
            }
            PermissionMode::Bypass => vec!["--dangerously-skip-permissions".into()],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpawnOpts {
    /// Executable path; falls back to a fixed search list if `None`
    /// (spec.md §6.2: "Spawn executable found at configured path or a
    /// fixed search list").
    pub command: Option<String>,
    pub search_list: Vec<String>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub max_turns: Option<u32>,
    pub max_thinking_tokens: u32,
    pub permission_mode: PermissionMode,
    pub allowed_tools: Option<Vec<String>>,
    pub disallowed_tools: Option<Vec<String>>,
    pub resume_session_id: Option<String>,
}

impl SpawnOpts {
    /// Composes the full CLI argument vector (spec.md §6.2).
    pub fn compose_args(&self) -> Vec<String> {
        let mut args = vec![
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--input-format".to_string(),
            "stream-json".to_string(),
            "--include-partial-messages".to_string(),
            "--verbose".to_string(),
            "--max-thinking-tokens".to_string(),
            self.max_thinking_tokens.to_string(),
        ];
        if let Some(model) = &self.model {
            args.push("--model".into());
            args.push(model.clone());
        }
        if let Some(system_prompt) = &self.system_prompt {
            args.push("--system-prompt".into());
            args.push(system_prompt.clone());
        }
        if let Some(max_turns) = self.max_turns {
            args.push("--max-turns".into());
            args.push(max_turns.to_string());
        }
        if let Some(session_id) = &self.resume_session_id {
            args.push("--resume".into());
            args.push(session_id.clone());
        }
        // Caller-provided allowed/disallowed tools override mode-derived
        // flags entirely (spec.md §6.4).
        if let Some(allowed) = &self.allowed_tools {
            args.push("--allowedTools".into());
            args.push(allowed.join(","));
        } else if let Some(disallowed) = &self.disallowed_tools {
            args.push("--disallowedTools".into());
            args.push(disallowed.join(","));
        } else {
            args.extend(self.permission_mode.mode_flags());
        }
        args
    }

    /// Resolves the executable to spawn: configured path, else first
    /// existing entry in the search list.
    pub fn resolve_command(&self) -> Option<String> {
        if let Some(cmd) = &self.command {
            return Some(cmd.clone());
        }
        self.search_list
            .iter()
            .find(|candidate| std::path::Path::new(candidate).exists())
            .cloned()
    }
}

/// One line written to the subprocess's stdin (spec.md §6.2).
#[derive(Debug, Clone, Serialize)]
pub struct StdinQuery {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: StdinMessage,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StdinMessage {
    pub role: &'static str,
    pub content: String,
}

impl StdinQuery {
    pub fn new(prompt: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            kind: "user",
            message: StdinMessage { role: "user", content: prompt.into() },
            session_id,
        }
    }

    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_tools_override_permission_mode_flags() {
        let opts = SpawnOpts {
            permission_mode: PermissionMode::Bypass,
            allowed_tools: Some(vec!["Read".into()]),
            max_thinking_tokens: 1024,
            ..Default::default()
        };
        let args = opts.compose_args();
        assert!(args.windows(2).any(|w| w[0] == "--allowedTools" && w[1] == "Read"));
        assert!(!args.iter().any(|a| a == "--dangerously-skip-permissions"));
    }

    #[test]
    fn plan_mode_flags_present_by_default() {
        let opts = SpawnOpts { permission_mode: PermissionMode::Plan, max_thinking_tokens: 1024, ..Default::default() };
        let args = opts.compose_args();
        assert!(args.windows(2).any(|w| w[0] == "--allowedTools" && w[1] == "Read,Glob,Grep,WebFetch,WebSearch"));
    }

    #[test]
    fn resume_flag_present_when_session_id_set() {
        let opts = SpawnOpts {
            resume_session_id: Some("abc".into()),
            max_thinking_tokens: 1024,
            ..Default::default()
        };
        let args = opts.compose_args();
        assert!(args.windows(2).any(|w| w[0] == "--resume" && w[1] == "abc"));
    }
}
