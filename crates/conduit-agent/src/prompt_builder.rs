//! System-Prompt Builder (spec.md §4.10): deterministic composition of up to
//! seven sections under per-section token budgets and an 80,000-character
//! hard cap. Grounded in spirit on the section-assembly shape of
//! `examples/ConaryLabs-Mira/backend/src/prompt/mod.rs`'s
//! `UnifiedPromptBuilder`, rebuilt around this system's narrow external
//! memory-store reads (spec.md §6.3) rather than that crate's in-process
//! knowledge stores.

use conduit_core::external::MemoryStore;
use std::sync::Arc;

const CHARS_PER_TOKEN: usize = 4;
const HARD_CAP_CHARS: usize = 80_000;
const TRUNCATION_NOTICE: &str = "\n[... truncated ...]";

#[derive(Debug, Clone, Copy)]
pub enum SectionBudget {
    Fixed { tokens: usize },
    MinMax { min: usize, max: usize, pct: f64 },
}

impl SectionBudget {
    /// Resolves a budget to a token count, applying the percentage rule
    /// against the model's context window for `MinMax` (spec.md §4.10:
    /// `N = clamp(min, pct * context, max)`).
    pub fn resolve_tokens(&self, context_window: usize) -> usize {
        match *self {
            SectionBudget::Fixed { tokens } => tokens,
            SectionBudget::MinMax { min, max, pct } => {
                let target = (pct * context_window as f64) as usize;
                target.clamp(min, max)
            }
        }
    }

    pub fn resolve_chars(&self, context_window: usize) -> usize {
        self.resolve_tokens(context_window) * CHARS_PER_TOKEN
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Identity,
    SelfKnowledge,
    ToolGuidance,
    Goals,
    WorkingMemory,
    KnowledgeGraph,
    Timing,
}

impl SectionKind {
    /// Stable assembly order (spec.md §4.10).
    pub const ORDER: [SectionKind; 7] = [
        SectionKind::Identity,
        SectionKind::SelfKnowledge,
        SectionKind::ToolGuidance,
        SectionKind::Goals,
        SectionKind::WorkingMemory,
        SectionKind::KnowledgeGraph,
        SectionKind::Timing,
    ];
}

#[derive(Debug, Clone)]
pub struct SectionSpec {
    pub kind: SectionKind,
    pub budget: SectionBudget,
}

pub struct PromptBuilderConfig {
    pub sections: Vec<SectionSpec>,
    pub context_window: usize,
}

pub struct SystemPromptBuilder {
    config: PromptBuilderConfig,
    memory: Option<Arc<dyn MemoryStore>>,
}

impl SystemPromptBuilder {
    pub fn new(config: PromptBuilderConfig, memory: Option<Arc<dyn MemoryStore>>) -> Self {
        Self { config, memory }
    }

    pub async fn build(&self, agent_id: &str, identity: Option<&str>, tool_guidance: Option<&str>) -> String {
        let mut rendered = Vec::new();

        for spec in &self.config.sections {
            let content = match spec.kind {
                SectionKind::Identity => identity.map(str::to_string),
                SectionKind::ToolGuidance => tool_guidance.map(str::to_string),
                SectionKind::SelfKnowledge => self.read(|m| m.get_self_knowledge(agent_id)).await,
                SectionKind::Goals => self.read(|m| m.get_active_goals(agent_id)).await,
                SectionKind::WorkingMemory => self.read(|m| m.get_working_memory(agent_id)).await,
                SectionKind::KnowledgeGraph => self.read(|m| m.knowledge_graph_lookup(agent_id)).await,
                SectionKind::Timing => Some(chrono::Utc::now().to_rfc3339()),
            };

            // Null/empty sections are omitted entirely (spec.md §4.10).
            let Some(content) = content.filter(|c| !c.is_empty()) else {
                continue;
            };

            let max_chars = spec.budget.resolve_chars(self.config.context_window);
            let truncated = truncate_section(&content, max_chars);
            rendered.push(truncated);
        }

        let combined = rendered.join("\n\n");
        truncate_section(&combined, HARD_CAP_CHARS)
    }

    async fn read<F, Fut>(&self, f: F) -> Option<String>
    where
        F: FnOnce(Arc<dyn MemoryStore>) -> Fut,
        Fut: std::future::Future<Output = Option<String>>,
    {
        // External memory stores are eventually-consistent external
        // collaborators; an absent store just means the section is
        // skipped, never an error (spec.md §4.10, §5).
        let store = self.memory.clone()?;
        f(store).await
    }
}

/// A section (or the final combined prompt) exceeding its budget is
/// truncated to `max_chars - 40` and suffixed with a notice (spec.md
/// §4.10).
fn truncate_section(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let keep = max_chars.saturating_sub(TRUNCATION_NOTICE.len());
    let truncated: String = content.chars().take(keep).collect();
    format!("{truncated}{TRUNCATION_NOTICE}")
}
