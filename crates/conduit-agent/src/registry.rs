//! Local tool registry: `name -> ToolDescriptor`, grounded on
//! `examples/querymt-querymt/crates/agent/src/tools/registry.rs`.
//! Duplicate tool names in the descriptor list: last one wins (spec.md §4.2
//! edge case).

use conduit_core::model::ToolDescriptor;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    pub fn from_descriptors(descriptors: Vec<ToolDescriptor>) -> Self {
        let mut tools = HashMap::new();
        for tool in descriptors {
            tools.insert(tool.name.clone(), tool);
        }
        Self { tools }
    }

    pub fn find(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
