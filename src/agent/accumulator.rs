//! Reassembly of streamed tool-call fragments.

use std::collections::BTreeMap;

use crate::types::{StreamEvent, ToolCallDelta, ToolInvocation};

use super::partial_json::streaming_preview;

#[derive(Debug, Default)]
struct Slot {
    id: String,
    name: String,
    arguments: String,
}

/// Accumulates assistant text and tool-call deltas over one streamed turn.
///
/// Slots are keyed by the delta index and created on first sight, so indices
/// may arrive sparse or out of order. Finished calls come out in index order.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    text: String,
    slots: BTreeMap<usize, Slot>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Merge one fragment. Returns a preview when argument text arrived and
    /// the tool's preview field is non-empty.
    pub fn push_delta(&mut self, delta: ToolCallDelta) -> Option<StreamEvent> {
        let slot = self.slots.entry(delta.index).or_default();
        if let Some(id) = delta.id {
            slot.id = id;
        }
        if let Some(name) = delta.name {
            slot.name = name;
        }
        let fragment = delta.arguments?;
        slot.arguments.push_str(&fragment);

        streaming_preview(&slot.name, &slot.arguments).map(|preview| StreamEvent {
            tool_name: slot.name.clone(),
            content: preview.content,
            file_path: preview.file_path,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Accumulated text (if any) and the completed invocations.
    pub fn finish(self) -> (Option<String>, Vec<ToolInvocation>) {
        let text = (!self.text.is_empty()).then_some(self.text);
        let calls = self
            .slots
            .into_values()
            .map(|slot| ToolInvocation {
                id: slot.id,
                name: slot.name,
                raw_arguments: slot.arguments,
            })
            .collect();
        (text, calls)
    }
}
