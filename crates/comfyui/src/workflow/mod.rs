//! Workflow graph construction and wire-format conversion.
//!
//! The engine executes workflows expressed as a dictionary of numbered
//! nodes, each with a `class_type` and an `inputs` map whose values are
//! either literals or `[node_id, output_index]` links.  [`WorkflowGraph`]
//! builds that shape incrementally; the per-kind modules assemble the
//! actual graphs.  Pure construction, no I/O.

mod audio;
mod image;
mod video;

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::Value;

use genstudio_core::generation::GenerationConfig;

/// A workflow graph under construction.
#[derive(Debug, Default)]
pub struct WorkflowGraph {
    nodes: BTreeMap<String, Value>,
    next_id: u32,
}

/// Handle to a node already added to a graph.  `output(n)` produces the
/// `[node_id, output_index]` link value the engine expects.
#[derive(Debug, Clone)]
pub struct NodeRef(String);

impl NodeRef {
    /// Link value pointing at this node's `index`-th output slot.
    pub fn output(&self, index: u32) -> Value {
        serde_json::json!([self.0, index])
    }

    /// The node's id within its graph.
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return a handle for linking.
    ///
    /// `inputs` must be a JSON object; literals and `NodeRef::output`
    /// links mix freely.
    pub fn add_node(&mut self, class_type: &str, inputs: Value) -> NodeRef {
        self.next_id += 1;
        let id = self.next_id.to_string();
        self.nodes.insert(
            id.clone(),
            serde_json::json!({
                "class_type": class_type,
                "inputs": inputs,
            }),
        );
        NodeRef(id)
    }

    /// Number of nodes added so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Convert to the engine's `/prompt` wire format.
    pub fn to_prompt_format(&self) -> Value {
        serde_json::json!(self.nodes)
    }
}

/// Build the workflow graph for a generation config, dispatching on kind.
pub fn build_workflow(config: &GenerationConfig) -> WorkflowGraph {
    match config {
        GenerationConfig::Audio(cfg) => audio::build(cfg),
        GenerationConfig::Image(cfg) => image::build(cfg),
        GenerationConfig::Video(cfg) => video::build(cfg),
    }
}

/// Resolve an explicit seed, or derive one from the clock.
pub(crate) fn seed_or_random(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| Utc::now().timestamp_nanos_opt().unwrap_or(0) as u64)
}
