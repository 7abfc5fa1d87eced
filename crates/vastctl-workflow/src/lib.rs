//! vastctl Workflow
//!
//! This crate contains the serializable types for ComfyUI workflows.
//! Two shapes of the same pipeline are modelled:
//!
//! - [`WorkflowGraph`]: the node/link document saved by the ComfyUI web UI.
//!   Widget values are stored positionally (or keyed, for some custom
//!   nodes) and edges are link tuples.
//! - [`ApiPrompt`]: the node-id keyed mapping accepted by the `/prompt`
//!   endpoint, with named inputs.
//!
//! Unknown keys in either shape are kept so a document can be written back
//! without losing UI state.

mod error;
mod graph;
mod link;
mod prompt;

pub use error::WorkflowError;
pub use graph::{GraphNode, NodeInput, WidgetRef, WidgetValues, WorkflowGraph};
pub use link::{Link, LinkIndex};
pub use prompt::{ApiNode, ApiPrompt};
