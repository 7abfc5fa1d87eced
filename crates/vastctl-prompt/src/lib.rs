//! Turns UI-format workflow graphs into API prompts and edits them.
//!
//! The conversion is best-effort: widget values are positional in the UI
//! format and have to be guessed onto named inputs, see [`map_widget_values`].

mod audit;
mod convert;
mod edit;
mod remap;
mod ui;

pub use audit::{AuditEntry, AuditHighlight, audit};
pub use convert::{graph_to_prompt, load_prompt};
pub use edit::{
  DEFAULT_IMAGE_NODE_ID, DEFAULT_PROMPT_NODE_ID, EditReport, FieldChange, PromptEdit, apply_edit,
};
pub use remap::map_widget_values;
pub use ui::write_back_ui;
