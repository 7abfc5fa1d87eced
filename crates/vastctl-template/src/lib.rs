//! vastctl Template
//!
//! A workflow graph carries a lot of UI state that an operator never wants
//! to edit. This crate flattens it into a template holding only the widget
//! values, in three levels of detail:
//!
//! - [`TemplateFormat::Minimal`]: the configurable part of each node.
//! - [`TemplateFormat::Detailed`]: grouped by node type, with instance
//!   creation settings.
//! - [`TemplateFormat::UserFriendly`]: one flat entry per node plus the
//!   detailed structure kept under `_internal` for reconstruction.
//!
//! Edited templates are applied back onto the original graph with
//! [`apply_template`].

mod apply;
mod clean;
mod error;
mod files;
mod format;

pub use apply::{ApplyReport, NodeChange, apply_template, template_workflow_name};
pub use clean::{
  CleanedNode, CleanedWorkflow, Configurable, InputWidget, WorkflowInfo, clean_workflow,
};
pub use error::TemplateError;
pub use files::{FileReferences, PLACEHOLDER_IMAGE, scan_file_references, substitute_text};
pub use format::{
  DetailedTemplate, InstanceConfig, InternalSection, NodeInstance, ParameterGroup, TemplateFormat,
  UserTemplate, analyze, format_detailed, user_friendly,
};
