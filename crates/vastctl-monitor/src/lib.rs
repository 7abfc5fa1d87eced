//! vastctl Monitor
//!
//! Watches a freshly rented instance until ComfyUI is up. Each round looks
//! the instance up through the Vast.ai API, runs [`STATUS_SCRIPT`] over SSH
//! and turns its output into a [`StatusReport`].

mod error;
mod monitor;
mod probe;
mod script;
mod status;

pub use error::MonitorError;
pub use monitor::{Monitor, MonitorEvent, MonitorOutcome, ReportSink};
pub use probe::{InstanceSource, SshStatusProbe, StatusProbe};
pub use script::STATUS_SCRIPT;
pub use status::{InstanceStatus, StatusReport, parse_status_output};
