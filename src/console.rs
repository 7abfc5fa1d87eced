use vastctl_comfy::{QueueStatus, RunSummary};
use vastctl_monitor::{MonitorEvent, ReportSink};
use vastctl_prompt::{AuditHighlight, FieldChange};

pub const RULE: &str = "============================================================";

/// Prints monitor progress to stdout.
pub struct ConsoleSink {
  pub instance_id: String,
}

impl ReportSink for ConsoleSink {
  fn report(&self, event: &MonitorEvent) {
    match event {
      MonitorEvent::InstanceLookupFailed(err) => {
        println!("❌ Could not fetch instance data ({}), retrying...", err)
      }
      MonitorEvent::InstanceNotFound => {
        println!("❌ Instance {} not found in instances list", self.instance_id)
      }
      MonitorEvent::WaitingForSsh(reason) => {
        println!("⏳ Waiting for instance to be ready for SSH: {}", reason)
      }
      MonitorEvent::Connecting(endpoint) => {
        println!("\n🔗 Connecting to {}:{}", endpoint.host, endpoint.port)
      }
      MonitorEvent::UnexpectedOutput(output) => {
        println!("❌ Unexpected script output: {}", output)
      }
      MonitorEvent::Status(report) => println!("\n{}", report.render(&self.instance_id)),
      MonitorEvent::Sleeping(interval) => {
        println!("\n⏳ Waiting {}s before next check...", interval.as_secs())
      }
    }
  }
}

fn print_field_change(label: &str, change: &FieldChange) {
  match change {
    FieldChange::Updated { node_id, old, new } => {
      println!("✅ Updated {} in node {}", label, node_id);
      println!("   Old: {}", old);
      println!("   New: {}", new);
    }
    FieldChange::NodeMissing { node_id, available } => {
      println!("⚠️ {} node {} not found", label, node_id);
      println!("   Available nodes: {}", available.join(", "));
    }
  }
}

pub fn print_run_summary(summary: &RunSummary) {
  print_field_change("prompt", &summary.edit.prompt);
  print_field_change("image", &summary.edit.image);

  println!("\n{}", RULE);
  println!("🔍 WORKFLOW AUDIT");
  println!("{}", RULE);
  if summary.audit.is_empty() {
    println!("⚠️ No changes detected in workflow");
  }
  for entry in &summary.audit {
    println!(
      "📝 Node {} ({}) - {}:",
      entry.node_id, entry.class_type, entry.input
    );
    match &entry.old {
      Some(old) => println!("   Old: {}", old),
      None => println!("   Old: (unset)"),
    }
    println!("   New: {}", entry.new);
    match entry.highlight {
      Some(AuditHighlight::CustomPrompt) => println!("   ✅ This is your custom prompt!"),
      Some(AuditHighlight::UploadedImage) => println!("   ✅ This is your uploaded image!"),
      None => {}
    }
  }
  println!("{}", RULE);

  println!("\n🎉 Workflow submitted successfully!");
  println!("📁 Output will appear in ComfyUI/output/");
  println!("✅ Job ID: {}", summary.prompt_id);
}

pub fn print_queue(status: &QueueStatus) {
  println!("📋 Active ComfyUI Jobs:");
  println!("{}", RULE);

  let running = status.running();
  if !running.is_empty() {
    println!("🔄 RUNNING:");
    for (index, job) in running.iter().enumerate() {
      println!("  {}. Job ID: {}", index + 1, job.job_id);
      println!("     Status: Running\n");
    }
  }

  let pending = status.pending();
  if !pending.is_empty() {
    println!("⏳ PENDING:");
    for job in &pending {
      println!("  {}. Job ID: {}", job.position, job.job_id);
      println!("     Status: Pending (position {})\n", job.position);
    }
  }

  if running.is_empty() && pending.is_empty() {
    println!("✅ No active jobs found");
  }
  println!("Total active jobs: {}", running.len() + pending.len());
}
