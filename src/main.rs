mod config_run;
mod console;
mod lifecycle;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use vastctl_comfy::{API_OUTPUT_PATH, CancelOutcome, ComfyClient, RunRequest, UI_OUTPUT_PATH};
use vastctl_monitor::{Monitor, MonitorOutcome, SshStatusProbe};
use vastctl_prompt::{DEFAULT_IMAGE_NODE_ID, DEFAULT_PROMPT_NODE_ID, PromptEdit};
use vastctl_remote::{OpenSshShell, SshTarget, discover_key};
use vastctl_template::{TemplateFormat, analyze};
use vastctl_vast::{InstanceState, VastClient, VastError};

use crate::console::{ConsoleSink, RULE, print_queue, print_run_summary};

const DEFAULT_PROMPT: &str = "A beautiful scene";

/// vastctl - operate ComfyUI on rented Vast.ai GPU instances
#[derive(Parser)]
#[command(name = "vastctl")]
#[command(version, about, long_about = None)]
struct Cli {
  /// SSH private key (default: first of ~/.ssh/id_ed25519_vastai, id_ed25519, id_rsa)
  #[arg(long, global = true)]
  ssh_key: Option<PathBuf>,

  /// Vast.ai API key
  #[arg(long, global = true, env = "VAST_API_KEY", hide_env_values = true)]
  vast_api_key: Option<String>,

  /// API prompt node holding the positive prompt
  #[arg(long, global = true, default_value = DEFAULT_PROMPT_NODE_ID)]
  prompt_node: String,

  /// API prompt node holding the image loader
  #[arg(long, global = true, default_value = DEFAULT_IMAGE_NODE_ID)]
  image_node: String,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Watch an instance boot until ComfyUI is ready
  Monitor {
    instance_id: String,

    #[arg(long, default_value_t = 60)]
    max_wait_minutes: u64,

    /// Seconds between checks
    #[arg(long, default_value_t = 10)]
    poll_interval: u64,
  },

  /// Show instance details and directly mapped portal URLs
  Portal { instance_id: String },

  /// List the instances on the account
  Instances,

  /// Find the cheapest suitable offers for a GPU model
  SearchOffers {
    #[arg(long, default_value = "RTX 3060")]
    gpu: String,

    /// Minimum disk in GB
    #[arg(long, default_value_t = 100.0)]
    min_disk: f64,

    /// How many offers to print
    #[arg(long, default_value_t = 10)]
    show: usize,
  },

  /// Rent an offer as a ComfyUI instance
  Create {
    offer_id: u64,

    /// Script file name or URL run on first boot
    #[arg(long, default_value = "provision_test_3.sh")]
    provisioning_script: String,

    /// Disk in GB
    #[arg(long, default_value_t = 100)]
    disk: u32,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    force: bool,
  },

  /// Stop an instance, keeping its disk
  #[command(visible_alias = "pause")]
  Stop {
    instance_id: String,

    #[arg(short, long)]
    force: bool,
  },

  /// Start a stopped instance and watch it boot
  #[command(visible_alias = "unpause")]
  Start {
    instance_id: String,

    #[arg(short, long)]
    force: bool,

    /// Do not monitor the instance after starting it
    #[arg(long)]
    no_monitor: bool,
  },

  /// Destroy an instance and its disk
  Destroy {
    instance_id: String,

    #[arg(short, long)]
    force: bool,
  },

  /// Re-run the latest workflow from ComfyUI history with a new image and prompt
  Run {
    host: String,
    port: u16,
    image: PathBuf,
    prompt: Option<String>,
  },

  /// Run a workflow file stored on the instance with a new image and prompt
  RunFile {
    host: String,
    port: u16,
    workflow_path: String,
    image: PathBuf,
    prompt: Option<String>,
  },

  /// Write an edited UI-format copy of a workflow on the instance
  Convert {
    host: String,
    port: u16,
    workflow_path: String,
    image_filename: String,
    prompt: String,
    output_path: String,
  },

  /// List running and pending jobs
  Queue { host: String, port: u16 },

  /// Cancel a running or pending job
  Cancel {
    host: String,
    port: u16,
    job_id: String,
  },

  /// Flatten a workflow into an editable template
  Analyze {
    workflow_file: PathBuf,

    /// Output path (default: <templates-dir>/configs/<name>-<format>.json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// minimal, detailed or user_friendly
    #[arg(short, long, default_value = "user_friendly")]
    format: TemplateFormat,

    /// Also print the template
    #[arg(short, long)]
    pretty: bool,

    #[arg(long, default_value = "TEMPLATES")]
    templates_dir: PathBuf,
  },

  /// Apply an edited template to its workflow and run it on an instance
  RunConfig {
    instance_id: String,
    config_file: PathBuf,

    #[arg(long, default_value = "TEMPLATES")]
    templates_dir: PathBuf,
  },
}

fn main() -> ExitCode {
  // Before parsing so clap's env fallback sees values from .env
  if let Err(err) = dotenvy::dotenv()
    && !err.not_found()
  {
    eprintln!("Warning: failed to load .env file: {err}");
  }

  init_tracing();
  let cli = Cli::parse();

  let result = tokio::runtime::Runtime::new()
    .context("failed to start runtime")
    .and_then(|rt| rt.block_on(run(cli)));

  match result {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::FAILURE,
    Err(err) => {
      eprintln!("❌ Error: {:#}", err);
      ExitCode::FAILURE
    }
  }
}

/// Initializes tracing with environment-based filtering.
fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::registry()
    .with(filter)
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();
}

/// Dispatch a command. `Ok(false)` means it ran but did not succeed.
async fn run(cli: Cli) -> Result<bool> {
  match &cli.command {
    Commands::Monitor {
      instance_id,
      max_wait_minutes,
      poll_interval,
    } => monitor(&cli, instance_id, *max_wait_minutes, *poll_interval).await,
    Commands::Portal { instance_id } => portal(&cli, instance_id).await,
    Commands::Instances => lifecycle::list_instances(&vast_client(&cli)?).await,
    Commands::SearchOffers {
      gpu,
      min_disk,
      show,
    } => lifecycle::search_offers(&vast_client(&cli)?, gpu, *min_disk, *show).await,
    Commands::Create {
      offer_id,
      provisioning_script,
      disk,
      force,
    } => {
      let vast = vast_client(&cli)?;
      lifecycle::create(&vast, *offer_id, provisioning_script, *disk, *force).await
    }
    Commands::Stop { instance_id, force } => {
      let vast = vast_client(&cli)?;
      lifecycle::change_state(&vast, instance_id, InstanceState::Stopped, *force).await?;
      Ok(true)
    }
    Commands::Start {
      instance_id,
      force,
      no_monitor,
    } => {
      let vast = vast_client(&cli)?;
      let started =
        lifecycle::change_state(&vast, instance_id, InstanceState::Running, *force).await?;
      if started && !*no_monitor {
        println!();
        return monitor(&cli, instance_id, 60, 10).await;
      }
      Ok(true)
    }
    Commands::Destroy { instance_id, force } => {
      lifecycle::destroy(&vast_client(&cli)?, instance_id, *force).await
    }
    Commands::Run {
      host,
      port,
      image,
      prompt,
    } => {
      let comfy = comfy_client(&cli, host, *port)?;
      let summary = comfy.run_workflow(&run_request(&cli, image, prompt)).await?;
      print_run_summary(&summary);
      Ok(true)
    }
    Commands::RunFile {
      host,
      port,
      workflow_path,
      image,
      prompt,
    } => {
      let comfy = comfy_client(&cli, host, *port)?;
      let summary = comfy
        .run_workflow_from_file(workflow_path, &run_request(&cli, image, prompt))
        .await?;
      print_run_summary(&summary);
      println!(
        "💾 API workflow saved to {}, UI-format copy (if any) to {}",
        API_OUTPUT_PATH, UI_OUTPUT_PATH
      );
      Ok(true)
    }
    Commands::Convert {
      host,
      port,
      workflow_path,
      image_filename,
      prompt,
      output_path,
    } => {
      let comfy = comfy_client(&cli, host, *port)?;
      let edit =
        PromptEdit::new(prompt, image_filename).with_nodes(&cli.prompt_node, &cli.image_node);
      comfy
        .save_ui_workflow(workflow_path, &edit, output_path)
        .await?;
      println!("💾 UI-compatible workflow saved to: {}", output_path);
      println!("   You can drag this file into the ComfyUI web interface");
      Ok(true)
    }
    Commands::Queue { host, port } => {
      let comfy = comfy_client(&cli, host, *port)?;
      print_queue(&comfy.queue_status().await?);
      Ok(true)
    }
    Commands::Cancel { host, port, job_id } => {
      let comfy = comfy_client(&cli, host, *port)?;
      println!("🔍 Looking for job {}...", job_id);
      match comfy.cancel_job(job_id).await? {
        CancelOutcome::Removed { position } => {
          println!("🗑️ Removed pending job {} (position {})", job_id, position)
        }
        CancelOutcome::Interrupted { confirmed: true } => {
          println!("🛑 Running job {} cancelled", job_id)
        }
        CancelOutcome::Interrupted { confirmed: false } => {
          println!("⚠️ Interrupt sent but job {} may still be processing", job_id)
        }
      }
      Ok(true)
    }
    Commands::Analyze {
      workflow_file,
      output,
      format,
      pretty,
      templates_dir,
    } => analyze_workflow(workflow_file, output.as_deref(), *format, *pretty, templates_dir).await,
    Commands::RunConfig {
      instance_id,
      config_file,
      templates_dir,
    } => run_config(&cli, instance_id, config_file, templates_dir).await,
  }
}

fn run_request(cli: &Cli, image: &Path, prompt: &Option<String>) -> RunRequest {
  let prompt = prompt.as_deref().unwrap_or(DEFAULT_PROMPT);
  println!("{}", RULE);
  println!("📸 Image: {}", image.display());
  println!("💭 Prompt: {}", prompt);
  println!("{}", RULE);

  RunRequest::new(image, prompt).with_nodes(&cli.prompt_node, &cli.image_node)
}

fn vast_client(cli: &Cli) -> Result<VastClient> {
  let api_key = cli.vast_api_key.clone().ok_or(VastError::MissingApiKey)?;
  Ok(VastClient::new(api_key)?)
}

fn comfy_client(cli: &Cli, host: &str, port: u16) -> Result<ComfyClient<OpenSshShell>> {
  let key = discover_key(cli.ssh_key.as_deref())?;
  let shell = OpenSshShell::new(SshTarget::new(host, port, key))
    .with_context(|| format!("cannot connect to {}:{}", host, port))?
    .with_command_timeout(Duration::from_secs(300));
  Ok(ComfyClient::new(shell))
}

async fn monitor(
  cli: &Cli,
  instance_id: &str,
  max_wait_minutes: u64,
  poll_interval: u64,
) -> Result<bool> {
  let vast = vast_client(cli)?;
  let probe = SshStatusProbe::new(discover_key(cli.ssh_key.as_deref())?);
  let monitor = Monitor::new(
    Duration::from_secs(max_wait_minutes.saturating_mul(60)),
    Duration::from_secs(poll_interval),
  );

  let cancel = CancellationToken::new();
  let on_interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      on_interrupt.cancel();
    }
  });

  println!("🔍 Starting monitor for instance {}", instance_id);
  println!(
    "⏱️ Will check every {}s for up to {} minutes",
    poll_interval, max_wait_minutes
  );

  let sink = ConsoleSink {
    instance_id: instance_id.to_string(),
  };
  let outcome = monitor
    .run(instance_id, &vast, &probe, &sink, &cancel)
    .await;

  match outcome {
    MonitorOutcome::Ready(report) => {
      println!("\n🎉 Instance is fully ready! ComfyUI is accessible.");
      if let Some(url) = report.tunnel_url("ComfyUI") {
        println!("🎨 ComfyUI URL: {}", url);
      }
      Ok(true)
    }
    MonitorOutcome::Failed(_) => {
      println!("\n💥 Instance encountered an error. Check the logs above.");
      Ok(false)
    }
    MonitorOutcome::TimedOut => {
      println!(
        "\n⏰ Timeout after {} minutes. Instance may still be starting up.",
        max_wait_minutes
      );
      Ok(false)
    }
    MonitorOutcome::Cancelled => {
      println!("\n⏹️ Interrupted");
      Ok(false)
    }
  }
}

async fn portal(cli: &Cli, instance_id: &str) -> Result<bool> {
  let vast = vast_client(cli)?;
  println!("🔍 Fetching portal URLs for instance {}...", instance_id);

  let Some(instance) = vast.instance(instance_id).await? else {
    bail!("instance {} not found in your instances list", instance_id);
  };

  println!("📋 Instance Status: {}", instance.status());
  if !instance.is_running() {
    println!("⚠️ Instance is not running (status: {})", instance.status());
    println!("   Portal URLs are only available when the instance is running");
    return Ok(false);
  }

  let or_na = |value: Option<String>| value.unwrap_or_else(|| "N/A".to_string());
  println!("\n{}", RULE);
  println!("📊 INSTANCE {} DETAILS", instance_id);
  println!("{}", RULE);
  println!("Status: {}", instance.status());
  println!("SSH Host: {}", or_na(instance.ssh_host.clone()));
  println!("SSH Port: {}", or_na(instance.ssh_port.map(|p| p.to_string())));
  println!("Public IP: {}", or_na(instance.public_ipaddr.clone()));
  if let Some(label) = &instance.label {
    println!("Label: {}", label);
  }

  let urls = instance.direct_portal_urls();
  if urls.is_empty() {
    println!("\n⚠️ No direct portal URLs found in API response");
    println!("   Tunnel URLs are reported by `vastctl monitor {}`", instance_id);
  } else {
    println!("\n🌐 DIRECT PORTAL URLS:");
    for (service, url) in &urls {
      println!("   {}: {}", service, url);
    }
  }

  for (field, url) in instance.url_fields() {
    println!("   {}: {}", field, url);
  }

  Ok(true)
}

async fn analyze_workflow(
  workflow_file: &Path,
  output: Option<&Path>,
  format: TemplateFormat,
  pretty: bool,
  templates_dir: &Path,
) -> Result<bool> {
  println!("🔍 Analyzing workflow: {}", workflow_file.display());

  let content = tokio::fs::read_to_string(workflow_file)
    .await
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;
  let document: serde_json::Value = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))?;

  let workflow_name = workflow_file
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .unwrap_or_else(|| "workflow".to_string());
  let template = analyze(&document, &workflow_name, format)?;

  let output_path = match output {
    Some(path) => path.to_path_buf(),
    None => templates_dir
      .join("configs")
      .join(format!("{}-{}.json", workflow_name, format)),
  };
  if let Some(parent) = output_path.parent()
    && !parent.as_os_str().is_empty()
  {
    tokio::fs::create_dir_all(parent).await?;
  }
  tokio::fs::write(&output_path, serde_json::to_string_pretty(&template)?)
    .await
    .with_context(|| format!("failed to write {}", output_path.display()))?;
  println!("✅ Configuration saved: {}", output_path.display());

  if pretty {
    println!("\n📋 Generated Configuration ({} format):", format);
    println!("{}", RULE);
    println!("{}", serde_json::to_string_pretty(&template)?);
  }

  if let Some(parameters) = template.get("parameters").and_then(|p| p.as_object()) {
    let mut node_types: Vec<&str> = parameters
      .values()
      .filter_map(|entry| entry.get("node_type").and_then(|t| t.as_str()))
      .collect();
    node_types.sort_unstable();
    node_types.dedup();

    println!("\n📊 Found {} configurable node instances", parameters.len());
    println!("🎯 Node types: {}", node_types.join(", "));
  }

  println!("\n💡 Usage:");
  println!("1. Edit: {}", output_path.display());
  println!(
    "2. Run: vastctl run-config <instance_id> {}",
    output_path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_default()
  );

  Ok(true)
}

async fn run_config(
  cli: &Cli,
  instance_id: &str,
  config_file: &Path,
  templates_dir: &Path,
) -> Result<bool> {
  let config_path = config_run::resolve_config_path(config_file, templates_dir);
  let prepared = config_run::prepare(&config_path, templates_dir)?;

  println!("🎯 Executing workflow: {}", prepared.workflow_name);
  println!("📋 Config: {}", config_path.display());
  println!("{}", RULE);
  for change in &prepared.applied.changed {
    println!(
      "  📝 Node {} ({}): {} → {}",
      change.node_id,
      change.node_type,
      change.old.to_value(),
      change.new.to_value()
    );
  }
  for node_id in &prepared.applied.missing {
    println!("⚠️ Warning: Node {} not found in workflow", node_id);
  }
  println!(
    "✅ Applied {} configuration changes",
    prepared.applied.changed.len()
  );
  if !prepared.texts.is_empty() {
    println!("  📝 Texts: {}", prepared.texts.join(", "));
  }

  let vast = vast_client(cli)?;
  let instance = vast
    .instance(instance_id)
    .await?
    .ok_or_else(|| VastError::InstanceNotFound(instance_id.to_string()))?;
  let endpoint = instance.ssh_endpoint(0).map_err(VastError::from)?;
  println!("✅ Found SSH info: {}:{}", endpoint.host, endpoint.port);

  let comfy = comfy_client(cli, &endpoint.host, endpoint.port)?;

  if prepared.images.is_empty() {
    println!("📸 No images to upload");
  }
  for (name, local_path) in &prepared.images {
    println!("  📤 Uploading {}...", name);
    comfy.upload_image(local_path, Some(name)).await?;
  }

  println!("\n🚀 Executing workflow on instance {}...", instance_id);
  let prompt_id = comfy.queue_prompt(&prepared.prompt).await?;
  println!("🎉 Success! Job ID: {}", prompt_id);

  Ok(true)
}
