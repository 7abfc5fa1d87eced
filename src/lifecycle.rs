use anyhow::{Result, bail};
use dialoguer::Confirm;
use serde_json::Value;
use tracing::warn;
use vastctl_vast::{
  CreateInstanceRequest, Instance, InstanceState, Offer, OfferFilter, OfferQuery, VastClient,
};

use crate::console::RULE;

/// Ask before doing something that costs money or loses data. `force`
/// skips the question.
fn confirm(prompt: &str, force: bool) -> Result<bool> {
  if force {
    return Ok(true);
  }
  Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}

fn extra_str<'a>(instance: &'a Instance, key: &str) -> &'a str {
  instance
    .extra
    .get(key)
    .and_then(Value::as_str)
    .unwrap_or("unknown")
}

fn hourly_cost(instance: &Instance) -> f64 {
  instance
    .extra
    .get("dph_total")
    .and_then(Value::as_f64)
    .unwrap_or(0.0)
}

pub fn instance_details(instance: &Instance) -> String {
  format!(
    "📋 Instance Details:\n  ID: {}\n  Status: {}\n  GPU: {}\n  Cost: ${:.4}/hour",
    instance.id_string(),
    instance.status(),
    extra_str(instance, "gpu_name"),
    hourly_cost(instance)
  )
}

pub fn offer_line(index: usize, offer: &Offer, filter: &OfferFilter) -> String {
  let down_cost_tb = offer.inet_down_cost.unwrap_or(0.0) * 1000.0;
  let down_display = if down_cost_tb > 0.01 {
    format!("${:.4}/TB", down_cost_tb)
  } else {
    format!("${:.6}/TB", down_cost_tb)
  };

  format!(
    "[{}] ID: {:<10} | GPU: {} | DPH: ${:.4} | Disk: {:.0}GB | Down: {:.0}Mbps ({}) | 10min Total: ${:.4} | Region: {}",
    index,
    offer.id,
    offer.gpu_name.as_deref().unwrap_or("N/A"),
    offer.dph_total,
    offer.disk_space,
    offer.inet_down,
    down_display,
    offer.estimated_cost(filter.runtime_hours, filter.download_gb),
    offer.geolocation.as_deref().unwrap_or("Unknown")
  )
}

async fn find(vast: &VastClient, instance_id: &str) -> Result<Instance> {
  println!("🔍 Fetching instance {} details...", instance_id);
  match vast.instance(instance_id).await? {
    Some(instance) => Ok(instance),
    None => bail!("instance {} not found", instance_id),
  }
}

pub async fn list_instances(vast: &VastClient) -> Result<bool> {
  let instances = vast.instances().await?;
  if instances.is_empty() {
    println!("📭 No instances found");
    return Ok(true);
  }

  println!("📋 Found {} instance(s):", instances.len());
  println!("{}", RULE);
  for instance in &instances {
    println!(
      "ID: {:<10} | Status: {:<10} | GPU: {} | Cost: ${:.4}/hour",
      instance.id_string(),
      instance.status(),
      extra_str(instance, "gpu_name"),
      hourly_cost(instance)
    );
  }
  Ok(true)
}

pub async fn destroy(vast: &VastClient, instance_id: &str, force: bool) -> Result<bool> {
  let instance = find(vast, instance_id).await?;
  println!("{}", instance_details(&instance));

  let prompt = format!(
    "⚠️ Are you sure you want to DESTROY instance {}? This cannot be undone!",
    instance_id
  );
  if !confirm(&prompt, force)? {
    println!("⏹️ Destruction aborted");
    return Ok(false);
  }

  println!("🔥 Destroying instance {}...", instance_id);
  vast.destroy_instance(instance_id).await?;
  println!("✅ Instance {} destroyed successfully", instance_id);
  Ok(true)
}

/// Stop or start an instance. Returns whether a state change was sent.
pub async fn change_state(
  vast: &VastClient,
  instance_id: &str,
  state: InstanceState,
  force: bool,
) -> Result<bool> {
  let (verb, glyph) = match state {
    InstanceState::Stopped => ("stop", "⏸️"),
    InstanceState::Running => ("start", "▶️"),
  };

  let instance = find(vast, instance_id).await?;
  println!("{}", instance_details(&instance));

  if state.is_reached_by(instance.status()) {
    println!("⚠️ Instance {} is already {}", instance_id, instance.status());
    return Ok(false);
  }

  let prompt = format!("{} Are you sure you want to {} instance {}?", glyph, verb, instance_id);
  if !confirm(&prompt, force)? {
    println!("⏹️ Aborted");
    return Ok(false);
  }

  println!("{} Requesting {} for instance {}...", glyph, verb, instance_id);
  vast.set_instance_state(instance_id, state).await?;
  println!("✅ Instance {} is now set to {}", instance_id, state);
  Ok(true)
}

pub async fn search_offers(
  vast: &VastClient,
  gpu_name: &str,
  min_disk_gb: f64,
  show: usize,
) -> Result<bool> {
  let filter = OfferFilter {
    min_disk_gb,
    ..Default::default()
  };

  let offers = vast.search_offers(&OfferQuery::new(gpu_name)).await?;
  println!("Total offers received: {}", offers.len());

  let ranked = filter.rank(offers);
  println!(
    "Found {} {} offers under ${}/hr with good internet, low bandwidth costs, and {}GB+ disk:",
    ranked.len(),
    gpu_name,
    filter.max_dph,
    min_disk_gb
  );
  println!("Sorted by lowest 10min total cost. Assuming: 10min runtime, 100GB download");
  for (index, offer) in ranked.iter().take(show).enumerate() {
    println!("{}", offer_line(index, offer, &filter));
  }

  if ranked.is_empty() {
    warn!(gpu = gpu_name, "no offers passed the filter");
  }
  Ok(!ranked.is_empty())
}

pub async fn create(
  vast: &VastClient,
  offer_id: u64,
  provisioning_script: &str,
  disk: u32,
  force: bool,
) -> Result<bool> {
  let request = CreateInstanceRequest::comfy(provisioning_script).with_disk(disk);
  println!("🖥️ Renting offer {}", offer_id);
  println!("   Image: {}", request.image);
  println!("   Disk: {}GB", request.disk);
  println!(
    "   Provisioning: {}",
    request
      .env
      .get("PROVISIONING_SCRIPT")
      .map(String::as_str)
      .unwrap_or_default()
  );

  let prompt = format!("💸 Rent offer {}? This starts billing.", offer_id);
  if !confirm(&prompt, force)? {
    println!("⏹️ Aborted");
    return Ok(false);
  }

  let created = vast.create_instance(offer_id, &request).await?;
  match created.instance_id() {
    Some(instance_id) => {
      println!("✅ Instance created successfully!");
      println!("Instance ID: {}", instance_id);
      println!("Next: vastctl monitor {}", instance_id);
      Ok(true)
    }
    None => {
      println!("❌ The API accepted the request but returned no instance ID");
      Ok(false)
    }
  }
}
