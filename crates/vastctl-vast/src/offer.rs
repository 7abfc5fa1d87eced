use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// A rentable machine listing from `/search/asks/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
  pub id: u64,

  #[serde(default)]
  pub gpu_name: Option<String>,

  /// Total price in dollars per hour.
  #[serde(default)]
  pub dph_total: f64,

  /// Bandwidth in Mbps.
  #[serde(default)]
  pub inet_up: f64,
  #[serde(default)]
  pub inet_down: f64,

  /// Bandwidth prices in dollars per GB, absent when the host does not say.
  #[serde(default)]
  pub inet_up_cost: Option<f64>,
  #[serde(default)]
  pub inet_down_cost: Option<f64>,

  /// Disk in GB.
  #[serde(default)]
  pub disk_space: f64,

  #[serde(default)]
  pub geolocation: Option<String>,

  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Offer {
  /// Dollars spent running for `runtime_hours` and downloading
  /// `download_gb` on this machine.
  pub fn estimated_cost(&self, runtime_hours: f64, download_gb: f64) -> f64 {
    self.dph_total * runtime_hours + self.inet_down_cost.unwrap_or(0.0) * download_gb
  }
}

/// Server-side filter for an offer search.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferQuery {
  pub gpu_name: String,
  pub num_gpus: u32,
  pub limit: u32,
}

impl OfferQuery {
  pub fn new(gpu_name: impl Into<String>) -> Self {
    Self {
      gpu_name: gpu_name.into(),
      num_gpus: 1,
      limit: 30,
    }
  }

  /// Verified, rentable, unrented single-GPU machines of the given model.
  pub fn to_body(&self) -> Value {
    json!({
      "q": {
        "num_gpus": { "eq": self.num_gpus },
        "verified": { "eq": true },
        "rentable": { "eq": true },
        "rented": { "eq": false },
        "gpu_name": { "eq": self.gpu_name },
      },
      "limit": self.limit,
    })
  }
}

/// Client-side selection of offers worth renting for a short job.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferFilter {
  pub max_dph: f64,
  pub min_inet_up: f64,
  pub min_inet_down: f64,
  pub max_bandwidth_cost: f64,
  pub min_disk_gb: f64,
  /// The job the ranking prices: run time and model download size.
  pub runtime_hours: f64,
  pub download_gb: f64,
}

impl Default for OfferFilter {
  fn default() -> Self {
    Self {
      max_dph: 1.0,
      min_inet_up: 100.0,
      min_inet_down: 800.0,
      max_bandwidth_cost: 0.002,
      min_disk_gb: 100.0,
      runtime_hours: 10.0 / 60.0,
      download_gb: 100.0,
    }
  }
}

impl OfferFilter {
  pub fn accepts(&self, offer: &Offer) -> bool {
    // Unknown bandwidth prices are treated as too expensive
    let cheap = |cost: Option<f64>| cost.is_some_and(|c| c <= self.max_bandwidth_cost);

    offer.dph_total <= self.max_dph
      && offer.inet_up >= self.min_inet_up
      && offer.inet_down >= self.min_inet_down
      && cheap(offer.inet_down_cost)
      && cheap(offer.inet_up_cost)
      && offer.disk_space >= self.min_disk_gb
  }

  /// Accepted offers, cheapest estimated job first.
  pub fn rank(&self, offers: Vec<Offer>) -> Vec<Offer> {
    let mut accepted: Vec<Offer> = offers.into_iter().filter(|o| self.accepts(o)).collect();
    accepted.sort_by(|a, b| {
      let cost = |o: &Offer| o.estimated_cost(self.runtime_hours, self.download_gb);
      cost(a).partial_cmp(&cost(b)).unwrap_or(Ordering::Equal)
    });
    accepted
  }
}
