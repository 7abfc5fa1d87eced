use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::VastError;
use crate::instance::Instance;
use crate::lifecycle::{CreateInstanceRequest, CreatedInstance, InstanceState};
use crate::offer::{Offer, OfferQuery};

pub const DEFAULT_API_BASE: &str = "https://console.vast.ai/api/v0";

#[derive(Debug, Deserialize)]
struct InstancesResponse {
  #[serde(default)]
  instances: Vec<Instance>,
}

#[derive(Debug, Deserialize)]
struct OffersResponse {
  #[serde(default)]
  offers: Vec<Offer>,
}

/// Client for the parts of the Vast.ai API the tools need.
#[derive(Debug, Clone)]
pub struct VastClient {
  http: Client,
  api_key: String,
  base_url: Url,
}

impl VastClient {
  /// Create a client against the public API. An empty key is rejected.
  pub fn new(api_key: impl Into<String>) -> Result<Self, VastError> {
    let api_key = api_key.into();
    if api_key.trim().is_empty() {
      return Err(VastError::MissingApiKey);
    }

    Ok(Self {
      http: Client::new(),
      api_key,
      base_url: Url::parse(DEFAULT_API_BASE)?,
    })
  }

  pub fn with_base_url(mut self, base_url: &str) -> Result<Self, VastError> {
    self.base_url = Url::parse(base_url)?;
    Ok(self)
  }

  fn endpoint(&self, path: &str) -> Result<Url, VastError> {
    let mut base = self.base_url.clone();
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }
    Ok(base.join(path)?)
  }

  /// Send an authenticated request, turning non-success statuses into
  /// [`VastError::Status`].
  async fn send(&self, request: RequestBuilder) -> Result<Response, VastError> {
    let response = request.bearer_auth(&self.api_key).send().await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(VastError::Status {
        status: status.as_u16(),
        body,
      });
    }

    Ok(response)
  }

  /// All instances on the account.
  #[instrument(skip(self))]
  pub async fn instances(&self) -> Result<Vec<Instance>, VastError> {
    let url = self.endpoint("instances/")?;
    debug!(%url, "listing instances");

    let listing: InstancesResponse = self.send(self.http.get(url)).await?.json().await?;
    Ok(listing.instances)
  }

  /// One instance by id, `None` if the account has no such instance.
  #[instrument(skip(self))]
  pub async fn instance(&self, instance_id: &str) -> Result<Option<Instance>, VastError> {
    let instances = self.instances().await?;
    Ok(
      instances
        .into_iter()
        .find(|instance| instance.id_string() == instance_id),
    )
  }

  /// Permanently destroy an instance and its disk.
  #[instrument(skip(self))]
  pub async fn destroy_instance(&self, instance_id: &str) -> Result<(), VastError> {
    let url = self.endpoint(&format!("instances/{}/", instance_id))?;
    self.send(self.http.delete(url)).await?;
    info!("instance destroyed");
    Ok(())
  }

  /// Stop or start an instance. A stopped instance keeps its disk.
  #[instrument(skip(self))]
  pub async fn set_instance_state(
    &self,
    instance_id: &str,
    state: InstanceState,
  ) -> Result<(), VastError> {
    let url = self.endpoint(&format!("instances/{}/", instance_id))?;
    self
      .send(self.http.put(url).json(&json!({ "state": state })))
      .await?;
    info!(%state, "instance state change requested");
    Ok(())
  }

  /// Offers matching `query`, in the order the API returns them.
  #[instrument(skip(self))]
  pub async fn search_offers(&self, query: &OfferQuery) -> Result<Vec<Offer>, VastError> {
    let url = self.endpoint("search/asks/")?;
    let listing: OffersResponse = self
      .send(self.http.put(url).json(&query.to_body()))
      .await?
      .json()
      .await?;
    debug!(offers = listing.offers.len(), "offers received");
    Ok(listing.offers)
  }

  /// Rent the machine behind `offer_id`.
  #[instrument(skip(self, request))]
  pub async fn create_instance(
    &self,
    offer_id: u64,
    request: &CreateInstanceRequest,
  ) -> Result<CreatedInstance, VastError> {
    let url = self.endpoint(&format!("asks/{}/", offer_id))?;
    let created: CreatedInstance = self
      .send(self.http.put(url).json(request))
      .await?
      .json()
      .await?;
    info!(instance_id = ?created.instance_id(), "instance created");
    Ok(created)
  }
}
