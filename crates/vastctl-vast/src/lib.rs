//! vastctl Vast
//!
//! Manages rented instances through the Vast.ai REST API: finding and
//! renting offers, stopping, starting and destroying instances, and
//! deriving how to reach a running one (its SSH endpoint and any directly
//! mapped web ports).

mod client;
mod error;
mod instance;
mod lifecycle;
mod offer;

pub use client::{DEFAULT_API_BASE, VastClient};
pub use error::{SshUnavailable, VastError};
pub use instance::{COMFY_PORT, Instance, JUPYTER_PORT, SshEndpoint};
pub use lifecycle::{
  COMFY_IMAGE, CreateInstanceRequest, CreatedInstance, DEFAULT_PROVISIONING_BASE, InstanceState,
};
pub use offer::{Offer, OfferFilter, OfferQuery};
