//! Data-access seam — where locations and feature definitions come from.

pub mod demo;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::model::{FeatureDefinition, Location};

pub use demo::DemoBackend;

/// Backend-agnostic access to the location tree and its feature definitions.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Load `seed` and everything below it.
    ///
    /// A farm-scoped seed (see [`Location::farm_seed`]) resolves to the
    /// whole farm.
    async fn fetch_locations(&self, seed: &Location) -> Result<Vec<Location>, FetchError>;

    /// Load every feature definition installed in the farm.
    async fn fetch_feature_definitions(&self) -> Result<Vec<FeatureDefinition>, FetchError>;
}
