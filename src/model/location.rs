//! Locations — the hierarchical resource tree a load task walks.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::feature::Feature;

/// Level of a location (and of the features that can be activated there).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Farm,
    WebApplication,
    Site,
    Web,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Farm => "farm",
            Self::WebApplication => "web_application",
            Self::Site => "site",
            Self::Web => "web",
        };
        write!(f, "{s}")
    }
}

/// A location together with the features activated on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: Uuid,
    /// Parent location, `None` for the farm.
    pub parent_id: Option<Uuid>,
    pub display_name: String,
    pub url: String,
    pub scope: Scope,
    pub activated_features: Vec<Feature>,
}

impl Location {
    pub fn new(
        parent_id: Option<Uuid>,
        display_name: impl Into<String>,
        url: impl Into<String>,
        scope: Scope,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id,
            display_name: display_name.into(),
            url: url.into(),
            scope,
            activated_features: Vec::new(),
        }
    }

    /// Placeholder farm used to kick off a load when the caller has no seed.
    ///
    /// The backend resolves a farm-scoped seed to the real farm, so the id of
    /// the placeholder is never looked up.
    pub fn farm_seed() -> Self {
        Self {
            id: Uuid::nil(),
            parent_id: None,
            display_name: "Farm".to_string(),
            url: String::new(),
            scope: Scope::Farm,
            activated_features: Vec::new(),
        }
    }

    /// Activate a feature on this location, returning the activation link.
    pub fn activate(&mut self, feature: Feature) -> &Feature {
        let feature = Feature {
            location_id: self.id,
            activated: true,
            ..feature
        };
        self.activated_features.push(feature);
        &self.activated_features[self.activated_features.len() - 1]
    }

    pub fn is_farm_seed(&self) -> bool {
        self.scope == Scope::Farm && self.id.is_nil()
    }
}
