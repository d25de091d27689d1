//! Features and the feature definitions behind them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::location::{Location, Scope};

/// Activation link between a location and a feature definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub definition_id: Uuid,
    pub location_id: Uuid,
    pub display_name: String,
    pub scope: Scope,
    pub activated: bool,
}

impl Feature {
    /// A (not yet activated) feature of `definition` at `location_id`.
    pub fn of(definition: &FeatureDefinition, location_id: Uuid) -> Self {
        Self {
            definition_id: definition.id,
            location_id,
            display_name: definition.display_name.clone(),
            scope: definition.scope,
            activated: false,
        }
    }
}

/// De-duplicated identity behind one or more features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDefinition {
    pub id: Uuid,
    pub display_name: String,
    pub scope: Scope,
    /// Features currently activated from this definition, one per location.
    pub activated_features: Vec<Feature>,
}

impl FeatureDefinition {
    pub fn new(display_name: impl Into<String>, scope: Scope) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            scope,
            activated_features: Vec::new(),
        }
    }

    /// Rebuild the definition a feature points at, without activations.
    pub fn from_feature(feature: &Feature) -> Self {
        Self {
            id: feature.definition_id,
            display_name: feature.display_name.clone(),
            scope: feature.scope,
            activated_features: Vec::new(),
        }
    }

    /// Switch a feature on or off for this definition.
    ///
    /// Features are keyed by location, so toggling the same location twice
    /// replaces the earlier entry. Features of other definitions are ignored.
    pub fn toggle_activated_feature(&mut self, feature: &Feature, on: bool) {
        if feature.definition_id != self.id {
            tracing::debug!(
                definition_id = %self.id,
                feature_definition_id = %feature.definition_id,
                "Ignoring feature of another definition"
            );
            return;
        }

        self.activated_features
            .retain(|f| f.location_id != feature.location_id);

        if on {
            self.activated_features.push(Feature {
                activated: true,
                ..feature.clone()
            });
        }
    }

    pub fn is_activated_at(&self, location_id: Uuid) -> bool {
        self.activated_features
            .iter()
            .any(|f| f.location_id == location_id && f.activated)
    }
}

/// Collect the distinct feature definitions referenced by `locations`,
/// in first-seen order, with every referencing feature toggled on.
pub fn aggregate_definitions(locations: &[Location]) -> Vec<FeatureDefinition> {
    let mut definitions: Vec<FeatureDefinition> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();

    for feature in locations.iter().flat_map(|l| l.activated_features.iter()) {
        let slot = *index.entry(feature.definition_id).or_insert_with(|| {
            definitions.push(FeatureDefinition::from_feature(feature));
            definitions.len() - 1
        });
        definitions[slot].toggle_activated_feature(feature, true);
    }

    definitions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(name: &str) -> Location {
        Location::new(None, name, format!("https://{name}"), Scope::Site)
    }

    #[test]
    fn shared_definition_is_deduplicated() {
        let publishing = FeatureDefinition::new("Publishing", Scope::Site);
        let mut a = site("a");
        let mut b = site("b");
        a.activate(Feature::of(&publishing, a.id));
        b.activate(Feature::of(&publishing, b.id));

        let definitions = aggregate_definitions(&[a.clone(), b.clone()]);

        assert_eq!(definitions.len(), 1);
        let definition = &definitions[0];
        assert_eq!(definition.id, publishing.id);
        assert_eq!(definition.activated_features.len(), 2);
        assert!(definition.is_activated_at(a.id));
        assert!(definition.is_activated_at(b.id));
    }

    #[test]
    fn first_seen_order_is_kept() {
        let first = FeatureDefinition::new("Workflows", Scope::Site);
        let second = FeatureDefinition::new("Search", Scope::Site);
        let mut a = site("a");
        a.activate(Feature::of(&first, a.id));
        a.activate(Feature::of(&second, a.id));
        let mut b = site("b");
        b.activate(Feature::of(&second, b.id));

        let ids: Vec<Uuid> = aggregate_definitions(&[a, b]).iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[test]
    fn no_features_no_definitions() {
        assert!(aggregate_definitions(&[site("empty")]).is_empty());
        assert!(aggregate_definitions(&[]).is_empty());
    }

    #[test]
    fn toggle_off_removes_activation() {
        let mut definition = FeatureDefinition::new("Publishing", Scope::Site);
        let location = Uuid::new_v4();
        let feature = Feature::of(&definition, location);

        definition.toggle_activated_feature(&feature, true);
        definition.toggle_activated_feature(&feature, true);
        assert_eq!(definition.activated_features.len(), 1);

        definition.toggle_activated_feature(&feature, false);
        assert!(!definition.is_activated_at(location));
        assert!(definition.activated_features.is_empty());
    }

    #[test]
    fn toggle_ignores_foreign_feature() {
        let mut definition = FeatureDefinition::new("Publishing", Scope::Site);
        let other = FeatureDefinition::new("Search", Scope::Site);
        definition.toggle_activated_feature(&Feature::of(&other, Uuid::new_v4()), true);
        assert!(definition.activated_features.is_empty());
    }
}
