//! In-memory demo farm.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::Backend;
use crate::error::FetchError;
use crate::model::{Feature, FeatureDefinition, Location, Scope};

/// Backend serving a small fixed farm: two web applications with a couple of
/// site collections each, and a handful of activated features.
#[derive(Debug, Clone)]
pub struct DemoBackend {
    locations: Vec<Location>,
    definitions: Vec<FeatureDefinition>,
    latency: Duration,
}

impl DemoBackend {
    pub fn new() -> Self {
        let global = FeatureDefinition::new("Global Web Parts", Scope::Farm);
        let expiration = FeatureDefinition::new("Workflow Expiration", Scope::WebApplication);
        let publishing = FeatureDefinition::new("Publishing Infrastructure", Scope::Site);
        let feed = FeatureDefinition::new("Site Feed", Scope::Site);
        let wiki = FeatureDefinition::new("Wiki Page Home Page", Scope::Web);
        let document_sets = FeatureDefinition::new("Document Sets", Scope::Site);

        let mut locations = Vec::new();

        let mut farm = Location::new(None, "Farm", "", Scope::Farm);
        farm.activate(Feature::of(&global, farm.id));
        let farm_id = farm.id;
        locations.push(farm);

        for (app_name, sites) in [
            ("Intranet", ["Portal", "HR"]),
            ("My Sites", ["Personal", "Teams"]),
        ] {
            let app_url = format!("https://{}", app_name.to_lowercase().replace(' ', ""));
            let mut app = Location::new(Some(farm_id), app_name, &app_url, Scope::WebApplication);
            app.activate(Feature::of(&expiration, app.id));
            let app_id = app.id;
            locations.push(app);

            for site_name in sites {
                let site_url = format!("{app_url}/sites/{}", site_name.to_lowercase());
                let mut site = Location::new(Some(app_id), site_name, &site_url, Scope::Site);
                site.activate(Feature::of(&publishing, site.id));
                if site_name != "HR" {
                    site.activate(Feature::of(&feed, site.id));
                }
                let site_id = site.id;
                locations.push(site);

                let mut web = Location::new(
                    Some(site_id),
                    format!("{site_name} Home"),
                    &site_url,
                    Scope::Web,
                );
                web.activate(Feature::of(&wiki, web.id));
                locations.push(web);
            }
        }

        Self {
            locations,
            definitions: vec![global, expiration, publishing, feed, wiki, document_sets],
            latency: Duration::ZERO,
        }
    }

    /// Delay every fetch by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn farm(&self) -> Option<&Location> {
        self.locations.iter().find(|l| l.scope == Scope::Farm)
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn subtree(&self, root: Uuid) -> Vec<Location> {
        let mut result = Vec::new();
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            if let Some(location) = self.locations.iter().find(|l| l.id == id) {
                result.push(location.clone());
            }
            queue.extend(
                self.locations
                    .iter()
                    .filter(|l| l.parent_id == Some(id))
                    .map(|l| l.id),
            );
        }
        result
    }
}

impl Default for DemoBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for DemoBackend {
    async fn fetch_locations(&self, seed: &Location) -> Result<Vec<Location>, FetchError> {
        self.simulate_latency().await;

        let root = if seed.is_farm_seed() {
            self.farm().map(|farm| farm.id)
        } else {
            self.locations
                .iter()
                .find(|l| l.id == seed.id)
                .map(|l| l.id)
        };

        match root {
            Some(id) => Ok(self.subtree(id)),
            None => Err(FetchError::LocationNotFound { id: seed.id }),
        }
    }

    async fn fetch_feature_definitions(&self) -> Result<Vec<FeatureDefinition>, FetchError> {
        self.simulate_latency().await;

        let mut definitions = self.definitions.clone();
        for feature in self.locations.iter().flat_map(|l| l.activated_features.iter()) {
            if let Some(definition) = definitions.iter_mut().find(|d| d.id == feature.definition_id) {
                definition.toggle_activated_feature(feature, true);
            }
        }
        Ok(definitions)
    }
}
