//! Domain model: locations, features and feature definitions.

pub mod feature;
pub mod location;

pub use feature::{aggregate_definitions, Feature, FeatureDefinition};
pub use location::{Location, Scope};
