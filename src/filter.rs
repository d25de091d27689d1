//! Search filtering for result lists.
//!
//! Observers of `LocationsUpdated` / `FeatureDefinitionsUpdated` keep their
//! own lists; a [`SearchFilter`] narrows those down by text and scope.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{FeatureDefinition, Location, Scope};

/// Something a [`SearchFilter`] can match.
pub trait Searchable {
    fn id(&self) -> Uuid;
    fn scope(&self) -> Scope;
    /// Text fields the query is matched against.
    fn search_text(&self) -> Vec<&str>;
}

impl Searchable for Location {
    fn id(&self) -> Uuid {
        self.id
    }

    fn scope(&self) -> Scope {
        self.scope
    }

    fn search_text(&self) -> Vec<&str> {
        vec![self.display_name.as_str(), self.url.as_str()]
    }
}

impl Searchable for FeatureDefinition {
    fn id(&self) -> Uuid {
        self.id
    }

    fn scope(&self) -> Scope {
        self.scope
    }

    fn search_text(&self) -> Vec<&str> {
        vec![self.display_name.as_str()]
    }
}

/// Text query plus an optional scope restriction. The default filter
/// matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub query: String,
    pub scope: Option<Scope>,
}

impl SearchFilter {
    pub fn new(query: impl Into<String>, scope: Option<Scope>) -> Self {
        Self {
            query: query.into(),
            scope,
        }
    }

    /// Filter down to the single item with `id`, regardless of scope.
    pub fn for_item(id: Uuid) -> Self {
        Self::new(id.to_string(), None)
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Case-insensitive substring match on the item's text or id.
    pub fn matches<T: Searchable>(&self, item: &T) -> bool {
        if self.scope.is_some_and(|scope| scope != item.scope()) {
            return false;
        }

        let query = self.query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }

        item.id().to_string().contains(&query)
            || item
                .search_text()
                .iter()
                .any(|text| text.to_lowercase().contains(&query))
    }

    pub fn apply<'a, T: Searchable>(&self, items: &'a [T]) -> Vec<&'a T> {
        items.iter().filter(|item| self.matches(*item)).collect()
    }
}
