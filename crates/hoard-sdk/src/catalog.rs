//! The catalog-lookup collaborator.
//!
//! Hoard never talks to rule-content sources itself. A [`CatalogSource`]
//! does that and hands back normalized [`CatalogItemDetails`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use hoard_types::{ItemCandidate, ItemCategory};
use serde::{Deserialize, Serialize};

use crate::error::SdkResult;

/// One search result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogHit {
    pub name: String,
    pub ref_id: String,
    pub source: String,
    #[serde(default)]
    pub summary: String,
}

/// Normalized details of a catalog entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItemDetails {
    pub name: String,
    pub category: ItemCategory,
    #[serde(default)]
    pub weight_per_unit: f64,
    #[serde(default)]
    pub value_per_unit: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl CatalogItemDetails {
    pub fn into_candidate(self, quantity: u32) -> ItemCandidate {
        let mut candidate = ItemCandidate::new(self.name, self.category, quantity)
            .with_weight(self.weight_per_unit)
            .with_value(self.value_per_unit)
            .with_description(self.description);
        candidate.properties = self.properties;
        candidate
    }
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn search(&self, term: &str) -> SdkResult<Vec<CatalogHit>>;

    /// `Ok(None)` when `ref_id` is unknown to the source.
    async fn fetch_details(&self, ref_id: &str) -> SdkResult<Option<CatalogItemDetails>>;
}

/// A fixed catalog, for tests and offline use.
#[derive(Clone, Debug, Default)]
pub struct StaticCatalog {
    source: String,
    entries: BTreeMap<String, CatalogItemDetails>,
}

impl StaticCatalog {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn with_entry(mut self, ref_id: impl Into<String>, details: CatalogItemDetails) -> Self {
        self.entries.insert(ref_id.into(), details);
        self
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn search(&self, term: &str) -> SdkResult<Vec<CatalogHit>> {
        let needle = term.trim().to_lowercase();
        Ok(self
            .entries
            .iter()
            .filter(|(_, d)| d.name.to_lowercase().contains(&needle))
            .map(|(ref_id, d)| CatalogHit {
                name: d.name.clone(),
                ref_id: ref_id.clone(),
                source: self.source.clone(),
                summary: d.description.clone(),
            })
            .collect())
    }

    async fn fetch_details(&self, ref_id: &str) -> SdkResult<Option<CatalogItemDetails>> {
        Ok(self.entries.get(ref_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rope() -> CatalogItemDetails {
        CatalogItemDetails {
            name: "Hempen Rope".into(),
            category: ItemCategory::Tool,
            weight_per_unit: 10.0,
            value_per_unit: 1.0,
            description: "50 feet".into(),
            properties: BTreeMap::from([("length".to_string(), "50ft".to_string())]),
        }
    }

    #[test]
    fn details_become_candidate() {
        let candidate = rope().into_candidate(2);
        assert_eq!(candidate.name, "Hempen Rope");
        assert_eq!(candidate.quantity, 2);
        assert_eq!(candidate.weight, 10.0);
        assert_eq!(candidate.properties["length"], "50ft");
    }

    #[tokio::test]
    async fn static_catalog_search_and_fetch() {
        let catalog = StaticCatalog::new("srd").with_entry("rope-hempen", rope());

        let hits = catalog.search("rope").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ref_id, "rope-hempen");
        assert_eq!(hits[0].source, "srd");

        assert!(catalog.fetch_details("rope-hempen").await.unwrap().is_some());
        assert!(catalog.fetch_details("nope").await.unwrap().is_none());
        assert!(catalog.search("sword").await.unwrap().is_empty());
    }
}
