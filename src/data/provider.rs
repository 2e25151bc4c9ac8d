//! Interfaces the embedding application implements for the editor.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::core::{ElementIri, ElementModel, LinkTypeIri};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTypesOfRequest {
    pub element_id: ElementIri,
}

/// Number of links of one type entering and leaving an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCount {
    pub id: LinkTypeIri,
    pub in_count: usize,
    pub out_count: usize,
}

#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn link_types_of(&self, request: LinkTypesOfRequest) -> Result<Vec<LinkCount>>;

    /// Entities nested inside the group entity `group`.
    async fn load_embedded_elements(&self, group: ElementIri) -> Result<HashMap<ElementIri, ElementModel>>;
}

/// Presence of a metadata API switches the editor into authoring mode.
pub trait MetadataApi: Send + Sync {}
