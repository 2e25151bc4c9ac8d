//! Diagram cells: elements placed on the canvas and the links between them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::{ElementIri, ElementModel, LinkModel, LinkTypeIri, Size, Vector};

/// Diagram-local element id. Unique within one diagram only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u64);

/// Diagram-local link id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element_{}", self.0)
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link_{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub data: ElementModel,
    pub position: Vector,
    pub size: Size,
    pub expanded: bool,
    /// Group element this one is nested in
    pub group: Option<ElementId>,
}

impl Element {
    pub fn iri(&self) -> &ElementIri {
        &self.data.id
    }

    pub fn center(&self) -> Vector {
        Vector::new(self.position.x + self.size.width / 2.0, self.position.y + self.size.height / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub type_id: LinkTypeIri,
    pub source_id: ElementId,
    pub target_id: ElementId,
    pub data: LinkModel,
    /// User-drawn bend points
    pub vertices: Vec<Vector>,
}

/// A link that is about to be placed between two existing elements.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLink {
    pub source_id: ElementId,
    pub target_id: ElementId,
    pub data: LinkModel,
    pub vertices: Vec<Vector>,
}

impl NewLink {
    pub fn new(source_id: ElementId, target_id: ElementId, data: LinkModel) -> Self {
        Self { source_id, target_id, data, vertices: Vec::new() }
    }

    pub fn with_vertices(mut self, vertices: Vec<Vector>) -> Self {
        self.vertices = vertices;
        self
    }
}
