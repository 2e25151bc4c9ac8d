//! Pending changes made in authoring mode.
//!
//! [`AuthoringState`] is an immutable value: every transition returns a new
//! state and leaves the previous one untouched, so earlier states can be
//! kept in the command history. Both indices are shared behind `Arc` and
//! only copied when a transition actually changes them.
//!
//! At most one event exists per element IRI and per link identity. A new
//! event for a key is merged with the pending one:
//!
//! | pending  | add               | change               | delete          |
//! |----------|-------------------|----------------------|-----------------|
//! | none     | Add               | Change               | Delete          |
//! | Add      | unchanged         | Add (new data)       | removed         |
//! | Change   | Change (new data) | Change (same before) | Delete          |
//! | Delete   | Change or removed | error                | unchanged       |

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

use crate::core::{ElementIri, ElementModel, LinkKey, LinkModel};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthoringError {
    #[error("Element IRI changed from {before} to {after}")]
    ElementIriChanged { before: ElementIri, after: ElementIri },

    #[error("Cannot change deleted element {0}")]
    ChangeDeletedElement(ElementIri),

    #[error("Cannot change deleted link {0}")]
    ChangeDeletedLink(String),

    #[error("No pending authoring event for {0}")]
    EventNotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthoringKind {
    AddElement,
    ChangeElement,
    DeleteElement,
    AddLink,
    ChangeLink,
    DeleteLink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementEvent {
    Add { after: ElementModel },
    Change { before: ElementModel, after: ElementModel },
    Delete { model: ElementModel },
}

impl ElementEvent {
    /// Latest known data of the element.
    pub fn model(&self) -> &ElementModel {
        match self {
            ElementEvent::Add { after } | ElementEvent::Change { after, .. } => after,
            ElementEvent::Delete { model } => model,
        }
    }

    pub fn iri(&self) -> &ElementIri {
        &self.model().id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Add { after: LinkModel },
    Change { before: LinkModel, after: LinkModel },
    Delete { model: LinkModel },
}

impl LinkEvent {
    pub fn model(&self) -> &LinkModel {
        match self {
            LinkEvent::Add { after } | LinkEvent::Change { after, .. } => after,
            LinkEvent::Delete { model } => model,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthoringEvent {
    Element(ElementEvent),
    Link(LinkEvent),
}

impl AuthoringEvent {
    pub fn kind(&self) -> AuthoringKind {
        match self {
            AuthoringEvent::Element(ElementEvent::Add { .. }) => AuthoringKind::AddElement,
            AuthoringEvent::Element(ElementEvent::Change { .. }) => AuthoringKind::ChangeElement,
            AuthoringEvent::Element(ElementEvent::Delete { .. }) => AuthoringKind::DeleteElement,
            AuthoringEvent::Link(LinkEvent::Add { .. }) => AuthoringKind::AddLink,
            AuthoringEvent::Link(LinkEvent::Change { .. }) => AuthoringKind::ChangeLink,
            AuthoringEvent::Link(LinkEvent::Delete { .. }) => AuthoringKind::DeleteLink,
        }
    }
}

impl From<ElementEvent> for AuthoringEvent {
    fn from(event: ElementEvent) -> Self {
        AuthoringEvent::Element(event)
    }
}

impl From<LinkEvent> for AuthoringEvent {
    fn from(event: LinkEvent) -> Self {
        AuthoringEvent::Link(event)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthoringState {
    elements: Arc<HashMap<ElementIri, ElementEvent>>,
    links: Arc<HashMap<LinkKey, LinkEvent>>,
}

impl AuthoringState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.links.is_empty()
    }

    /// True when both states share the same indices, i.e. `other` was
    /// produced from `self` by transitions that changed nothing.
    pub fn same_as(&self, other: &AuthoringState) -> bool {
        Arc::ptr_eq(&self.elements, &other.elements) && Arc::ptr_eq(&self.links, &other.links)
    }

    pub fn elements(&self) -> impl Iterator<Item = (&ElementIri, &ElementEvent)> {
        self.elements.iter()
    }

    pub fn links(&self) -> impl Iterator<Item = (&LinkKey, &LinkEvent)> {
        self.links.iter()
    }

    pub fn events(&self) -> impl Iterator<Item = AuthoringEvent> + '_ {
        self.elements
            .values()
            .cloned()
            .map(AuthoringEvent::Element)
            .chain(self.links.values().cloned().map(AuthoringEvent::Link))
    }

    pub fn element_event(&self, iri: &ElementIri) -> Option<&ElementEvent> {
        self.elements.get(iri)
    }

    pub fn link_event(&self, key: &LinkKey) -> Option<&LinkEvent> {
        self.links.get(key)
    }

    fn with_element(&self, iri: ElementIri, event: Option<ElementEvent>) -> Self {
        let mut next = self.clone();
        let elements = Arc::make_mut(&mut next.elements);
        match event {
            Some(event) => elements.insert(iri, event),
            None => elements.remove(&iri),
        };
        next
    }

    fn with_link(&self, key: LinkKey, event: Option<LinkEvent>) -> Self {
        let mut next = self.clone();
        let links = Arc::make_mut(&mut next.links);
        match event {
            Some(event) => links.insert(key, event),
            None => links.remove(&key),
        };
        next
    }

    pub fn add_element(&self, model: ElementModel) -> Self {
        let event = match self.elements.get(&model.id) {
            Some(ElementEvent::Add { .. }) => return self.clone(),
            Some(ElementEvent::Delete { model: deleted }) if *deleted == model => None,
            Some(ElementEvent::Delete { model: deleted }) => {
                Some(ElementEvent::Change { before: deleted.clone(), after: model.clone() })
            }
            Some(ElementEvent::Change { before, .. }) => {
                Some(ElementEvent::Change { before: before.clone(), after: model.clone() })
            }
            None => Some(ElementEvent::Add { after: model.clone() }),
        };
        self.with_element(model.id, event)
    }

    pub fn change_element(&self, before: ElementModel, after: ElementModel) -> Result<Self, AuthoringError> {
        if before.id != after.id {
            return Err(AuthoringError::ElementIriChanged { before: before.id, after: after.id });
        }
        let event = match self.elements.get(&after.id) {
            Some(ElementEvent::Delete { .. }) => {
                return Err(AuthoringError::ChangeDeletedElement(after.id));
            }
            Some(ElementEvent::Add { .. }) => ElementEvent::Add { after: after.clone() },
            Some(ElementEvent::Change { before: original, .. }) => {
                ElementEvent::Change { before: original.clone(), after: after.clone() }
            }
            None => ElementEvent::Change { before, after: after.clone() },
        };
        Ok(self.with_element(after.id, Some(event)))
    }

    pub fn delete_element(&self, model: ElementModel) -> Self {
        let event = match self.elements.get(&model.id) {
            Some(ElementEvent::Delete { .. }) => return self.clone(),
            Some(ElementEvent::Add { .. }) => None,
            Some(ElementEvent::Change { .. }) | None => Some(ElementEvent::Delete { model: model.clone() }),
        };
        self.with_element(model.id, event)
    }

    pub fn add_link(&self, model: LinkModel) -> Self {
        let key = model.key();
        let event = match self.links.get(&key) {
            Some(LinkEvent::Add { .. }) => return self.clone(),
            Some(LinkEvent::Delete { model: deleted }) if *deleted == model => None,
            Some(LinkEvent::Delete { model: deleted }) => {
                Some(LinkEvent::Change { before: deleted.clone(), after: model })
            }
            Some(LinkEvent::Change { before, .. }) => Some(LinkEvent::Change { before: before.clone(), after: model }),
            None => Some(LinkEvent::Add { after: model }),
        };
        self.with_link(key, event)
    }

    /// `before` and `after` must share the same identity; a link whose
    /// identity changes is a deletion plus an addition.
    pub fn change_link(&self, before: LinkModel, after: LinkModel) -> Result<Self, AuthoringError> {
        let key = after.key();
        let event = match self.links.get(&key) {
            Some(LinkEvent::Delete { .. }) => return Err(AuthoringError::ChangeDeletedLink(key.to_string())),
            Some(LinkEvent::Add { .. }) => LinkEvent::Add { after },
            Some(LinkEvent::Change { before: original, .. }) => {
                LinkEvent::Change { before: original.clone(), after }
            }
            None => LinkEvent::Change { before, after },
        };
        Ok(self.with_link(key, Some(event)))
    }

    pub fn delete_link(&self, model: LinkModel) -> Self {
        let key = model.key();
        let event = match self.links.get(&key) {
            Some(LinkEvent::Delete { .. }) => return self.clone(),
            Some(LinkEvent::Add { .. }) => None,
            Some(LinkEvent::Change { .. }) | None => Some(LinkEvent::Delete { model }),
        };
        self.with_link(key, event)
    }

    /// Forgets `event`. Model data is not restored here.
    pub fn discard(&self, event: &AuthoringEvent) -> Result<Self, AuthoringError> {
        match event {
            AuthoringEvent::Element(event) => {
                let iri = event.iri();
                match self.elements.get(iri) {
                    Some(pending) if pending == event => Ok(self.with_element(iri.clone(), None)),
                    _ => Err(AuthoringError::EventNotFound(iri.to_string())),
                }
            }
            AuthoringEvent::Link(event) => {
                let key = event.model().key();
                match self.links.get(&key) {
                    Some(pending) if pending == event => Ok(self.with_link(key, None)),
                    _ => Err(AuthoringError::EventNotFound(key.to_string())),
                }
            }
        }
    }

    pub fn is_new_element(&self, iri: &ElementIri) -> bool {
        matches!(self.elements.get(iri), Some(ElementEvent::Add { .. }))
    }

    pub fn is_deleted_element(&self, iri: &ElementIri) -> bool {
        matches!(self.elements.get(iri), Some(ElementEvent::Delete { .. }))
    }

    pub fn is_new_link(&self, model: &LinkModel) -> bool {
        matches!(self.links.get(&model.key()), Some(LinkEvent::Add { .. }))
    }

    pub fn is_deleted_link(&self, model: &LinkModel) -> bool {
        matches!(self.links.get(&model.key()), Some(LinkEvent::Delete { .. }))
    }

    /// Drops pending link additions with an endpoint among `deleted`.
    pub fn delete_new_links_connected_to_elements(&self, deleted: &HashSet<ElementIri>) -> Self {
        let dangling: Vec<LinkKey> = self
            .links
            .iter()
            .filter(|(key, event)| {
                matches!(event, LinkEvent::Add { .. })
                    && (deleted.contains(&key.source_id) || deleted.contains(&key.target_id))
            })
            .map(|(key, _)| key.clone())
            .collect();
        if dangling.is_empty() {
            return self.clone();
        }
        let mut next = self.clone();
        let links = Arc::make_mut(&mut next.links);
        for key in dangling {
            links.remove(&key);
        }
        next
    }
}

/// Cells that only exist while a gesture is in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemporaryState {
    elements: Arc<HashSet<ElementIri>>,
    links: Arc<HashSet<LinkKey>>,
}

impl TemporaryState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.links.is_empty()
    }

    pub fn same_as(&self, other: &TemporaryState) -> bool {
        Arc::ptr_eq(&self.elements, &other.elements) && Arc::ptr_eq(&self.links, &other.links)
    }

    pub fn has_element(&self, iri: &ElementIri) -> bool {
        self.elements.contains(iri)
    }

    pub fn has_link(&self, key: &LinkKey) -> bool {
        self.links.contains(key)
    }

    pub fn elements(&self) -> impl Iterator<Item = &ElementIri> {
        self.elements.iter()
    }

    pub fn links(&self) -> impl Iterator<Item = &LinkKey> {
        self.links.iter()
    }

    pub fn add_element(&self, iri: ElementIri) -> Self {
        if self.elements.contains(&iri) {
            return self.clone();
        }
        let mut next = self.clone();
        Arc::make_mut(&mut next.elements).insert(iri);
        next
    }

    pub fn delete_element(&self, iri: &ElementIri) -> Self {
        if !self.elements.contains(iri) {
            return self.clone();
        }
        let mut next = self.clone();
        Arc::make_mut(&mut next.elements).remove(iri);
        next
    }

    pub fn add_link(&self, key: LinkKey) -> Self {
        if self.links.contains(&key) {
            return self.clone();
        }
        let mut next = self.clone();
        Arc::make_mut(&mut next.links).insert(key);
        next
    }

    pub fn delete_link(&self, key: &LinkKey) -> Self {
        if !self.links.contains(key) {
            return self.clone();
        }
        let mut next = self.clone();
        Arc::make_mut(&mut next.links).remove(key);
        next
    }
}
