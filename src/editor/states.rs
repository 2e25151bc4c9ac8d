//! How pending changes are shown on top of the diagram.

use crate::diagram::elements::{ElementId, LinkId};
use crate::diagram::model::DiagramModel;
use crate::editor::authoring_state::{AuthoringEvent, AuthoringState, ElementEvent, LinkEvent, TemporaryState};
use crate::editor::validation::{ValidationError, ValidationState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    Temporary,
    New,
    Changed,
    Deleted,
}

impl ItemState {
    pub fn label(self) -> &'static str {
        match self {
            ItemState::Temporary => "Temporary",
            ItemState::New => "New",
            ItemState::Changed => "Change",
            ItemState::Deleted => "Delete",
        }
    }

    /// Stroke colour of a marked link.
    pub fn color(self) -> &'static str {
        match self {
            ItemState::Temporary => "grey",
            ItemState::New => "green",
            ItemState::Changed => "blue",
            ItemState::Deleted => "red",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementStatus {
    pub element: ElementId,
    pub state: ItemState,
    /// Event to discard when the user reverts; none for temporary elements.
    pub revert: Option<AuthoringEvent>,
}

impl ElementStatus {
    pub fn revert_title(&self) -> Option<&'static str> {
        self.revert.as_ref()?;
        Some(match self.state {
            ItemState::New => "Revert creation of the element",
            ItemState::Changed => "Revert all changes in properties of the element",
            ItemState::Deleted => "Revert deletion of the element",
            ItemState::Temporary => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatus {
    pub link: LinkId,
    pub state: ItemState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningBadge {
    pub link: LinkId,
    pub loading: bool,
    pub error_count: usize,
    /// Error messages, one per line
    pub title: String,
}

/// Everything drawn over the diagram in authoring mode.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramStates {
    pub elements: Vec<ElementStatus>,
    pub links: Vec<LinkStatus>,
    pub warnings: Vec<WarningBadge>,
}

fn element_state(event: &ElementEvent) -> ItemState {
    match event {
        ElementEvent::Add { .. } => ItemState::New,
        ElementEvent::Change { .. } => ItemState::Changed,
        ElementEvent::Delete { .. } => ItemState::Deleted,
    }
}

fn link_state(event: &LinkEvent) -> ItemState {
    match event {
        LinkEvent::Add { .. } => ItemState::New,
        LinkEvent::Change { .. } => ItemState::Changed,
        LinkEvent::Delete { .. } => ItemState::Deleted,
    }
}

pub fn element_statuses(
    model: &DiagramModel,
    authoring: &AuthoringState,
    temporary: &TemporaryState,
) -> Vec<ElementStatus> {
    model
        .elements()
        .filter_map(|element| {
            if temporary.has_element(element.iri()) {
                return Some(ElementStatus { element: element.id, state: ItemState::Temporary, revert: None });
            }
            let event = authoring.element_event(element.iri())?;
            Some(ElementStatus {
                element: element.id,
                state: element_state(event),
                revert: Some(AuthoringEvent::Element(event.clone())),
            })
        })
        .collect()
}

/// Marks links with a pending event, or attached to a deleted entity.
pub fn link_statuses(model: &DiagramModel, authoring: &AuthoringState, temporary: &TemporaryState) -> Vec<LinkStatus> {
    model
        .links()
        .filter_map(|link| {
            let key = link.data.key();
            let state = if temporary.has_link(&key) {
                ItemState::Temporary
            } else if let Some(event) = authoring.link_event(&key) {
                link_state(event)
            } else if authoring.is_deleted_element(&key.source_id) || authoring.is_deleted_element(&key.target_id) {
                ItemState::Deleted
            } else {
                return None;
            };
            Some(LinkStatus { link: link.id, state })
        })
        .collect()
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors.iter().map(|error| error.message.as_str()).collect::<Vec<_>>().join("\n")
}

pub fn link_warnings(model: &DiagramModel, validation: &ValidationState) -> Vec<WarningBadge> {
    model
        .links()
        .filter_map(|link| {
            let state = validation.link(&link.data.key())?;
            Some(WarningBadge {
                link: link.id,
                loading: state.loading,
                error_count: if state.loading { 0 } else { state.errors.len() },
                title: join_messages(&state.errors),
            })
        })
        .collect()
}
