//! Orchestration of user edits.
//!
//! Every edit opens a history batch, mutates the diagram model, moves the
//! authoring (or temporary) state forward and then stores the batch as one
//! undo step, or discards it when the change must not be undoable. Checks
//! that can reject an edit run before the batch is opened. An edit failing
//! after that point is rolled back, so a rejected edit leaves no trace.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::mem;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EditorConfig;
use crate::core::{same_link, ElementIri, ElementModel, LinkKey, LinkModel, Vector};
use crate::data::provider::{DataProvider, MetadataApi};
use crate::diagram::elements::{ElementId, LinkId, NewLink};
use crate::diagram::history::{Batch, Command, HistoryEntry};
use crate::diagram::model::DiagramModel;
use crate::editor::authoring_state::{AuthoringEvent, AuthoringState, ElementEvent, LinkEvent, TemporaryState};
use crate::editor::events::{EditorEvent, EventSource};
use crate::editor::states::{element_statuses, link_statuses, link_warnings, DiagramStates};
use crate::editor::validation::{
    changed_elements_to_validate, ValidationApi, ValidationOutcome, ValidationQueue, ValidationRequest,
    ValidationResult, ValidationState,
};
use crate::error::Result;

const DROP_GAP: f64 = 20.0;
const FALLBACK_WIDTH: f64 = 100.0;
const FALLBACK_HEIGHT: f64 = 50.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    #[error("The link already exists: {0}")]
    LinkAlreadyExists(String),

    #[error("Link was not created: {0}")]
    LinkNotCreated(String),

    #[error("Element {0} is not on the diagram")]
    ElementNotFound(ElementId),

    #[error("Link {0} is not on the diagram")]
    LinkNotFound(LinkId),

    #[error("Link endpoint already shows {0}")]
    EndpointUnchanged(ElementIri),

    #[error("No data provider configured")]
    NoDataProvider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SelectionItem {
    Element(ElementId),
    Link(LinkId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogType {
    ConnectionsMenu,
    EditEntityForm,
    EditLinkForm,
    EditEntityTypeForm,
    EditLinkLabelForm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialog {
    pub target: SelectionItem,
    pub dialog_type: DialogType,
}

/// Spinner state shown while the diagram loads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadingStatus {
    #[default]
    Idle,
    Loading,
    Failed { status_text: Option<String> },
}

/// Something dropped onto the diagram.
#[derive(Debug, Clone, PartialEq)]
pub enum DragItem {
    Iri(ElementIri),
    Model(ElementModel),
}

/// Builds the link to create from edited link data.
///
/// When the edit swapped the endpoints (either one suffices, since
/// generated IRIs may differ), the diagram endpoints are swapped too.
pub fn create_link_and_change_direction(
    data: &LinkModel,
    original: &LinkModel,
    source_id: ElementId,
    target_id: ElementId,
) -> NewLink {
    let direction_changed = original.source_id == data.target_id || original.target_id == data.source_id;
    if direction_changed {
        NewLink::new(target_id, source_id, data.clone())
    } else {
        NewLink::new(source_id, target_id, data.clone())
    }
}

pub struct EditorController {
    model: DiagramModel,
    config: EditorConfig,
    authoring_state: AuthoringState,
    validation_state: ValidationState,
    temporary_state: TemporaryState,
    selection: Vec<SelectionItem>,
    dialog: Option<Dialog>,
    loading: LoadingStatus,
    metadata_api: Option<Arc<dyn MetadataApi>>,
    validation_api: Option<Arc<dyn ValidationApi>>,
    data_provider: Option<Arc<dyn DataProvider>>,
    validations: ValidationQueue,
    events: EventSource<EditorEvent>,
    cancellation: CancellationToken,
    disposed: bool,
}

impl EditorController {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            model: DiagramModel::new(),
            config,
            authoring_state: AuthoringState::empty(),
            validation_state: ValidationState::empty(),
            temporary_state: TemporaryState::empty(),
            selection: Vec::new(),
            dialog: None,
            loading: LoadingStatus::Idle,
            metadata_api: None,
            validation_api: None,
            data_provider: None,
            validations: ValidationQueue::new(),
            events: EventSource::new(),
            cancellation: CancellationToken::new(),
            disposed: false,
        }
    }

    pub fn with_validation_api(mut self, api: Arc<dyn ValidationApi>) -> Self {
        self.validation_api = Some(api);
        self
    }

    pub fn with_data_provider(mut self, provider: Arc<dyn DataProvider>) -> Self {
        self.data_provider = Some(provider);
        self
    }

    pub fn model(&self) -> &DiagramModel {
        &self.model
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn events(&self) -> &EventSource<EditorEvent> {
        &self.events
    }

    pub fn authoring_state(&self) -> &AuthoringState {
        &self.authoring_state
    }

    pub fn validation_state(&self) -> &ValidationState {
        &self.validation_state
    }

    pub fn temporary_state(&self) -> &TemporaryState {
        &self.temporary_state
    }

    pub fn selection(&self) -> &[SelectionItem] {
        &self.selection
    }

    pub fn dialog(&self) -> Option<&Dialog> {
        self.dialog.as_ref()
    }

    pub fn loading_status(&self) -> &LoadingStatus {
        &self.loading
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    // Batches

    fn in_batch<T>(&mut self, label: &str, action: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let batch = self.model.history.start_batch(label);
        match action(self) {
            Ok(value) => {
                self.model.history.store(batch)?;
                Ok(value)
            }
            Err(e) => {
                self.rollback_batch(batch)?;
                Err(e)
            }
        }
    }

    /// Reverts every mutation recorded in `batch` and closes it.
    fn rollback_batch(&mut self, batch: Batch) -> Result<()> {
        let commands = self.model.history.rollback(batch)?;
        for command in commands.into_iter().rev() {
            self.apply_command(command);
        }
        Ok(())
    }

    fn untracked<T>(&mut self, label: &str, action: impl FnOnce(&mut Self) -> T) -> Result<T> {
        let batch = self.model.history.start_batch(label);
        let value = action(self);
        self.model.history.discard(batch)?;
        Ok(value)
    }

    // Authoring mode

    pub fn in_authoring_mode(&self) -> bool {
        self.metadata_api.is_some()
    }

    pub fn metadata_api(&self) -> Option<&Arc<dyn MetadataApi>> {
        self.metadata_api.as_ref()
    }

    /// Fires `changeMode` only when authoring mode toggles.
    pub fn set_metadata_api(&mut self, api: Option<Arc<dyn MetadataApi>>) {
        let unchanged = match (&self.metadata_api, &api) {
            (Some(current), Some(next)) => Arc::ptr_eq(current, next),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }
        let was_authoring = self.in_authoring_mode();
        self.metadata_api = api;
        if was_authoring != self.in_authoring_mode() {
            info!("Authoring mode {}", if self.in_authoring_mode() { "enabled" } else { "disabled" });
            self.events.trigger(&EditorEvent::ChangeMode);
        }
    }

    // States

    /// Replaces the authoring state and records the previous one as an
    /// undoable command.
    pub fn set_authoring_state(&mut self, state: AuthoringState) {
        if state.same_as(&self.authoring_state) {
            return;
        }
        let previous = mem::replace(&mut self.authoring_state, state);
        self.model.history.register(Command::SetAuthoringState(previous.clone()));
        self.authoring_state_changed(previous);
    }

    fn authoring_state_changed(&mut self, previous: AuthoringState) {
        self.events.trigger(&EditorEvent::ChangeAuthoringState { previous: previous.clone() });
        if self.validation_api.is_some() && self.config.validate_on_change {
            let changed = changed_elements_to_validate(&previous, &self.authoring_state);
            self.validate_elements(changed);
        }
    }

    pub fn set_validation_state(&mut self, state: ValidationState) {
        if state.same_as(&self.validation_state) {
            return;
        }
        let previous = mem::replace(&mut self.validation_state, state);
        self.events.trigger(&EditorEvent::ChangeValidationState { previous });
    }

    pub fn set_temporary_state(&mut self, state: TemporaryState) {
        if state.same_as(&self.temporary_state) {
            return;
        }
        let previous = mem::replace(&mut self.temporary_state, state);
        self.events.trigger(&EditorEvent::ChangeTemporaryState { previous });
    }

    // Selection

    /// Replaces the selection. Unless the halo is disabled, a dialog whose
    /// target is no longer the single selected item is closed.
    pub fn set_selection(&mut self, selection: Vec<SelectionItem>) {
        if selection == self.selection {
            return;
        }
        let previous = mem::replace(&mut self.selection, selection);
        self.events.trigger(&EditorEvent::ChangeSelection { previous });

        if !self.config.disable_halo {
            let selected = match self.selection.as_slice() {
                [single] => Some(*single),
                _ => None,
            };
            if self.dialog.is_some_and(|dialog| Some(dialog.target) != selected) {
                self.hide_dialog();
            }
        }
    }

    pub fn cancel_selection(&mut self) {
        self.set_selection(Vec::new());
    }

    pub fn remove_selected_elements(&mut self) -> Result<()> {
        if self.selection.is_empty() {
            return Ok(());
        }
        let items = self.selection.clone();
        self.cancel_selection();
        self.remove_items(&items)
    }

    fn contains_item(&self, item: SelectionItem) -> bool {
        match item {
            SelectionItem::Element(id) => self.model.get_element(id).is_some(),
            SelectionItem::Link(id) => self.model.get_link(id).is_some(),
        }
    }

    /// Drops selected cells that are no longer on the diagram.
    fn prune_selection(&mut self) {
        let remaining: Vec<SelectionItem> =
            self.selection.iter().copied().filter(|item| self.contains_item(*item)).collect();
        if remaining.len() < self.selection.len() {
            self.set_selection(remaining);
        }
    }

    // Dialogs

    pub fn show_dialog(&mut self, target: SelectionItem, dialog_type: DialogType) {
        self.dialog = Some(Dialog { target, dialog_type });
        self.events.trigger(&EditorEvent::ToggleDialog { is_opened: true });
    }

    /// Closes the open dialog. Closing a dialog opened on a temporary cell
    /// throws away the whole temporary state.
    pub fn hide_dialog(&mut self) {
        let Some(dialog) = self.dialog.take() else {
            return;
        };
        let temporary_target = match dialog.target {
            SelectionItem::Element(id) => {
                self.model.get_element(id).is_some_and(|element| self.temporary_state.has_element(element.iri()))
            }
            SelectionItem::Link(id) => {
                self.model.get_link(id).is_some_and(|link| self.temporary_state.has_link(&link.data.key()))
            }
        };
        if temporary_target {
            if let Err(e) = self.reset_temporary_state() {
                warn!("Failed to reset temporary state: {}", e);
            }
        }
        self.events.trigger(&EditorEvent::ToggleDialog { is_opened: false });
    }

    // Entities

    /// Places a new entity on the diagram, expanded.
    ///
    /// A temporary entity is tracked in the temporary state and its
    /// creation is not undoable; otherwise it becomes a pending addition.
    pub fn create_new_entity(&mut self, data: ElementModel, temporary: bool) -> Result<ElementId> {
        let batch = self.model.history.start_batch("Create new entity");
        let id = self.model.create_element(data.clone(), None);
        self.model.set_element_expanded(id, true);
        if temporary {
            self.set_temporary_state(self.temporary_state.add_element(data.id));
            self.model.history.discard(batch)?;
        } else {
            self.set_authoring_state(self.authoring_state.add_element(data));
            self.model.history.store(batch)?;
        }
        Ok(id)
    }

    /// Replaces the data of every element showing `iri`. No-op when the
    /// entity is not on the diagram.
    pub fn change_entity_data(&mut self, iri: &ElementIri, data: ElementModel) -> Result<()> {
        let Some(previous) = self.model.elements_with_iri(iri).next().map(|element| element.data.clone()) else {
            return Ok(());
        };
        let state = self.authoring_state.change_element(previous, data.clone())?;
        self.in_batch("Edit entity", |editor| {
            editor.model.set_element_data(iri, data);
            editor.set_authoring_state(state);
            Ok(())
        })
    }

    /// Marks an entity as deleted. The entity stays on the diagram; pending
    /// new links attached to it are removed.
    pub fn delete_entity(&mut self, iri: &ElementIri) -> Result<()> {
        let elements: Vec<ElementId> = self.model.elements_with_iri(iri).map(|element| element.id).collect();
        let Some(first) = elements.first().and_then(|id| self.model.get_element(*id)) else {
            return Ok(());
        };
        let data = first.data.clone();
        let state = self.authoring_state.clone();
        if state.is_deleted_element(iri) {
            return Ok(());
        }
        let event = state.element_event(iri).cloned();

        self.in_batch("Delete entity", |editor| {
            let new_links: BTreeSet<LinkId> = elements
                .iter()
                .flat_map(|id| editor.model.links_of(*id))
                .filter(|link| state.is_new_link(&link.data))
                .map(|link| link.id)
                .collect();
            for link in new_links {
                editor.model.remove_link(link);
            }
            if let Some(event) = event {
                editor.discard_change(&AuthoringEvent::Element(event))?;
            }
            let deleted = HashSet::from([iri.clone()]);
            editor.set_authoring_state(state.delete_element(data).delete_new_links_connected_to_elements(&deleted));
            Ok(())
        })?;
        self.prune_selection();
        Ok(())
    }

    // Links

    /// Places `link` between its two diagram elements.
    ///
    /// Fails before touching anything when an identical link already
    /// connects the same elements, or when an endpoint does not show the
    /// IRI named in the link data.
    pub fn create_new_link(&mut self, link: NewLink, temporary: bool) -> Result<LinkId> {
        if self.model.find_link(&link.data.link_type_id, link.source_id, link.target_id).is_some() {
            return Err(EditorError::LinkAlreadyExists(link.data.key().to_string()).into());
        }
        let source = self.model.get_element(link.source_id).ok_or(EditorError::ElementNotFound(link.source_id))?;
        let target = self.model.get_element(link.target_id).ok_or(EditorError::ElementNotFound(link.target_id))?;
        if source.iri() != &link.data.source_id || target.iri() != &link.data.target_id {
            return Err(EditorError::LinkNotCreated(link.data.key().to_string()).into());
        }

        let batch = self.model.history.start_batch("Create new link");
        let created = self.model.create_links(&link.data);
        let placed = created.into_iter().find(|id| {
            self.model
                .get_link(*id)
                .is_some_and(|placed| placed.source_id == link.source_id && placed.target_id == link.target_id)
        });
        let Some(id) = placed else {
            self.rollback_batch(batch)?;
            return Err(EditorError::LinkNotCreated(link.data.key().to_string()).into());
        };
        if !link.vertices.is_empty() {
            self.model.set_link_vertices(id, link.vertices);
        }
        if temporary {
            self.set_temporary_state(self.temporary_state.add_link(link.data.key()));
            self.model.history.discard(batch)?;
        } else {
            self.set_authoring_state(self.authoring_state.add_link(link.data));
            self.model.history.store(batch)?;
        }
        Ok(id)
    }

    /// Links loaded from the data source, placed without authoring events.
    pub fn restore_links(&mut self, links: &[LinkModel]) -> Result<Vec<LinkId>> {
        self.in_batch("Restore links", |editor| {
            Ok(links.iter().flat_map(|link| editor.model.create_links(link)).collect())
        })
    }

    /// Changes link data in place when the identity is kept, otherwise
    /// records a deletion of the old link plus an addition of the new one.
    pub fn change_link(&mut self, old: &LinkModel, new: &LinkModel) -> Result<()> {
        if same_link(old, new) {
            let state = self.authoring_state.change_link(old.clone(), new.clone())?;
            return self.in_batch("Change link", |editor| {
                editor.model.set_link_data(old, new.clone());
                editor.set_authoring_state(state);
                Ok(())
            });
        }
        let was_new = self.authoring_state.is_new_link(old);
        let state = self.authoring_state.delete_link(old.clone()).add_link(new.clone());
        self.in_batch("Change link", |editor| {
            if was_new {
                let stale: Vec<LinkId> = editor.model.links_like(old).map(|link| link.id).collect();
                for id in stale {
                    editor.model.remove_link(id);
                }
            }
            editor.model.create_links(new);
            editor.set_authoring_state(state);
            Ok(())
        })?;
        self.prune_selection();
        Ok(())
    }

    pub fn move_link_source(&mut self, link: LinkId, new_source: ElementId) -> Result<LinkId> {
        self.move_link_endpoint(link, new_source, true)
    }

    pub fn move_link_target(&mut self, link: LinkId, new_target: ElementId) -> Result<LinkId> {
        self.move_link_endpoint(link, new_target, false)
    }

    fn move_link_endpoint(&mut self, link: LinkId, endpoint: ElementId, is_source: bool) -> Result<LinkId> {
        let link = self.model.get_link(link).cloned().ok_or(EditorError::LinkNotFound(link))?;
        let element = self.model.get_element(endpoint).ok_or(EditorError::ElementNotFound(endpoint))?;
        let (current, current_iri) =
            if is_source { (link.source_id, &link.data.source_id) } else { (link.target_id, &link.data.target_id) };
        if endpoint == current {
            return Ok(link.id);
        }
        // another copy of the same entity: the link data would not change
        if element.iri() == current_iri {
            return Err(EditorError::EndpointUnchanged(element.iri().clone()).into());
        }
        let mut data = link.data.clone();
        let (source_id, target_id) = if is_source {
            data.source_id = element.iri().clone();
            (endpoint, link.target_id)
        } else {
            data.target_id = element.iri().clone();
            (link.source_id, endpoint)
        };

        self.in_batch("Move link to another element", |editor| {
            editor.change_link(&link.data, &data)?;
            let moved = editor
                .model
                .find_link(&link.type_id, source_id, target_id)
                .map(|moved| moved.id)
                .ok_or_else(|| EditorError::LinkNotCreated(data.key().to_string()))?;
            editor.model.set_link_vertices(moved, link.vertices.clone());
            Ok(moved)
        })
    }

    /// Records the deletion of a link. Links that were only pending
    /// additions are removed from the diagram instead.
    pub fn delete_link(&mut self, data: &LinkModel) -> Result<()> {
        if self.authoring_state.is_deleted_link(data) {
            return Ok(());
        }
        let was_new = self.authoring_state.is_new_link(data);
        let state = self.authoring_state.delete_link(data.clone());
        self.in_batch("Delete link", |editor| {
            if was_new {
                let placed: Vec<LinkId> = editor.model.links_like(data).map(|link| link.id).collect();
                for id in placed {
                    editor.model.remove_link(id);
                }
            }
            editor.set_authoring_state(state);
            Ok(())
        })?;
        self.prune_selection();
        Ok(())
    }

    /// Removes cells from the diagram.
    ///
    /// Pending events of removed elements are discarded first. Links are
    /// removed only while they are pending additions; existing links must be
    /// deleted through [`EditorController::delete_link`].
    pub fn remove_items(&mut self, items: &[SelectionItem]) -> Result<()> {
        self.in_batch("Remove items", |editor| {
            let mut deleted = HashSet::new();
            for item in items {
                match *item {
                    SelectionItem::Element(id) => {
                        let Some(iri) = editor.model.get_element(id).map(|element| element.iri().clone()) else {
                            continue;
                        };
                        if let Some(event) = editor.authoring_state.element_event(&iri).cloned() {
                            editor.discard_change(&AuthoringEvent::Element(event))?;
                        }
                        editor.model.remove_element(id);
                        deleted.insert(iri);
                    }
                    SelectionItem::Link(id) => {
                        let Some(data) = editor.model.get_link(id).map(|link| link.data.clone()) else {
                            continue;
                        };
                        if editor.authoring_state.is_new_link(&data) {
                            editor.delete_link(&data)?;
                        }
                    }
                }
            }
            if !deleted.is_empty() {
                let state = editor.authoring_state.delete_new_links_connected_to_elements(&deleted);
                editor.set_authoring_state(state);
            }
            Ok(())
        })?;
        self.prune_selection();
        Ok(())
    }

    /// Reverts the model-level effect of a pending event and forgets it.
    pub fn discard_change(&mut self, event: &AuthoringEvent) -> Result<()> {
        let state = self.authoring_state.discard(event)?;
        self.in_batch("Discard change", |editor| {
            match event {
                AuthoringEvent::Element(ElementEvent::Add { after }) => {
                    let placed: Vec<ElementId> =
                        editor.model.elements_with_iri(&after.id).map(|element| element.id).collect();
                    for id in placed {
                        editor.model.remove_element(id);
                    }
                }
                AuthoringEvent::Element(ElementEvent::Change { before, after }) => {
                    editor.model.set_element_data(&after.id, before.clone());
                }
                AuthoringEvent::Link(LinkEvent::Add { after }) => {
                    let placed: Vec<LinkId> = editor.model.links_like(after).map(|link| link.id).collect();
                    for id in placed {
                        editor.model.remove_link(id);
                    }
                }
                AuthoringEvent::Link(LinkEvent::Change { before, after }) => {
                    editor.model.set_link_data(after, before.clone());
                }
                AuthoringEvent::Element(ElementEvent::Delete { .. })
                | AuthoringEvent::Link(LinkEvent::Delete { .. }) => {}
            }
            editor.set_authoring_state(state);
            Ok(())
        })?;
        self.prune_selection();
        Ok(())
    }

    // Temporary cells

    pub fn remove_temporary_element(&mut self, id: ElementId) -> Result<()> {
        let Some(iri) = self.model.get_element(id).map(|element| element.iri().clone()) else {
            return Ok(());
        };
        self.untracked("Remove temporary element", |editor| editor.model.remove_element(id))?;
        self.set_temporary_state(self.temporary_state.delete_element(&iri));
        self.prune_selection();
        Ok(())
    }

    pub fn remove_temporary_link(&mut self, id: LinkId) -> Result<()> {
        let Some(key) = self.model.get_link(id).map(|link| link.data.key()) else {
            return Ok(());
        };
        self.untracked("Remove temporary link", |editor| editor.model.remove_link(id))?;
        self.set_temporary_state(self.temporary_state.delete_link(&key));
        self.prune_selection();
        Ok(())
    }

    /// Removes every temporary cell from the diagram.
    pub fn reset_temporary_state(&mut self) -> Result<()> {
        let elements: Vec<ElementId> = self
            .model
            .elements()
            .filter(|element| self.temporary_state.has_element(element.iri()))
            .map(|element| element.id)
            .collect();
        for id in elements {
            self.remove_temporary_element(id)?;
        }
        let links: Vec<LinkId> = self
            .model
            .links()
            .filter(|link| self.temporary_state.has_link(&link.data.key()))
            .map(|link| link.id)
            .collect();
        for id in links {
            self.remove_temporary_link(id)?;
        }
        if !self.temporary_state.is_empty() {
            self.set_temporary_state(TemporaryState::empty());
        }
        Ok(())
    }

    /// Turns a temporary target and the temporary link leading to it into
    /// real cells, re-created through the regular creation path as one
    /// undo step. Returns the new target and link.
    pub fn commit_temporary_connection(
        &mut self,
        source: ElementId,
        target: ElementId,
        link: LinkId,
        element_data: ElementModel,
        link_data: LinkModel,
    ) -> Result<(ElementId, LinkId)> {
        let target_element = self.model.get_element(target).ok_or(EditorError::ElementNotFound(target))?;
        let is_new_element = target_element.iri() == &element_data.id;
        let position = target_element.position;
        let original = self.model.get_link(link).ok_or(EditorError::LinkNotFound(link))?.data.clone();
        let source_iri = self.model.get_element(source).ok_or(EditorError::ElementNotFound(source))?.iri().clone();
        let planned = create_link_and_change_direction(&link_data, &original, source, target);
        let (expected_source, expected_target) = if planned.source_id == source {
            (&source_iri, &element_data.id)
        } else {
            (&element_data.id, &source_iri)
        };
        if &link_data.source_id != expected_source || &link_data.target_id != expected_target {
            return Err(EditorError::LinkNotCreated(link_data.key().to_string()).into());
        }

        self.remove_temporary_link(link)?;
        self.remove_temporary_element(target)?;

        self.in_batch("Create new connection", |editor| {
            let new_target = editor.model.create_element(element_data.clone(), None);
            editor.model.set_element_position(new_target, position);
            if is_new_element {
                editor.model.set_element_expanded(new_target, true);
                editor.set_authoring_state(editor.authoring_state.add_element(element_data));
            }
            let new_link = create_link_and_change_direction(&link_data, &original, source, new_target);
            let id = editor.create_new_link(new_link, false)?;
            Ok((new_target, id))
        })
    }

    // Layout helpers

    pub fn set_element_expanded(&mut self, id: ElementId, expanded: bool) {
        self.model.set_element_expanded(id, expanded);
    }

    /// Drops entities onto the diagram stacked vertically, the first one
    /// centered on `position`, then selects them.
    pub fn on_drag_drop(&mut self, items: Vec<DragItem>, position: Vector) -> Result<Vec<ElementId>> {
        let placed = self.in_batch("Drag and drop onto diagram", |editor| {
            let mut placed = Vec::with_capacity(items.len());
            let (mut x, mut y) = (position.x, position.y);
            for (index, item) in items.into_iter().enumerate() {
                let data = match item {
                    DragItem::Iri(iri) => ElementModel::new(iri),
                    DragItem::Model(model) => model,
                };
                let id = editor.model.create_element(data, None);
                let size = editor.model.get_element(id).map(|element| element.size).unwrap_or_default();
                let width = if size.width == 0.0 { FALLBACK_WIDTH } else { size.width };
                let height = if size.height == 0.0 { FALLBACK_HEIGHT } else { size.height };
                if index == 0 {
                    x -= width / 2.0;
                    y -= height / 2.0;
                }
                editor.model.set_element_position(id, Vector::new(x, y));
                y += height + DROP_GAP;
                placed.push(id);
            }
            Ok(placed)
        })?;
        self.set_selection(placed.iter().copied().map(SelectionItem::Element).collect());
        self.events.trigger(&EditorEvent::AddElements { elements: placed.clone() });
        Ok(placed)
    }

    /// Loads the entities nested in a group and places them inside it.
    /// The placement is not undoable.
    pub async fn load_group_content(&mut self, group: ElementId) -> Result<Vec<ElementId>> {
        let provider = self.data_provider.clone().ok_or(EditorError::NoDataProvider)?;
        let iri = self.model.get_element(group).ok_or(EditorError::ElementNotFound(group))?.iri().clone();
        let models: BTreeMap<ElementIri, ElementModel> =
            provider.load_embedded_elements(iri.clone()).await?.into_iter().collect();
        debug!("Loaded {} embedded elements of {}", models.len(), iri);
        self.untracked("Load group content", |editor| {
            models.into_values().map(|data| editor.model.create_element(data, Some(group))).collect()
        })
    }

    // Undo / redo

    fn apply_command(&mut self, command: Command) -> Command {
        match command {
            Command::Model(command) => Command::Model(self.model.apply(command)),
            Command::SetAuthoringState(state) => {
                let previous = mem::replace(&mut self.authoring_state, state);
                self.authoring_state_changed(previous.clone());
                Command::SetAuthoringState(previous)
            }
        }
    }

    fn replay(&mut self, entry: HistoryEntry) -> HistoryEntry {
        let commands = entry.commands.into_iter().rev().map(|command| self.apply_command(command)).collect();
        HistoryEntry { label: entry.label, commands }
    }

    /// Reverts the latest undo step. Returns false when there is none.
    pub fn undo(&mut self) -> Result<bool> {
        let Some(entry) = self.model.history.pop_undo()? else {
            return Ok(false);
        };
        debug!("Undo '{}'", entry.label);
        let redo = self.replay(entry);
        self.model.history.push_redo(redo);
        self.prune_selection();
        Ok(true)
    }

    pub fn redo(&mut self) -> Result<bool> {
        let Some(entry) = self.model.history.pop_redo()? else {
            return Ok(false);
        };
        debug!("Redo '{}'", entry.label);
        let undo = self.replay(entry);
        self.model.history.push_undo(undo);
        self.prune_selection();
        Ok(true)
    }

    // Validation

    /// Sends a validation request for every listed entity on the diagram.
    pub fn validate_elements(&mut self, iris: impl IntoIterator<Item = ElementIri>) {
        let Some(api) = self.validation_api.clone() else {
            return;
        };
        if self.disposed {
            return;
        }
        let iris: BTreeSet<ElementIri> = iris.into_iter().collect();
        let mut state = self.validation_state.clone();
        let mut requests = Vec::new();
        for iri in iris {
            let Some(element) = self.model.elements_with_iri(&iri).next() else {
                continue;
            };
            let outbound: BTreeMap<LinkKey, LinkModel> = self
                .model
                .links()
                .filter(|link| link.data.source_id == iri)
                .map(|link| (link.data.key(), link.data.clone()))
                .collect();
            let keys: Vec<LinkKey> = outbound.keys().cloned().collect();
            state = state.start_loading(&iri, &keys);
            requests.push(ValidationRequest {
                target: element.data.clone(),
                outbound_links: outbound.into_values().collect(),
                state: self.authoring_state.clone(),
                cancellation: self.cancellation.clone(),
            });
        }
        if requests.is_empty() {
            return;
        }
        debug!("Validating {} entities", requests.len());
        self.set_validation_state(state);
        for request in requests {
            self.validations.dispatch(Arc::clone(&api), request);
        }
    }

    fn apply_validation(&mut self, outcome: ValidationOutcome) {
        if self.disposed {
            return;
        }
        if !self.validations.complete(&outcome) {
            debug!("Dropping stale validation of {}", outcome.iri);
            return;
        }
        if let ValidationResult::Completed(Err(e)) = &outcome.result {
            warn!("Validation of {} failed: {}", outcome.iri, e);
        }
        let state = outcome.into_state(&self.validation_state);
        self.set_validation_state(state);
    }

    /// Applies every validation result that is already available.
    /// Returns how many were received, stale ones included.
    pub fn poll_validation(&mut self) -> usize {
        let mut received = 0;
        while let Some(outcome) = self.validations.try_next_outcome() {
            received += 1;
            self.apply_validation(outcome);
        }
        received
    }

    /// Waits for all in-flight validation requests and applies their results.
    pub async fn settle_validation(&mut self) {
        while let Some(outcome) = self.validations.next_outcome().await {
            self.apply_validation(outcome);
        }
    }

    pub fn pending_validations(&self) -> usize {
        self.validations.in_flight()
    }

    // Loading status

    pub fn on_loading_start(&mut self) {
        self.loading = LoadingStatus::Loading;
    }

    pub fn on_loading_success(&mut self) {
        self.loading = LoadingStatus::Idle;
    }

    pub fn on_loading_error(&mut self, error: Option<&str>) {
        warn!("Diagram loading failed: {}", error.unwrap_or("unknown error"));
        self.loading = LoadingStatus::Failed { status_text: error.map(str::to_string) };
    }

    /// Display states of every cell, or `None` outside authoring mode.
    pub fn diagram_states(&self) -> Option<DiagramStates> {
        if !self.in_authoring_mode() {
            return None;
        }
        Some(DiagramStates {
            elements: element_statuses(&self.model, &self.authoring_state, &self.temporary_state),
            links: link_statuses(&self.model, &self.authoring_state, &self.temporary_state),
            warnings: link_warnings(&self.model, &self.validation_state),
        })
    }

    /// Cancels outstanding validation and detaches all listeners. Results
    /// arriving afterwards are ignored.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.cancellation.cancel();
        self.validations.clear();
        self.events.clear();
        self.dialog = None;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LinkTypeIri;

    fn knows(source: &str, target: &str) -> LinkModel {
        LinkModel::new(LinkTypeIri::from("http://example.org/knows"), source.into(), target.into())
    }

    #[test]
    fn test_direction_change_swaps_endpoints() {
        let original = knows("http://example.org/a", "http://example.org/b");
        let reversed = knows("http://example.org/b", "http://example.org/a");

        let link = create_link_and_change_direction(&reversed, &original, ElementId(1), ElementId(2));
        assert_eq!((link.source_id, link.target_id), (ElementId(2), ElementId(1)));

        let kept = create_link_and_change_direction(&original, &original, ElementId(1), ElementId(2));
        assert_eq!((kept.source_id, kept.target_id), (ElementId(1), ElementId(2)));
    }

    #[test]
    fn test_drop_stacks_elements_around_point() {
        let mut editor = EditorController::new(EditorConfig::default());
        let placed = editor
            .on_drag_drop(
                vec![
                    DragItem::Iri(ElementIri::from("http://example.org/a")),
                    DragItem::Iri(ElementIri::from("http://example.org/b")),
                ],
                Vector::new(200.0, 100.0),
            )
            .unwrap();

        let first = editor.model().get_element(placed[0]).unwrap();
        let second = editor.model().get_element(placed[1]).unwrap();
        assert_eq!(first.center(), Vector::new(200.0, 100.0));
        assert_eq!(second.position, Vector::new(150.0, 145.0));
        assert_eq!(editor.selection().len(), 2);
    }

    #[test]
    fn test_failure_inside_batch_rolls_back_every_mutation() {
        let mut editor = EditorController::new(EditorConfig::default());
        let placed = editor
            .on_drag_drop(
                vec![
                    DragItem::Iri(ElementIri::from("http://example.org/a")),
                    DragItem::Iri(ElementIri::from("http://example.org/b")),
                ],
                Vector::default(),
            )
            .unwrap();
        let steps = editor.model().history.undo_steps().count();
        let state = editor.authoring_state().clone();

        let result: Result<()> = editor.in_batch("Failing edit", |editor| {
            editor.create_new_entity(ElementModel::new(ElementIri::from("http://example.org/c")), false)?;
            let link = knows("http://example.org/a", "http://example.org/b");
            editor.create_new_link(NewLink::new(placed[0], placed[1], link), false)?;
            Err(EditorError::LinkNotCreated("late failure".to_string()).into())
        });

        assert!(matches!(result, Err(crate::error::Error::Editor(EditorError::LinkNotCreated(_)))));
        assert!(editor.authoring_state().same_as(&state));
        assert_eq!(editor.model().elements().count(), 2);
        assert_eq!(editor.model().links().count(), 0);
        assert_eq!(editor.model().history.undo_steps().count(), steps);
        assert!(!editor.model().history.is_batch_open());
    }

    #[test]
    fn test_loading_status() {
        let mut editor = EditorController::new(EditorConfig::default());
        editor.on_loading_start();
        assert_eq!(editor.loading_status(), &LoadingStatus::Loading);
        editor.on_loading_error(Some("timeout"));
        assert_eq!(editor.loading_status(), &LoadingStatus::Failed { status_text: Some("timeout".to_string()) });
        editor.on_loading_success();
        assert_eq!(editor.loading_status(), &LoadingStatus::Idle);
    }
}
