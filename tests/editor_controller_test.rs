use async_trait::async_trait;
use ontodia::config::EditorConfig;
use ontodia::core::{ElementIri, ElementModel, LinkModel, LinkTypeIri, LocalizedLiteral, Vector};
use ontodia::data::{DataProvider, LinkCount, LinkTypesOfRequest, MetadataApi};
use ontodia::diagram::{ElementId, NewLink};
use ontodia::editor::{
    AuthoringEvent, DialogType, DragItem, EditorController, EditorError, EditorEvent, ElementEvent, ItemState,
    LinkEvent, SelectionItem,
};
use ontodia::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct Metadata;

impl MetadataApi for Metadata {}

struct GroupProvider;

#[async_trait]
impl DataProvider for GroupProvider {
    async fn link_types_of(&self, _request: LinkTypesOfRequest) -> Result<Vec<LinkCount>> {
        Ok(Vec::new())
    }

    async fn load_embedded_elements(&self, _group: ElementIri) -> Result<HashMap<ElementIri, ElementModel>> {
        Ok(["http://example.org/b", "http://example.org/a"]
            .into_iter()
            .map(|iri| (ElementIri::from(iri), ElementModel::new(ElementIri::from(iri))))
            .collect())
    }
}

fn iri(value: &str) -> ElementIri {
    ElementIri::from(value)
}

fn entity(value: &str) -> ElementModel {
    ElementModel::new(iri(value))
}

fn knows(source: &str, target: &str) -> LinkModel {
    LinkModel::new(LinkTypeIri::from("http://example.org/knows"), source.into(), target.into())
}

/// Places existing entities, which carry no authoring events.
fn place(editor: &mut EditorController, iris: &[&str]) -> Vec<ElementId> {
    let items = iris.iter().map(|value| DragItem::Iri(iri(value))).collect();
    editor.on_drag_drop(items, Vector::new(0.0, 0.0)).unwrap()
}

fn record_events(editor: &EditorController) -> (Arc<Mutex<Vec<&'static str>>>, ontodia::editor::Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = editor.events().listen(move |event: &EditorEvent| sink.lock().unwrap().push(event.name()));
    (seen, subscription)
}

#[test]
fn test_duplicate_link_leaves_no_trace() {
    let mut editor = EditorController::new(EditorConfig::default());
    let ids = place(&mut editor, &["http://example.org/a", "http://example.org/b"]);
    let link = knows("http://example.org/a", "http://example.org/b");
    editor.create_new_link(NewLink::new(ids[0], ids[1], link.clone()), false).unwrap();

    let steps = editor.model().history.undo_steps().count();
    let state = editor.authoring_state().clone();
    let err = editor.create_new_link(NewLink::new(ids[0], ids[1], link), false).unwrap_err();

    assert!(matches!(err, Error::Editor(EditorError::LinkAlreadyExists(_))));
    assert_eq!(editor.model().history.undo_steps().count(), steps);
    assert!(editor.authoring_state().same_as(&state));
    assert!(!editor.model().history.is_batch_open());
    assert_eq!(editor.model().links().count(), 1);
}

#[test]
fn test_link_with_mismatched_endpoint_is_rejected() {
    let mut editor = EditorController::new(EditorConfig::default());
    let ids = place(&mut editor, &["http://example.org/a", "http://example.org/b"]);
    let wrong = knows("http://example.org/a", "http://example.org/c");

    let err = editor.create_new_link(NewLink::new(ids[0], ids[1], wrong), false).unwrap_err();
    assert!(matches!(err, Error::Editor(EditorError::LinkNotCreated(_))));
    assert!(editor.authoring_state().is_empty());
}

#[test]
fn test_temporary_entity_is_not_undoable() {
    let mut editor = EditorController::new(EditorConfig::default());
    let id = editor.create_new_entity(entity("http://example.org/draft"), true).unwrap();

    assert!(editor.temporary_state().has_element(&iri("http://example.org/draft")));
    assert!(editor.authoring_state().is_empty());
    assert!(editor.model().get_element(id).unwrap().expanded);
    assert!(!editor.model().history.can_undo());
}

#[test]
fn test_undo_and_redo_new_entity() {
    let mut editor = EditorController::new(EditorConfig::default());
    let bob = entity("http://example.org/Bob");
    editor.create_new_entity(bob.clone(), false).unwrap();
    assert!(editor.authoring_state().is_new_element(&bob.id));

    assert!(editor.undo().unwrap());
    assert!(editor.authoring_state().is_empty());
    assert_eq!(editor.model().elements().count(), 0);

    assert!(editor.redo().unwrap());
    assert!(editor.authoring_state().is_new_element(&bob.id));
    assert_eq!(editor.model().elements_with_iri(&bob.id).count(), 1);
    assert!(!editor.redo().unwrap());
}

#[test]
fn test_remove_items_drops_new_entity_and_its_links() {
    let mut editor = EditorController::new(EditorConfig::default());
    let x = editor.create_new_entity(entity("http://example.org/x"), false).unwrap();
    let y = editor.create_new_entity(entity("http://example.org/y"), false).unwrap();
    editor.create_new_link(NewLink::new(x, y, knows("http://example.org/x", "http://example.org/y")), false).unwrap();
    editor.set_selection(vec![SelectionItem::Element(x)]);

    editor.remove_selected_elements().unwrap();

    assert!(editor.model().get_element(x).is_none());
    assert_eq!(editor.model().links().count(), 0);
    assert_eq!(editor.authoring_state().events().count(), 1);
    assert!(editor.authoring_state().is_new_element(&iri("http://example.org/y")));
    assert!(editor.selection().is_empty());
}

#[test]
fn test_change_link_identity_records_delete_and_add() {
    let mut editor = EditorController::new(EditorConfig::default());
    place(&mut editor, &["http://example.org/a", "http://example.org/b", "http://example.org/c"]);
    let old = knows("http://example.org/a", "http://example.org/b");
    let new = knows("http://example.org/a", "http://example.org/c");
    editor.restore_links(&[old.clone()]).unwrap();
    assert!(editor.authoring_state().is_empty());

    editor.change_link(&old, &new).unwrap();

    assert!(editor.authoring_state().is_deleted_link(&old));
    assert!(editor.authoring_state().is_new_link(&new));
    assert_eq!(editor.model().links().count(), 2);
}

#[test]
fn test_move_link_source_keeps_vertices() {
    let mut editor = EditorController::new(EditorConfig::default());
    let ids = place(&mut editor, &["http://example.org/a", "http://example.org/b", "http://example.org/c"]);
    let original = knows("http://example.org/a", "http://example.org/b");
    let bends = vec![Vector::new(5.0, 5.0), Vector::new(15.0, 5.0)];
    let link = editor
        .create_new_link(NewLink::new(ids[0], ids[1], original.clone()).with_vertices(bends.clone()), false)
        .unwrap();

    let moved = editor.move_link_source(link, ids[2]).unwrap();

    let placed = editor.model().get_link(moved).unwrap();
    assert_eq!(placed.source_id, ids[2]);
    assert_eq!(placed.vertices, bends);
    assert_eq!(editor.model().links().count(), 1);
    assert!(editor.authoring_state().is_new_link(&knows("http://example.org/c", "http://example.org/b")));
    assert!(editor.authoring_state().link_event(&original.key()).is_none());

    assert!(editor.undo().unwrap());
    assert_eq!(editor.model().links_like(&original).count(), 1);
    assert!(editor.authoring_state().is_new_link(&original));
}

#[test]
fn test_change_link_keeping_identity_edits_in_place() {
    let mut editor = EditorController::new(EditorConfig::default());
    place(&mut editor, &["http://example.org/a", "http://example.org/b"]);
    let old = knows("http://example.org/a", "http://example.org/b");
    let since = old.clone().with_property("http://example.org/since", LocalizedLiteral::new("2020", None));
    editor.restore_links(&[old.clone()]).unwrap();

    editor.change_link(&old, &since).unwrap();

    assert_eq!(
        editor.authoring_state().link_event(&old.key()),
        Some(&LinkEvent::Change { before: old.clone(), after: since.clone() })
    );
    let placed: Vec<&LinkModel> = editor.model().links().map(|link| &link.data).collect();
    assert_eq!(placed, vec![&since]);

    assert!(editor.undo().unwrap());
    assert!(editor.authoring_state().is_empty());
    let placed: Vec<&LinkModel> = editor.model().links().map(|link| &link.data).collect();
    assert_eq!(placed, vec![&old]);
}

#[test]
fn test_move_onto_copy_of_same_entity_is_rejected() {
    let mut editor = EditorController::new(EditorConfig::default());
    let ids = place(&mut editor, &["http://example.org/a", "http://example.org/b"]);
    let data = knows("http://example.org/a", "http://example.org/b");
    let link = editor.restore_links(&[data.clone()]).unwrap()[0];
    let copy = place(&mut editor, &["http://example.org/a"])[0];
    let steps = editor.model().history.undo_steps().count();

    let err = editor.move_link_source(link, copy).unwrap_err();

    assert!(matches!(err, Error::Editor(EditorError::EndpointUnchanged(_))));
    assert!(editor.authoring_state().link_event(&data.key()).is_none());
    assert!(editor.authoring_state().is_empty());
    assert_eq!(editor.model().history.undo_steps().count(), steps);
    assert_eq!(editor.model().get_link(link).unwrap().source_id, ids[0]);

    assert_eq!(editor.move_link_source(link, ids[0]).unwrap(), link);
    assert!(editor.authoring_state().is_empty());
}

#[test]
fn test_discard_change_removes_every_copy_of_new_link() {
    let mut editor = EditorController::new(EditorConfig::default());
    let ids = place(&mut editor, &["http://example.org/a", "http://example.org/b", "http://example.org/a"]);
    let data = knows("http://example.org/a", "http://example.org/b");
    editor.create_new_link(NewLink::new(ids[0], ids[1], data.clone()), false).unwrap();
    assert_eq!(editor.model().links_like(&data).count(), 2);

    let event = editor.authoring_state().link_event(&data.key()).cloned().unwrap();
    assert_eq!(event, LinkEvent::Add { after: data.clone() });
    editor.discard_change(&AuthoringEvent::Link(event)).unwrap();

    assert!(editor.authoring_state().is_empty());
    assert_eq!(editor.model().links().count(), 0);
}

#[test]
fn test_discard_change_restores_link_data() {
    let mut editor = EditorController::new(EditorConfig::default());
    place(&mut editor, &["http://example.org/a", "http://example.org/b"]);
    let old = knows("http://example.org/a", "http://example.org/b");
    let since = old.clone().with_property("http://example.org/since", LocalizedLiteral::new("2020", None));
    editor.restore_links(&[old.clone()]).unwrap();
    editor.change_link(&old, &since).unwrap();

    let event = editor.authoring_state().link_event(&old.key()).cloned().unwrap();
    editor.discard_change(&AuthoringEvent::Link(event)).unwrap();

    assert!(editor.authoring_state().is_empty());
    let placed: Vec<&LinkModel> = editor.model().links().map(|link| &link.data).collect();
    assert_eq!(placed, vec![&old]);
}

#[test]
fn test_discard_change_restores_entity_data() {
    let mut editor = EditorController::new(EditorConfig::default());
    place(&mut editor, &["http://example.org/a"]);
    let a = iri("http://example.org/a");
    let edited = entity("http://example.org/a").with_label("Alice", Some("en"));
    editor.change_entity_data(&a, edited.clone()).unwrap();

    let event = editor.authoring_state().element_event(&a).cloned().unwrap();
    assert_eq!(event, ElementEvent::Change { before: entity("http://example.org/a"), after: edited });

    editor.discard_change(&AuthoringEvent::Element(event)).unwrap();
    assert!(editor.authoring_state().is_empty());
    let element = editor.model().elements_with_iri(&a).next().unwrap();
    assert!(element.data.label.is_empty());
}

#[test]
fn test_delete_entity_keeps_element_and_drops_new_links() {
    let mut editor = EditorController::new(EditorConfig::default());
    editor.set_metadata_api(Some(Arc::new(Metadata)));
    let ids = place(&mut editor, &["http://example.org/a", "http://example.org/b"]);
    editor
        .create_new_link(NewLink::new(ids[0], ids[1], knows("http://example.org/a", "http://example.org/b")), false)
        .unwrap();

    editor.delete_entity(&iri("http://example.org/a")).unwrap();

    assert!(editor.authoring_state().is_deleted_element(&iri("http://example.org/a")));
    assert_eq!(editor.authoring_state().links().count(), 0);
    assert_eq!(editor.model().links().count(), 0);
    let states = editor.diagram_states().unwrap();
    assert_eq!(states.elements.len(), 1);
    assert_eq!(states.elements[0].element, ids[0]);
    assert_eq!(states.elements[0].state, ItemState::Deleted);
}

#[test]
fn test_authoring_events_reach_listeners() {
    let mut editor = EditorController::new(EditorConfig::default());
    let (seen, subscription) = record_events(&editor);

    editor.create_new_entity(entity("http://example.org/Bob"), false).unwrap();
    assert_eq!(seen.lock().unwrap().as_slice(), &["changeAuthoringState"]);

    subscription.dispose();
    editor.create_new_entity(entity("http://example.org/Alice"), false).unwrap();
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn test_selection_change_closes_dialog() {
    let mut editor = EditorController::new(EditorConfig::default());
    let ids = place(&mut editor, &["http://example.org/a", "http://example.org/b"]);
    editor.set_selection(vec![SelectionItem::Element(ids[0])]);
    let (seen, _subscription) = record_events(&editor);

    editor.show_dialog(SelectionItem::Element(ids[0]), DialogType::EditEntityForm);
    assert!(editor.dialog().is_some());

    editor.set_selection(vec![SelectionItem::Element(ids[1])]);
    assert!(editor.dialog().is_none());
    assert_eq!(seen.lock().unwrap().as_slice(), &["toggleDialog", "changeSelection", "toggleDialog"]);
}

#[test]
fn test_disabled_halo_keeps_dialog_open() {
    let config = EditorConfig { disable_halo: true, ..EditorConfig::default() };
    let mut editor = EditorController::new(config);
    let ids = place(&mut editor, &["http://example.org/a", "http://example.org/b"]);

    editor.show_dialog(SelectionItem::Element(ids[0]), DialogType::ConnectionsMenu);
    editor.set_selection(vec![SelectionItem::Element(ids[1])]);
    assert_eq!(editor.dialog().map(|dialog| dialog.dialog_type), Some(DialogType::ConnectionsMenu));
}

#[test]
fn test_closing_dialog_on_temporary_cell_resets_temporary_state() {
    let mut editor = EditorController::new(EditorConfig::default());
    let draft = editor.create_new_entity(entity("http://example.org/draft"), true).unwrap();

    editor.show_dialog(SelectionItem::Element(draft), DialogType::EditEntityForm);
    editor.hide_dialog();

    assert!(editor.temporary_state().is_empty());
    assert!(editor.model().get_element(draft).is_none());
}

#[test]
fn test_commit_temporary_connection_is_one_step() {
    let mut editor = EditorController::new(EditorConfig::default());
    let ids = place(&mut editor, &["http://example.org/a"]);
    let target = editor.create_new_entity(entity("http://example.org/t"), true).unwrap();
    let link_data = knows("http://example.org/a", "http://example.org/t");
    let link = editor.create_new_link(NewLink::new(ids[0], target, link_data.clone()), true).unwrap();
    assert!(editor.temporary_state().has_link(&link_data.key()));
    let steps = editor.model().history.undo_steps().count();

    let (new_target, new_link) = editor
        .commit_temporary_connection(ids[0], target, link, entity("http://example.org/t"), link_data.clone())
        .unwrap();

    assert!(editor.temporary_state().is_empty());
    assert!(editor.authoring_state().is_new_element(&iri("http://example.org/t")));
    assert!(editor.authoring_state().is_new_link(&link_data));
    assert_eq!(editor.model().get_link(new_link).unwrap().target_id, new_target);
    assert_eq!(editor.model().history.undo_steps().count(), steps + 1);

    assert!(editor.undo().unwrap());
    assert!(editor.authoring_state().is_empty());
    assert_eq!(editor.model().elements().count(), 1);
    assert_eq!(editor.model().links().count(), 0);
}

#[test]
fn test_commit_with_foreign_link_source_leaves_no_trace() {
    let mut editor = EditorController::new(EditorConfig::default());
    let ids = place(&mut editor, &["http://example.org/a"]);
    let target = editor.create_new_entity(entity("http://example.org/t"), true).unwrap();
    let link_data = knows("http://example.org/a", "http://example.org/t");
    let link = editor.create_new_link(NewLink::new(ids[0], target, link_data.clone()), true).unwrap();
    let steps = editor.model().history.undo_steps().count();

    let foreign = knows("http://example.org/z", "http://example.org/t");
    let err = editor
        .commit_temporary_connection(ids[0], target, link, entity("http://example.org/t"), foreign)
        .unwrap_err();

    assert!(matches!(err, Error::Editor(EditorError::LinkNotCreated(_))));
    assert!(editor.authoring_state().is_empty());
    assert!(editor.temporary_state().has_element(&iri("http://example.org/t")));
    assert!(editor.temporary_state().has_link(&link_data.key()));
    assert_eq!(editor.model().elements().count(), 2);
    assert_eq!(editor.model().links().count(), 1);
    assert_eq!(editor.model().history.undo_steps().count(), steps);
}

#[test]
fn test_mode_change_fires_on_toggle_only() {
    let mut editor = EditorController::new(EditorConfig::default());
    let (seen, _subscription) = record_events(&editor);
    assert!(editor.diagram_states().is_none());

    editor.set_metadata_api(Some(Arc::new(Metadata)));
    editor.set_metadata_api(Some(Arc::new(Metadata)));
    assert!(editor.in_authoring_mode());
    editor.set_metadata_api(None);

    assert_eq!(seen.lock().unwrap().as_slice(), &["changeMode", "changeMode"]);
}

#[tokio::test]
async fn test_group_content_is_placed_in_iri_order() {
    let mut editor = EditorController::new(EditorConfig::default()).with_data_provider(Arc::new(GroupProvider));
    let group = place(&mut editor, &["http://example.org/group"])[0];
    let steps = editor.model().history.undo_steps().count();

    let placed = editor.load_group_content(group).await.unwrap();

    assert_eq!(placed.len(), 2);
    let first = editor.model().get_element(placed[0]).unwrap();
    assert_eq!(first.iri(), &iri("http://example.org/a"));
    assert_eq!(first.group, Some(group));
    assert_eq!(editor.model().history.undo_steps().count(), steps);
}

#[tokio::test]
async fn test_group_content_needs_a_provider() {
    let mut editor = EditorController::new(EditorConfig::default());
    let group = place(&mut editor, &["http://example.org/group"])[0];
    let err = editor.load_group_content(group).await.unwrap_err();
    assert!(matches!(err, Error::Editor(EditorError::NoDataProvider)));
}

#[test]
fn test_dispose_detaches_everything() {
    let mut editor = EditorController::new(EditorConfig::default());
    let (_seen, _subscription) = record_events(&editor);
    assert_eq!(editor.events().listener_count(), 1);

    editor.dispose();

    assert!(editor.is_disposed());
    assert!(editor.cancellation().is_cancelled());
    assert_eq!(editor.events().listener_count(), 0);
}
