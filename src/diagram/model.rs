//! The diagram: elements, links and the history recording their changes.

use std::collections::BTreeMap;
use tracing::debug;

use crate::core::{same_link, ElementIri, ElementModel, LinkModel, LinkTypeIri, Size, Vector};
use crate::diagram::elements::{Element, ElementId, Link, LinkId};
use crate::diagram::history::{CommandHistory, ModelCommand};

const DEFAULT_SIZE: Size = Size { width: 100.0, height: 50.0 };

/// Elements and links keyed by monotonic ids, so iteration follows
/// creation order.
///
/// Every `create_*`, `remove_*` and `set_*` method applies its change and
/// registers the inverse with [`DiagramModel::history`].
#[derive(Debug, Default)]
pub struct DiagramModel {
    elements: BTreeMap<ElementId, Element>,
    links: BTreeMap<LinkId, Link>,
    next_element: u64,
    next_link: u64,
    pub history: CommandHistory,
}

impl DiagramModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn get_element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn get_link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(&id)
    }

    pub fn elements_with_iri<'a>(&'a self, iri: &'a ElementIri) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements.values().filter(move |element| element.iri() == iri)
    }

    pub fn links_of(&self, element: ElementId) -> impl Iterator<Item = &Link> {
        self.links.values().filter(move |link| link.source_id == element || link.target_id == element)
    }

    /// Links with the same identity as `data`.
    pub fn links_like<'a>(&'a self, data: &'a LinkModel) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.values().filter(move |link| same_link(&link.data, data))
    }

    pub fn find_link(&self, type_id: &LinkTypeIri, source_id: ElementId, target_id: ElementId) -> Option<&Link> {
        self.links.values().find(|link| {
            &link.type_id == type_id && link.source_id == source_id && link.target_id == target_id
        })
    }

    /// Applies `command` without recording it and returns its inverse.
    ///
    /// Commands addressing missing cells are no-ops whose inverse is the
    /// command itself, so replaying a stale history cannot fail.
    pub fn apply(&mut self, command: ModelCommand) -> ModelCommand {
        match command {
            ModelCommand::InsertElement(element) => {
                let id = element.id;
                self.next_element = self.next_element.max(id.0);
                self.elements.insert(id, element);
                ModelCommand::RemoveElement(id)
            }
            ModelCommand::RemoveElement(id) => match self.elements.remove(&id) {
                Some(element) => ModelCommand::InsertElement(element),
                None => ModelCommand::RemoveElement(id),
            },
            ModelCommand::InsertLink(link) => {
                let id = link.id;
                self.next_link = self.next_link.max(id.0);
                self.links.insert(id, link);
                ModelCommand::RemoveLink(id)
            }
            ModelCommand::RemoveLink(id) => match self.links.remove(&id) {
                Some(link) => ModelCommand::InsertLink(link),
                None => ModelCommand::RemoveLink(id),
            },
            ModelCommand::SetElementData { iri, data } => {
                let mut previous = None;
                for element in self.elements.values_mut().filter(|element| element.iri() == &iri) {
                    previous.get_or_insert_with(|| element.data.clone());
                    element.data = data.clone();
                }
                match previous {
                    // restoring must address the new IRI when the data renamed it
                    Some(previous) => ModelCommand::SetElementData { iri: data.id, data: previous },
                    None => ModelCommand::SetElementData { iri, data },
                }
            }
            ModelCommand::SetLinkData { key, data } => {
                let mut previous = None;
                for link in self.links.values_mut().filter(|link| link.data.key() == key) {
                    previous.get_or_insert_with(|| link.data.clone());
                    link.type_id = data.link_type_id.clone();
                    link.data = data.clone();
                }
                match previous {
                    Some(previous) => ModelCommand::SetLinkData { key: data.key(), data: previous },
                    None => ModelCommand::SetLinkData { key, data },
                }
            }
            ModelCommand::SetLinkVertices { id, vertices } => match self.links.get_mut(&id) {
                Some(link) => {
                    let previous = std::mem::replace(&mut link.vertices, vertices);
                    ModelCommand::SetLinkVertices { id, vertices: previous }
                }
                None => ModelCommand::SetLinkVertices { id, vertices },
            },
            ModelCommand::SetElementExpanded { id, expanded } => match self.elements.get_mut(&id) {
                Some(element) => {
                    let previous = std::mem::replace(&mut element.expanded, expanded);
                    ModelCommand::SetElementExpanded { id, expanded: previous }
                }
                None => ModelCommand::SetElementExpanded { id, expanded },
            },
            ModelCommand::SetElementPosition { id, position } => match self.elements.get_mut(&id) {
                Some(element) => {
                    let previous = std::mem::replace(&mut element.position, position);
                    ModelCommand::SetElementPosition { id, position: previous }
                }
                None => ModelCommand::SetElementPosition { id, position },
            },
        }
    }

    fn execute(&mut self, command: ModelCommand) {
        let inverse = self.apply(command);
        self.history.register(inverse);
    }

    pub fn create_element(&mut self, data: ElementModel, group: Option<ElementId>) -> ElementId {
        self.next_element += 1;
        let id = ElementId(self.next_element);
        debug!("Creating {} for {}", id, data.id);
        self.execute(ModelCommand::InsertElement(Element {
            id,
            data,
            position: Vector::default(),
            size: DEFAULT_SIZE,
            expanded: false,
            group,
        }));
        id
    }

    /// Removes the element together with every link attached to it.
    pub fn remove_element(&mut self, id: ElementId) {
        if !self.elements.contains_key(&id) {
            return;
        }
        let attached: Vec<LinkId> = self.links_of(id).map(|link| link.id).collect();
        for link in attached {
            self.execute(ModelCommand::RemoveLink(link));
        }
        self.execute(ModelCommand::RemoveElement(id));
    }

    /// Places a link for every pair of elements showing its source and
    /// target IRIs. Pairs that already have such a link get its data
    /// updated instead. Returns the ids of all links carrying `data`.
    pub fn create_links(&mut self, data: &LinkModel) -> Vec<LinkId> {
        let sources: Vec<ElementId> = self.elements_with_iri(&data.source_id).map(|element| element.id).collect();
        let targets: Vec<ElementId> = self.elements_with_iri(&data.target_id).map(|element| element.id).collect();
        let mut created = Vec::new();
        for &source_id in &sources {
            for &target_id in &targets {
                let existing =
                    self.find_link(&data.link_type_id, source_id, target_id).map(|link| (link.id, link.data.key()));
                if let Some((id, key)) = existing {
                    if self.links.get(&id).is_some_and(|link| link.data != *data) {
                        self.execute(ModelCommand::SetLinkData { key, data: data.clone() });
                    }
                    created.push(id);
                    continue;
                }
                self.next_link += 1;
                let id = LinkId(self.next_link);
                self.execute(ModelCommand::InsertLink(Link {
                    id,
                    type_id: data.link_type_id.clone(),
                    source_id,
                    target_id,
                    data: data.clone(),
                    vertices: Vec::new(),
                }));
                created.push(id);
            }
        }
        created
    }

    pub fn remove_link(&mut self, id: LinkId) {
        if self.links.contains_key(&id) {
            self.execute(ModelCommand::RemoveLink(id));
        }
    }

    pub fn set_element_data(&mut self, iri: &ElementIri, data: ElementModel) {
        if self.elements_with_iri(iri).next().is_some() {
            self.execute(ModelCommand::SetElementData { iri: iri.clone(), data });
        }
    }

    pub fn set_link_data(&mut self, old: &LinkModel, data: LinkModel) {
        if self.links_like(old).next().is_some() {
            self.execute(ModelCommand::SetLinkData { key: old.key(), data });
        }
    }

    pub fn set_link_vertices(&mut self, id: LinkId, vertices: Vec<Vector>) {
        if self.links.contains_key(&id) {
            self.execute(ModelCommand::SetLinkVertices { id, vertices });
        }
    }

    pub fn set_element_expanded(&mut self, id: ElementId, expanded: bool) {
        if self.elements.contains_key(&id) {
            self.execute(ModelCommand::SetElementExpanded { id, expanded });
        }
    }

    pub fn set_element_position(&mut self, id: ElementId, position: Vector) {
        if self.elements.contains_key(&id) {
            self.execute(ModelCommand::SetElementPosition { id, position });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(iri: &str) -> ElementModel {
        ElementModel::new(ElementIri::from(iri))
    }

    fn knows(source: &str, target: &str) -> LinkModel {
        LinkModel::new(LinkTypeIri::from("http://example.org/knows"), source.into(), target.into())
    }

    #[test]
    fn test_create_links_between_every_matching_pair() {
        let mut model = DiagramModel::new();
        model.create_element(entity("http://example.org/a"), None);
        model.create_element(entity("http://example.org/a"), None);
        model.create_element(entity("http://example.org/b"), None);

        let created = model.create_links(&knows("http://example.org/a", "http://example.org/b"));
        assert_eq!(created.len(), 2);

        // second call finds the same links
        let again = model.create_links(&knows("http://example.org/a", "http://example.org/b"));
        assert_eq!(again, created);
        assert_eq!(model.links().count(), 2);
    }

    #[test]
    fn test_remove_element_drops_attached_links() {
        let mut model = DiagramModel::new();
        let a = model.create_element(entity("http://example.org/a"), None);
        model.create_element(entity("http://example.org/b"), None);
        model.create_links(&knows("http://example.org/a", "http://example.org/b"));

        model.remove_element(a);
        assert!(model.get_element(a).is_none());
        assert_eq!(model.links().count(), 0);
    }

    #[test]
    fn test_apply_returns_inverse() {
        let mut model = DiagramModel::new();
        let a = model.create_element(entity("http://example.org/a"), None);

        let inverse = model.apply(ModelCommand::SetElementPosition { id: a, position: Vector::new(5.0, 5.0) });
        assert_eq!(inverse, ModelCommand::SetElementPosition { id: a, position: Vector::default() });

        model.apply(inverse);
        assert_eq!(model.get_element(a).unwrap().position, Vector::default());
    }

    #[test]
    fn test_set_element_data_updates_every_copy() {
        let mut model = DiagramModel::new();
        let iri = ElementIri::from("http://example.org/a");
        model.create_element(entity(iri.as_str()), None);
        model.create_element(entity(iri.as_str()), None);

        model.set_element_data(&iri, entity(iri.as_str()).with_label("A", None));
        assert!(model.elements().all(|element| element.data.label.len() == 1));
    }
}
