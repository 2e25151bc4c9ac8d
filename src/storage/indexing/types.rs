//! `rdf:type` triples per subject and instance counts per type.

use oxigraph::model::{Quad, TermRef};
use std::collections::{HashMap, HashSet};

use crate::core::vocabulary::rdf;
use crate::storage::triple_store::{subject_value, term_value};

#[derive(Debug, Default)]
pub struct TypeIndex {
    by_subject: HashMap<String, Vec<Quad>>,
    instances: HashMap<String, HashSet<String>>,
}

impl TypeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend<'a>(&mut self, quads: impl IntoIterator<Item = &'a Quad>) {
        for quad in quads.into_iter().filter(|quad| quad.predicate.as_str() == rdf::TYPE) {
            let instance = subject_value(quad);
            let type_iri = term_value(quad.object.as_ref());
            if matches!(quad.object.as_ref(), TermRef::Literal(_)) {
                continue;
            }
            self.by_subject.entry(instance.to_string()).or_default().push(quad.clone());
            self.instances.entry(type_iri.to_string()).or_default().insert(instance.to_string());
        }
    }

    pub fn types_of(&self, subject: &str) -> &[Quad] {
        self.by_subject.get(subject).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of distinct subjects typed with `type_iri`, 0 when unknown.
    pub fn count(&self, type_iri: &str) -> usize {
        self.instances.get(type_iri).map_or(0, HashSet::len)
    }

    pub fn type_counts(&self) -> impl Iterator<Item = (&str, usize)> {
        self.instances.iter().map(|(type_iri, instances)| (type_iri.as_str(), instances.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::model::NamedNode;

    fn typed(subject: &str, type_iri: &str, graph: &str) -> Quad {
        Quad::new(
            NamedNode::new(subject).unwrap(),
            NamedNode::new(rdf::TYPE).unwrap(),
            NamedNode::new(type_iri).unwrap(),
            NamedNode::new(graph).unwrap(),
        )
    }

    #[test]
    fn test_counts_accumulate_across_batches() {
        let mut types = TypeIndex::new();
        types.extend(&[typed("http://example.org/Bob", "http://example.org/Person", "http://g/1")]);
        types.extend(&[
            typed("http://example.org/Alice", "http://example.org/Person", "http://g/2"),
            // same instance again in another graph
            typed("http://example.org/Bob", "http://example.org/Person", "http://g/2"),
        ]);

        assert_eq!(types.count("http://example.org/Person"), 2);
        assert_eq!(types.count("http://example.org/Robot"), 0);
        assert_eq!(types.types_of("http://example.org/Bob").len(), 2);
    }
}
