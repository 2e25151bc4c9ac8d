//! Core data structures for the Ontodia authoring engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

macro_rules! iri_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(iri: impl Into<String>) -> Self {
                Self(iri.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(iri: &str) -> Self {
                Self(iri.to_string())
            }
        }

        impl From<String> for $name {
            fn from(iri: String) -> Self {
                Self(iri)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

iri_newtype!(
    /// Stable RDF identity of an entity, shared by every diagram element showing it.
    ElementIri
);
iri_newtype!(
    /// IRI of an entity class.
    ElementTypeIri
);
iri_newtype!(
    /// IRI of a link type (the predicate connecting two entities).
    LinkTypeIri
);
iri_newtype!(
    /// IRI of a datatype property.
    PropertyTypeIri
);

pub mod vocabulary;

/// A literal value with an optional language tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalizedLiteral {
    pub value: String,
    pub language: Option<String>,
}

impl LocalizedLiteral {
    pub fn new(value: impl Into<String>, language: Option<&str>) -> Self {
        Self { value: value.into(), language: language.map(str::to_string) }
    }
}

/// Property values keyed by property IRI.
pub type Properties = BTreeMap<PropertyTypeIri, Vec<LocalizedLiteral>>;

/// Data payload of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementModel {
    pub id: ElementIri,
    #[serde(default)]
    pub types: Vec<ElementTypeIri>,
    #[serde(default)]
    pub label: Vec<LocalizedLiteral>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub properties: Properties,
}

impl ElementModel {
    pub fn new(id: ElementIri) -> Self {
        Self { id, types: Vec::new(), label: Vec::new(), image: None, properties: Properties::new() }
    }

    pub fn with_type(mut self, type_iri: impl Into<ElementTypeIri>) -> Self {
        self.types.push(type_iri.into());
        self
    }

    pub fn with_label(mut self, value: &str, language: Option<&str>) -> Self {
        self.label.push(LocalizedLiteral::new(value, language));
        self
    }

    pub fn with_property(mut self, property: impl Into<PropertyTypeIri>, value: LocalizedLiteral) -> Self {
        self.properties.entry(property.into()).or_default().push(value);
        self
    }
}

/// Data payload of a link. Endpoints are entity IRIs, never diagram-local ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkModel {
    pub link_type_id: LinkTypeIri,
    pub source_id: ElementIri,
    pub target_id: ElementIri,
    #[serde(default)]
    pub properties: Properties,
}

impl LinkModel {
    pub fn new(link_type_id: LinkTypeIri, source_id: ElementIri, target_id: ElementIri) -> Self {
        Self { link_type_id, source_id, target_id, properties: Properties::new() }
    }

    pub fn with_property(mut self, property: impl Into<PropertyTypeIri>, value: LocalizedLiteral) -> Self {
        self.properties.entry(property.into()).or_default().push(value);
        self
    }

    /// Identity of the link: type, source IRI and target IRI.
    pub fn key(&self) -> LinkKey {
        LinkKey {
            link_type_id: self.link_type_id.clone(),
            source_id: self.source_id.clone(),
            target_id: self.target_id.clone(),
        }
    }
}

/// Identity of a link independent of diagram-local ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkKey {
    pub link_type_id: LinkTypeIri,
    pub source_id: ElementIri,
    pub target_id: ElementIri,
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> -[{}]-> <{}>", self.source_id, self.link_type_id, self.target_id)
    }
}

/// Two links are the same iff their type, source IRI and target IRI match.
pub fn same_link(left: &LinkModel, right: &LinkModel) -> bool {
    left.link_type_id == right.link_type_id
        && left.source_id == right.source_id
        && left.target_id == right.target_id
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Picks the label to display for `iri`.
///
/// Prefers a label in `language`, then an untagged one, then the first
/// available; without labels the local name of the IRI is used.
pub fn format_localized_label(iri: &str, labels: &[LocalizedLiteral], language: Option<&str>) -> String {
    let preferred = language
        .and_then(|lang| labels.iter().find(|label| label.language.as_deref() == Some(lang)))
        .or_else(|| labels.iter().find(|label| label.language.is_none()))
        .or_else(|| labels.first());
    match preferred {
        Some(label) => label.value.clone(),
        None => local_name(iri).to_string(),
    }
}

/// The part of an IRI after the last `#` or `/`.
pub fn local_name(iri: &str) -> &str {
    let trimmed = iri.trim_end_matches(['/', '#']);
    match trimmed.rfind(['/', '#']) {
        Some(index) if index + 1 < trimmed.len() => &trimmed[index + 1..],
        _ => iri,
    }
}
