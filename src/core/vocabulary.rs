//! Well-known vocabulary IRIs used by the cache and the editor.

/// Graph IRI prefix used when `add` is given no prefix hint.
pub const DEFAULT_STORAGE_URI: &str = "https://ontodia.org/localData.rdf";

/// Label predicates in priority order: the first one is the preferred label.
pub const LABEL_URIS: [&str; 7] = [
    "http://www.w3.org/2004/02/skos/core#prefLabel",
    "http://www.w3.org/2004/02/skos/core#label",
    "http://www.w3.org/2004/02/skos/core#altLabel",
    "http://www.w3.org/2000/01/rdf-schema#prefLabel",
    "http://www.w3.org/2000/01/rdf-schema#label",
    "http://xmlns.com/foaf/0.1/name",
    "http://schema.org/name",
];

/// Predicate name fragments that mark a literal as a fallback label.
pub const LABEL_POSTFIXES: [&str; 5] = ["prefLabel", "prefName", "label", "name", "title"];

pub mod rdf {
    pub const NAMESPACE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
}

pub mod rdfs {
    pub const NAMESPACE: &str = "http://www.w3.org/2000/01/rdf-schema#";
    pub const LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
}

pub mod skos {
    pub const PREF_LABEL: &str = "http://www.w3.org/2004/02/skos/core#prefLabel";
}

pub mod foaf {
    pub const NAMESPACE: &str = "http://xmlns.com/foaf/0.1/";
    pub const NAME: &str = "http://xmlns.com/foaf/0.1/name";
    pub const KNOWS: &str = "http://xmlns.com/foaf/0.1/knows";
    pub const PERSON: &str = "http://xmlns.com/foaf/0.1/Person";
    pub const ORGANIZATION: &str = "http://xmlns.com/foaf/0.1/Organization";
}

/// Returns a function that expands local names against `prefix`.
///
/// A `/` separator is appended unless the prefix already ends with `/` or `#`.
pub fn prefix_factory(prefix: &str) -> impl Fn(&str) -> String {
    let prefix = if prefix.ends_with('/') || prefix.ends_with('#') {
        prefix.to_string()
    } else {
        format!("{}/", prefix)
    };
    move |id: &str| format!("{}{}", prefix, id)
}
