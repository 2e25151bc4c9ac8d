//! Raw triple storage behind the cache.
//!
//! [`TripleStore`] is the seam between [`RdfCacheableStore`](super::RdfCacheableStore)
//! and whatever keeps the triples. The default implementation keeps them in
//! an in-memory `oxigraph` [`Store`], one named graph per ingested batch.

use async_trait::async_trait;
use oxigraph::model::{GraphName, NamedNode, Quad, TermRef};
use oxigraph::store::Store;

use crate::error::Result;

/// One triple pattern. Unset fields match anything; set fields compare
/// against the nominal value of a term (IRI, blank node id or literal value).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchStatement {
    pub subject: Option<String>,
    pub predicate: Option<String>,
    pub object: Option<String>,
    pub graph: Option<String>,
    pub limit: Option<usize>,
}

impl MatchStatement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    pub fn object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn graph(mut self, graph: impl Into<String>) -> Self {
        self.graph = Some(graph.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// True iff every set field equals the corresponding value of `quad`.
    pub fn matches(&self, quad: &Quad) -> bool {
        fn field_matches(expected: Option<&String>, actual: &str) -> bool {
            expected.map_or(true, |expected| expected == actual)
        }
        field_matches(self.subject.as_ref(), subject_value(quad))
            && field_matches(self.predicate.as_ref(), quad.predicate.as_str())
            && field_matches(self.object.as_ref(), term_value(quad.object.as_ref()))
            && field_matches(self.graph.as_ref(), graph_value(&quad.graph_name))
    }
}

/// Nominal value of a term: the IRI, the blank node id or the literal lexical form.
#[allow(unreachable_patterns)]
pub fn term_value(term: TermRef<'_>) -> &str {
    match term {
        TermRef::NamedNode(node) => node.as_str(),
        TermRef::BlankNode(node) => node.as_str(),
        TermRef::Literal(literal) => literal.value(),
        _ => "",
    }
}

pub fn subject_value(quad: &Quad) -> &str {
    term_value(TermRef::from(quad.subject.as_ref()))
}

pub fn graph_value(graph: &GraphName) -> &str {
    match graph {
        GraphName::NamedNode(node) => node.as_str(),
        GraphName::BlankNode(node) => node.as_str(),
        GraphName::DefaultGraph => "",
    }
}

#[async_trait]
pub trait TripleStore: Send + Sync {
    /// Inserts quads, returning how many were new.
    fn insert(&self, quads: &[Quad]) -> Result<usize>;

    /// Returns every quad matching `statement`.
    async fn match_pattern(&self, statement: &MatchStatement) -> Result<Vec<Quad>>;

    /// Single pass over all stored quads, keeping those that match at least
    /// one of `statements`. Each quad is returned at most once.
    fn scan(&self, statements: &[MatchStatement]) -> Result<Vec<Quad>>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// In-memory `oxigraph` store.
pub struct OxigraphTripleStore {
    store: Store,
}

impl OxigraphTripleStore {
    pub fn new() -> Result<Self> {
        Ok(Self { store: Store::new()? })
    }
}

#[async_trait]
impl TripleStore for OxigraphTripleStore {
    fn insert(&self, quads: &[Quad]) -> Result<usize> {
        let mut inserted = 0;
        for quad in quads {
            if self.store.insert(quad)? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn match_pattern(&self, statement: &MatchStatement) -> Result<Vec<Quad>> {
        // Only IRIs can be pushed down into the index lookup; anything else
        // (blank node ids, literal values) is checked by `matches` below.
        let subject = statement.subject.as_deref().and_then(|s| NamedNode::new(s).ok());
        let predicate = statement.predicate.as_deref().and_then(|p| NamedNode::new(p).ok());
        let graph = statement.graph.as_deref().and_then(|g| NamedNode::new(g).ok());

        let mut quads = Vec::new();
        for quad in self.store.quads_for_pattern(
            subject.as_ref().map(|node| node.as_ref().into()),
            predicate.as_ref().map(|node| node.as_ref()),
            None,
            graph.as_ref().map(|node| node.as_ref().into()),
        ) {
            let quad = quad?;
            if statement.matches(&quad) {
                quads.push(quad);
                if statement.limit.is_some_and(|limit| quads.len() >= limit) {
                    break;
                }
            }
        }
        Ok(quads)
    }

    fn scan(&self, statements: &[MatchStatement]) -> Result<Vec<Quad>> {
        if statements.is_empty() {
            return Ok(Vec::new());
        }
        let mut quads = Vec::new();
        for quad in self.store.iter() {
            let quad = quad?;
            if statements.iter().any(|statement| statement.matches(&quad)) {
                quads.push(quad);
            }
        }
        Ok(quads)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.store.len()?)
    }
}
