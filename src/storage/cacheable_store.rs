//! Cache layered over a [`TripleStore`].
//!
//! Every batch passed to [`RdfCacheableStore::add`] lands in its own named
//! graph and is indexed once: label triples by subject, `rdf:type` triples
//! by subject and distinct instances per type. Label and type lookups for a
//! single subject are answered from those indices; everything else goes to
//! the underlying store.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use oxigraph::model::{NamedNode, Quad, Triple};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::core::vocabulary::rdf;
use crate::error::{Error, Result};
use crate::storage::indexing::labels::LabelIndex;
use crate::storage::indexing::types::TypeIndex;
use crate::storage::triple_store::{MatchStatement, OxigraphTripleStore, TripleStore};

static GRAPH_COUNTER: AtomicU64 = AtomicU64::new(1);

type ElementCheck = Shared<BoxFuture<'static, bool>>;

/// Which index, if any, can answer a statement on its own.
enum FastPath<'a> {
    Labels(&'a str),
    Types(&'a str),
}

pub struct RdfCacheableStore<S: TripleStore + 'static = OxigraphTripleStore> {
    store: Arc<S>,
    config: CacheConfig,
    labels: LabelIndex,
    types: TypeIndex,
    checking: Arc<Mutex<HashMap<String, ElementCheck>>>,
}

impl RdfCacheableStore<OxigraphTripleStore> {
    /// Cache over a fresh in-memory `oxigraph` store.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_store(OxigraphTripleStore::new()?, config)
    }
}

impl<S: TripleStore + 'static> RdfCacheableStore<S> {
    pub fn with_store(store: S, config: CacheConfig) -> Result<Self> {
        let labels = LabelIndex::new(&config.label_predicates, &config.label_postfixes)?;
        Ok(Self {
            store: Arc::new(store),
            config,
            labels,
            types: TypeIndex::new(),
            checking: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stores `triples` under a freshly named graph and indexes them.
    ///
    /// The graph is named `<prefix><n>`, falling back to the configured
    /// default prefix, and must form a valid IRI.
    pub fn add(&mut self, triples: Vec<Triple>, prefix: Option<&str>) -> Result<NamedNode> {
        let prefix = prefix.unwrap_or(&self.config.default_graph_prefix);
        let id = GRAPH_COUNTER.fetch_add(1, Ordering::Relaxed);
        let graph = NamedNode::new(format!("{}{}", prefix, id))
            .map_err(|e| Error::InvalidIri(format!("{}{}: {}", prefix, id, e)))?;

        let quads: Vec<Quad> = triples.into_iter().map(|triple| triple.in_graph(graph.clone())).collect();
        let inserted = self.store.insert(&quads)?;
        self.labels.extend(&quads);
        self.types.extend(&quads);

        debug!(
            "Added graph {} with {} triples ({} new), {} labelled subjects",
            graph,
            quads.len(),
            inserted,
            self.labels.len()
        );
        Ok(graph)
    }

    fn fast_path<'a>(&self, statement: &'a MatchStatement) -> Option<FastPath<'a>> {
        if statement.object.is_some() || statement.graph.is_some() {
            return None;
        }
        let subject = statement.subject.as_deref()?;
        let predicate = statement.predicate.as_deref()?;
        if self.labels.is_label_predicate(predicate) {
            Some(FastPath::Labels(subject))
        } else if predicate == rdf::TYPE {
            Some(FastPath::Types(subject))
        } else {
            None
        }
    }

    fn cached(&self, path: &FastPath<'_>, limit: Option<usize>) -> Vec<Quad> {
        let quads = match path {
            FastPath::Labels(subject) => self.labels.get(subject),
            FastPath::Types(subject) => self.types.types_of(subject),
        };
        let take = limit.unwrap_or(quads.len());
        quads.iter().take(take).cloned().collect()
    }

    /// Quads matching `statement`.
    ///
    /// With a subject, no object and a label predicate, returns every cached
    /// label of the subject whatever label predicate was asked. With
    /// `rdf:type` instead, returns the cached type triples.
    pub async fn match_pattern(&self, statement: &MatchStatement) -> Result<Vec<Quad>> {
        match self.fast_path(statement) {
            Some(path) => Ok(self.cached(&path, statement.limit)),
            None => self.store.match_pattern(statement).await,
        }
    }

    /// Union of the matches of every statement.
    ///
    /// Cacheable statements are answered from the indices, the remaining
    /// ones share a single scan of the store.
    pub fn match_all(&self, statements: &[MatchStatement]) -> Result<Vec<Quad>> {
        let mut quads = Vec::new();
        let mut slow = Vec::new();
        for statement in statements {
            match self.fast_path(statement) {
                Some(path) => quads.extend(self.cached(&path, statement.limit)),
                None => slow.push(statement.clone()),
            }
        }
        if !slow.is_empty() {
            debug!("Scanning store for {} uncached statements", slow.len());
            quads.extend(self.store.scan(&slow)?);
        }
        Ok(quads)
    }

    /// Cached label triples of `subject`, preferred label first.
    pub fn labels(&self, subject: &str) -> &[Quad] {
        self.labels.get(subject)
    }

    /// Whether the store holds any triple about `id`.
    ///
    /// Subjects with a cached label answer immediately. Otherwise concurrent
    /// callers for the same id share one store lookup, which is forgotten
    /// once it completes. A failed lookup answers `false`.
    pub async fn check_element(&self, id: &str) -> bool {
        if self.labels.contains(id) {
            return true;
        }
        let check = {
            let mut checking = self.checking.lock().unwrap_or_else(PoisonError::into_inner);
            checking.entry(id.to_string()).or_insert_with(|| self.lookup(id)).clone()
        };
        check.await
    }

    fn lookup(&self, id: &str) -> ElementCheck {
        let store = Arc::clone(&self.store);
        let checking = Arc::clone(&self.checking);
        let id = id.to_string();
        async move {
            let statement = MatchStatement::new().subject(id.as_str()).limit(1);
            let found = match store.match_pattern(&statement).await {
                Ok(quads) => !quads.is_empty(),
                Err(e) => {
                    warn!("Element lookup for {} failed: {}", id, e);
                    false
                }
            };
            checking.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
            found
        }
        .boxed()
        .shared()
    }

    /// Number of lookups currently in flight.
    pub fn pending_checks(&self) -> usize {
        self.checking.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Distinct instances of `type_iri` seen so far, 0 when unknown.
    pub fn type_count(&self, type_iri: &str) -> usize {
        self.types.count(type_iri)
    }

    /// Types with their instance counts, most populated first.
    pub fn type_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> =
            self.types.type_counts().map(|(type_iri, count)| (type_iri.to_string(), count)).collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }

    /// Subjects known to carry at least one label.
    pub fn labelled_subjects(&self) -> usize {
        self.labels.len()
    }

    pub fn len(&self) -> Result<usize> {
        self.store.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.store.is_empty()
    }
}

/// Distinct subjects among `quads`, in first-seen order.
pub fn subjects_of(quads: &[Quad]) -> Vec<String> {
    let mut seen = HashSet::new();
    quads
        .iter()
        .map(|quad| crate::storage::triple_store::subject_value(quad).to_string())
        .filter(|subject| seen.insert(subject.clone()))
        .collect()
}
