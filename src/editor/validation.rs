//! Background validation of entities touched by authoring changes.
//!
//! Requests are dispatched per element IRI. Each dispatch bumps the epoch
//! of its IRI; an outcome is applied only if its epoch is still the latest
//! one, so a slow response can never overwrite a newer result.

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::core::{ElementIri, ElementModel, LinkKey, LinkModel};
use crate::editor::authoring_state::AuthoringState;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationTarget {
    Element(ElementIri),
    Link(LinkModel),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub target: ValidationTarget,
    pub message: String,
}

impl ValidationError {
    pub fn element(iri: ElementIri, message: impl Into<String>) -> Self {
        Self { target: ValidationTarget::Element(iri), message: message.into() }
    }

    pub fn link(link: LinkModel, message: impl Into<String>) -> Self {
        Self { target: ValidationTarget::Link(link), message: message.into() }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub target: ElementModel,
    pub outbound_links: Vec<LinkModel>,
    /// Authoring state at dispatch time
    pub state: AuthoringState,
    pub cancellation: CancellationToken,
}

/// Validator supplied by the embedding application.
#[async_trait]
pub trait ValidationApi: Send + Sync {
    async fn validate(&self, request: ValidationRequest) -> Result<Vec<ValidationError>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementValidation {
    pub loading: bool,
    pub errors: Vec<ValidationError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkValidation {
    pub loading: bool,
    pub errors: Vec<ValidationError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationState {
    elements: Arc<HashMap<ElementIri, ElementValidation>>,
    links: Arc<HashMap<LinkKey, LinkValidation>>,
}

impl ValidationState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn same_as(&self, other: &ValidationState) -> bool {
        Arc::ptr_eq(&self.elements, &other.elements) && Arc::ptr_eq(&self.links, &other.links)
    }

    pub fn element(&self, iri: &ElementIri) -> Option<&ElementValidation> {
        self.elements.get(iri)
    }

    pub fn link(&self, key: &LinkKey) -> Option<&LinkValidation> {
        self.links.get(key)
    }

    pub fn set_element(&self, iri: ElementIri, validation: ElementValidation) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.elements).insert(iri, validation);
        next
    }

    pub fn set_link(&self, key: LinkKey, validation: LinkValidation) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.links).insert(key, validation);
        next
    }

    /// Marks the element and its links as loading, keeping their last errors.
    pub fn start_loading(&self, iri: &ElementIri, links: &[LinkKey]) -> Self {
        let mut next = self.clone();
        let elements = Arc::make_mut(&mut next.elements);
        elements.entry(iri.clone()).or_default().loading = true;
        let link_states = Arc::make_mut(&mut next.links);
        for key in links {
            link_states.entry(key.clone()).or_default().loading = true;
        }
        next
    }
}

/// Elements whose pending events differ between two authoring states,
/// plus the sources of links whose events differ.
pub fn changed_elements_to_validate(previous: &AuthoringState, current: &AuthoringState) -> HashSet<ElementIri> {
    let mut changed = HashSet::new();
    for (iri, event) in previous.elements() {
        if current.element_event(iri) != Some(event) {
            changed.insert(iri.clone());
        }
    }
    for (iri, event) in current.elements() {
        if previous.element_event(iri) != Some(event) {
            changed.insert(iri.clone());
        }
    }
    for (key, event) in previous.links() {
        if current.link_event(key) != Some(event) {
            changed.insert(key.source_id.clone());
        }
    }
    for (key, event) in current.links() {
        if previous.link_event(key) != Some(event) {
            changed.insert(key.source_id.clone());
        }
    }
    changed
}

#[derive(Debug)]
pub enum ValidationResult {
    Completed(Result<Vec<ValidationError>>),
    Cancelled,
}

#[derive(Debug)]
pub struct ValidationOutcome {
    pub iri: ElementIri,
    pub epoch: u64,
    pub links: Vec<LinkModel>,
    pub result: ValidationResult,
}

impl ValidationOutcome {
    /// New validation entries for the element and its outbound links.
    pub fn into_state(self, state: &ValidationState) -> ValidationState {
        let errors = match self.result {
            ValidationResult::Cancelled => return state.clone(),
            ValidationResult::Completed(Ok(errors)) => errors,
            ValidationResult::Completed(Err(e)) => {
                vec![ValidationError::element(self.iri.clone(), format!("Failed to validate: {}", e))]
            }
        };
        let mut element_errors = Vec::new();
        let mut link_errors: HashMap<LinkKey, Vec<ValidationError>> =
            self.links.iter().map(|link| (link.key(), Vec::new())).collect();
        for error in errors {
            let link_key = match &error.target {
                ValidationTarget::Element(_) => None,
                ValidationTarget::Link(link) => Some(link.key()),
            };
            match link_key {
                Some(key) => link_errors.entry(key).or_default().push(error),
                None => element_errors.push(error),
            }
        }
        let mut next = state.set_element(self.iri, ElementValidation { loading: false, errors: element_errors });
        for (key, errors) in link_errors {
            next = next.set_link(key, LinkValidation { loading: false, errors });
        }
        next
    }
}

/// In-flight validation requests with per-IRI epochs.
#[derive(Default)]
pub struct ValidationQueue {
    pending: FuturesUnordered<BoxFuture<'static, ValidationOutcome>>,
    epochs: HashMap<ElementIri, u64>,
    next_epoch: u64,
}

impl ValidationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&mut self, api: Arc<dyn ValidationApi>, request: ValidationRequest) {
        self.next_epoch += 1;
        let epoch = self.next_epoch;
        let iri = request.target.id.clone();
        self.epochs.insert(iri.clone(), epoch);
        let links = request.outbound_links.clone();
        let cancellation = request.cancellation.clone();
        let validation = async move {
            let result = tokio::select! {
                biased;
                () = cancellation.cancelled() => ValidationResult::Cancelled,
                result = api.validate(request) => ValidationResult::Completed(result),
            };
            ValidationOutcome { iri, epoch, links, result }
        };
        self.pending.push(validation.boxed());
    }

    /// Waits for the next request to finish, `None` when nothing is in flight.
    pub async fn next_outcome(&mut self) -> Option<ValidationOutcome> {
        self.pending.next().await
    }

    /// Next finished request if one is ready without waiting.
    pub fn try_next_outcome(&mut self) -> Option<ValidationOutcome> {
        self.pending.next().now_or_never().flatten()
    }

    pub fn is_current(&self, outcome: &ValidationOutcome) -> bool {
        self.epochs.get(&outcome.iri) == Some(&outcome.epoch)
    }

    /// Forgets the epoch of a current outcome so it can be applied.
    /// Returns false for stale outcomes, which leave the epochs untouched.
    pub fn complete(&mut self, outcome: &ValidationOutcome) -> bool {
        if !self.is_current(outcome) {
            return false;
        }
        self.epochs.remove(&outcome.iri);
        true
    }

    /// IRIs whose latest request has not been applied yet.
    pub fn tracked(&self) -> usize {
        self.epochs.len()
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending = FuturesUnordered::new();
        self.epochs.clear();
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
    fn test_changed_elements_include_link_sources() {
        let a = ElementModel::new(ElementIri::from("http://example.org/a"));
        let previous = AuthoringState::empty().add_element(a.clone());
        let current = previous.add_link(knows("http://example.org/b", "http://example.org/a"));

        let changed = changed_elements_to_validate(&previous, &current);
        assert_eq!(changed, HashSet::from([ElementIri::from("http://example.org/b")]));

        let removed = changed_elements_to_validate(&current, &AuthoringState::empty());
        assert!(removed.contains(&a.id));
    }

    #[test]
    fn test_outcome_splits_errors_by_target() {
        let iri = ElementIri::from("http://example.org/a");
        let link = knows("http://example.org/a", "http://example.org/b");
        let quiet = knows("http://example.org/a", "http://example.org/c");
        let outcome = ValidationOutcome {
            iri: iri.clone(),
            epoch: 1,
            links: vec![link.clone(), quiet.clone()],
            result: ValidationResult::Completed(Ok(vec![
                ValidationError::element(iri.clone(), "missing label"),
                ValidationError::link(link.clone(), "wrong range"),
            ])),
        };

        let loading = ValidationState::empty().start_loading(&iri, &[link.key(), quiet.key()]);
        let state = outcome.into_state(&loading);
        assert_eq!(state.element(&iri).unwrap().errors.len(), 1);
        assert!(!state.element(&iri).unwrap().loading);
        assert_eq!(state.link(&link.key()).unwrap().errors[0].message, "wrong range");
        assert!(state.link(&quiet.key()).unwrap().errors.is_empty());
    }

    #[test]
    fn test_start_loading_keeps_errors() {
        let iri = ElementIri::from("http://example.org/a");
        let state = ValidationState::empty().set_element(
            iri.clone(),
            ElementValidation { loading: false, errors: vec![ValidationError::element(iri.clone(), "x")] },
        );
        let loading = state.start_loading(&iri, &[]);
        let validation = loading.element(&iri).unwrap();
        assert!(validation.loading);
        assert_eq!(validation.errors.len(), 1);
    }
}
