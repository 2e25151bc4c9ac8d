//! Link type listing for the currently selected entity.

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::{format_localized_label, ElementIri, LinkTypeIri, LocalizedLiteral};
use crate::data::{DataProvider, LinkCount, LinkTypesOfRequest};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressState {
    #[default]
    None,
    Loading,
    Completed,
    Error,
}

type PendingRequest = BoxFuture<'static, (u64, Result<Vec<LinkCount>>)>;

/// Tracks link types of one selected entity.
///
/// Only the response to the latest request is applied; answers to
/// superseded requests are dropped on arrival.
pub struct LinkTypesToolbox {
    provider: Arc<dyn DataProvider>,
    selected: Option<ElementIri>,
    current_request: Option<u64>,
    next_request: u64,
    pending: FuturesUnordered<PendingRequest>,
    state: ProgressState,
    links_of_element: Vec<LinkTypeIri>,
    count_map: HashMap<LinkTypeIri, usize>,
    filter_key: String,
}

impl LinkTypesToolbox {
    pub fn new(provider: Arc<dyn DataProvider>) -> Self {
        Self {
            provider,
            selected: None,
            current_request: None,
            next_request: 0,
            pending: FuturesUnordered::new(),
            state: ProgressState::None,
            links_of_element: Vec::new(),
            count_map: HashMap::new(),
            filter_key: String::new(),
        }
    }

    pub fn state(&self) -> ProgressState {
        self.state
    }

    pub fn selected(&self) -> Option<&ElementIri> {
        self.selected.as_ref()
    }

    pub fn links_of_element(&self) -> &[LinkTypeIri] {
        &self.links_of_element
    }

    /// Links of `link_type` touching the selected entity in either direction.
    pub fn count(&self, link_type: &LinkTypeIri) -> usize {
        self.count_map.get(link_type).copied().unwrap_or(0)
    }

    pub fn filter_key(&self) -> &str {
        &self.filter_key
    }

    pub fn set_filter_key(&mut self, key: impl Into<String>) {
        self.filter_key = key.into();
    }

    pub fn drop_filter(&mut self) {
        self.filter_key.clear();
    }

    /// Starts loading link types of `element`; `None` clears the listing.
    pub fn select_element(&mut self, element: Option<ElementIri>) {
        if element.is_some() && element == self.selected && self.state != ProgressState::Error {
            return;
        }
        self.selected = element.clone();
        let Some(element_id) = element else {
            self.current_request = None;
            self.state = ProgressState::Completed;
            self.links_of_element.clear();
            self.count_map.clear();
            return;
        };

        self.next_request += 1;
        let token = self.next_request;
        self.current_request = Some(token);
        self.state = ProgressState::Loading;
        debug!("Requesting link types of {} (request {})", element_id, token);

        let provider = Arc::clone(&self.provider);
        let request = LinkTypesOfRequest { element_id };
        self.pending.push(async move { (token, provider.link_types_of(request).await) }.boxed());
    }

    /// Applies every response that is already available.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Some((token, result)) = self.pending.next().now_or_never().flatten() {
            if self.apply(token, result) {
                applied += 1;
            }
        }
        applied
    }

    /// Waits for all outstanding requests.
    pub async fn settle(&mut self) {
        while let Some((token, result)) = self.pending.next().await {
            self.apply(token, result);
        }
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    fn apply(&mut self, token: u64, result: Result<Vec<LinkCount>>) -> bool {
        if self.current_request != Some(token) {
            debug!("Dropping stale link types response (request {})", token);
            return false;
        }
        match result {
            Ok(counts) => {
                self.links_of_element = counts.iter().map(|count| count.id.clone()).collect();
                self.count_map =
                    counts.into_iter().map(|count| (count.id, count.in_count + count.out_count)).collect();
                self.state = ProgressState::Completed;
            }
            Err(e) => {
                warn!("Failed to load link types: {}", e);
                self.links_of_element.clear();
                self.count_map.clear();
                self.state = ProgressState::Error;
            }
        }
        true
    }

    /// Link types matching the filter, ordered by display label.
    pub fn visible_link_types(
        &self,
        labels: &HashMap<LinkTypeIri, Vec<LocalizedLiteral>>,
        language: Option<&str>,
    ) -> Vec<(LinkTypeIri, String)> {
        let filter = self.filter_key.to_lowercase();
        let mut visible: Vec<(LinkTypeIri, String)> = self
            .links_of_element
            .iter()
            .map(|link_type| {
                let label = labels.get(link_type).map(Vec::as_slice).unwrap_or_default();
                (link_type.clone(), format_localized_label(link_type.as_str(), label, language))
            })
            .filter(|(_, text)| filter.is_empty() || text.to_lowercase().contains(&filter))
            .collect();
        visible.sort_by_cached_key(|(_, text)| text.to_lowercase());
        visible
    }
}
