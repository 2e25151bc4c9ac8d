//! Typed event bus owned by one component.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::diagram::elements::ElementId;
use crate::editor::authoring_state::{AuthoringState, TemporaryState};
use crate::editor::editor_controller::SelectionItem;
use crate::editor::validation::ValidationState;

type Listener<E> = Box<dyn FnMut(&E) + Send>;

struct Listeners<E> {
    next_id: u64,
    entries: Vec<(u64, Listener<E>)>,
}

/// Listener registry for events of type `E`.
///
/// Listeners run synchronously inside [`EventSource::trigger`] and must not
/// subscribe to or trigger the same source.
pub struct EventSource<E> {
    listeners: Arc<Mutex<Listeners<E>>>,
}

impl<E: 'static> EventSource<E> {
    pub fn new() -> Self {
        Self { listeners: Arc::new(Mutex::new(Listeners { next_id: 0, entries: Vec::new() })) }
    }

    /// Registers `listener` until the returned subscription is disposed or dropped.
    pub fn listen(&self, listener: impl FnMut(&E) + Send + 'static) -> Subscription {
        let id = {
            let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            listeners.next_id += 1;
            let id = listeners.next_id;
            listeners.entries.push((id, Box::new(listener)));
            id
        };
        let registry: Weak<Mutex<Listeners<E>>> = Arc::downgrade(&self.listeners);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    let mut listeners = registry.lock().unwrap_or_else(PoisonError::into_inner);
                    listeners.entries.retain(|(entry, _)| *entry != id);
                }
            })),
        }
    }

    pub fn trigger(&self, event: &E) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, listener) in &mut listeners.entries {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    /// Detaches every listener at once.
    pub fn clear(&self) {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner).entries.clear();
    }
}

impl<E: 'static> Default for EventSource<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Disposer of one listener registration.
#[must_use = "dropping a subscription unsubscribes the listener"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn dispose(mut self) {
        self.unsubscribe_now();
    }

    fn unsubscribe_now(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe_now();
    }
}

/// Events emitted by the editor controller. `previous` carries the value
/// that was replaced; the current one is read from the controller.
#[derive(Debug, Clone)]
pub enum EditorEvent {
    /// Authoring mode toggled on or off.
    ChangeMode,
    ChangeSelection { previous: Vec<SelectionItem> },
    ChangeAuthoringState { previous: AuthoringState },
    ChangeValidationState { previous: ValidationState },
    ChangeTemporaryState { previous: TemporaryState },
    ToggleDialog { is_opened: bool },
    AddElements { elements: Vec<ElementId> },
}

impl EditorEvent {
    /// Event name as used by presentation layers.
    pub fn name(&self) -> &'static str {
        match self {
            EditorEvent::ChangeMode => "changeMode",
            EditorEvent::ChangeSelection { .. } => "changeSelection",
            EditorEvent::ChangeAuthoringState { .. } => "changeAuthoringState",
            EditorEvent::ChangeValidationState { .. } => "changeValidationState",
            EditorEvent::ChangeTemporaryState { .. } => "changeTemporaryState",
            EditorEvent::ToggleDialog { .. } => "toggleDialog",
            EditorEvent::AddElements { .. } => "addElements",
        }
    }
}
