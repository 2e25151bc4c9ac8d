//! Undo/redo log built from batches of reversible commands.
//!
//! Mutations never go through the history: they are applied by the model or
//! the editor, which then register the *inverse* command. A batch collects
//! those inverses until it is stored as one undo step, discarded (the
//! mutations stay applied but cannot be undone) or rolled back, in which
//! case the caller replays the returned inverses to revert the mutations.

use thiserror::Error;
use tracing::debug;

use crate::core::{ElementIri, ElementModel, LinkKey, LinkModel, Vector};
use crate::diagram::elements::{Element, ElementId, Link, LinkId};
use crate::editor::authoring_state::AuthoringState;

/// Reversible change of the diagram model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelCommand {
    InsertElement(Element),
    RemoveElement(ElementId),
    InsertLink(Link),
    RemoveLink(LinkId),
    /// Replaces the data of every element showing `iri`.
    SetElementData { iri: ElementIri, data: ElementModel },
    /// Replaces the data of every link with identity `key`.
    SetLinkData { key: LinkKey, data: LinkModel },
    SetLinkVertices { id: LinkId, vertices: Vec<Vector> },
    SetElementExpanded { id: ElementId, expanded: bool },
    SetElementPosition { id: ElementId, position: Vector },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Model(ModelCommand),
    SetAuthoringState(AuthoringState),
}

impl From<ModelCommand> for Command {
    fn from(command: ModelCommand) -> Self {
        Command::Model(command)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("Batch '{found}' closed while '{expected}' is the innermost open batch")]
    BatchMismatch { expected: String, found: String },

    #[error("No history batch is open")]
    NoBatchOpen,

    #[error("Cannot undo or redo while batch '{0}' is open")]
    BatchOpen(String),
}

/// Handle to an open batch. Must be passed back to
/// [`CommandHistory::store`] or [`CommandHistory::discard`].
#[must_use = "an open batch must be stored or discarded"]
#[derive(Debug, PartialEq, Eq)]
pub struct Batch {
    id: u64,
    label: String,
}

impl Batch {
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// One undo (or redo) step: inverse commands in the order they were recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub label: String,
    pub commands: Vec<Command>,
}

#[derive(Debug)]
struct OpenBatch {
    id: u64,
    label: String,
    commands: Vec<Command>,
}

#[derive(Debug, Default)]
pub struct CommandHistory {
    open: Vec<OpenBatch>,
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    next_batch: u64,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a batch nested in the currently open one, if any.
    pub fn start_batch(&mut self, label: impl Into<String>) -> Batch {
        self.next_batch += 1;
        let label = label.into();
        self.open.push(OpenBatch { id: self.next_batch, label: label.clone(), commands: Vec::new() });
        Batch { id: self.next_batch, label }
    }

    /// Records the inverse of a mutation that was just applied.
    ///
    /// Outside any batch the command becomes an undo step of its own.
    pub fn register(&mut self, inverse: impl Into<Command>) {
        let inverse = inverse.into();
        match self.open.last_mut() {
            Some(batch) => batch.commands.push(inverse),
            None => self.push_step(HistoryEntry { label: String::new(), commands: vec![inverse] }),
        }
    }

    fn close(&mut self, batch: &Batch) -> Result<OpenBatch, HistoryError> {
        match self.open.last() {
            None => Err(HistoryError::NoBatchOpen),
            Some(open) if open.id != batch.id => Err(HistoryError::BatchMismatch {
                expected: open.label.clone(),
                found: batch.label.clone(),
            }),
            Some(_) => self.open.pop().ok_or(HistoryError::NoBatchOpen),
        }
    }

    /// Commits `batch`: into its parent batch when nested, otherwise as a
    /// new undo step. Empty top-level batches leave no step behind.
    pub fn store(&mut self, batch: Batch) -> Result<(), HistoryError> {
        let closed = self.close(&batch)?;
        if let Some(parent) = self.open.last_mut() {
            parent.commands.extend(closed.commands);
        } else if !closed.commands.is_empty() {
            debug!("Storing batch '{}' with {} commands", closed.label, closed.commands.len());
            self.push_step(HistoryEntry { label: closed.label, commands: closed.commands });
        }
        Ok(())
    }

    /// Closes `batch` without recording it. Its mutations stay applied.
    pub fn discard(&mut self, batch: Batch) -> Result<(), HistoryError> {
        let closed = self.close(&batch)?;
        debug!("Discarding batch '{}' with {} commands", closed.label, closed.commands.len());
        Ok(())
    }

    /// Closes `batch` and hands back its inverses, to be applied last to
    /// first. Nothing is merged into a parent batch.
    pub fn rollback(&mut self, batch: Batch) -> Result<Vec<Command>, HistoryError> {
        let closed = self.close(&batch)?;
        debug!("Rolling back batch '{}' with {} commands", closed.label, closed.commands.len());
        Ok(closed.commands)
    }

    fn push_step(&mut self, entry: HistoryEntry) {
        self.undo.push(entry);
        self.redo.clear();
    }

    fn ensure_closed(&self) -> Result<(), HistoryError> {
        match self.open.last() {
            Some(open) => Err(HistoryError::BatchOpen(open.label.clone())),
            None => Ok(()),
        }
    }

    /// Takes the latest undo step. Its commands must be applied last to first.
    pub fn pop_undo(&mut self) -> Result<Option<HistoryEntry>, HistoryError> {
        self.ensure_closed()?;
        Ok(self.undo.pop())
    }

    pub fn pop_redo(&mut self) -> Result<Option<HistoryEntry>, HistoryError> {
        self.ensure_closed()?;
        Ok(self.redo.pop())
    }

    /// Pushes an undo step produced by a redo; the redo stack is kept.
    pub fn push_undo(&mut self, entry: HistoryEntry) {
        self.undo.push(entry);
    }

    pub fn push_redo(&mut self, entry: HistoryEntry) {
        self.redo.push(entry);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_steps(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.undo.iter()
    }

    pub fn is_batch_open(&self) -> bool {
        !self.open.is_empty()
    }

    pub fn reset(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(id: u64) -> Command {
        ModelCommand::SetElementPosition { id: ElementId(id), position: Vector::default() }.into()
    }

    #[test]
    fn test_nested_batch_merges_into_parent() {
        let mut history = CommandHistory::new();
        let outer = history.start_batch("outer");
        history.register(position(1));
        let inner = history.start_batch("inner");
        history.register(position(2));
        history.store(inner).unwrap();
        history.store(outer).unwrap();

        let step = history.pop_undo().unwrap().unwrap();
        assert_eq!(step.label, "outer");
        assert_eq!(step.commands, vec![position(1), position(2)]);
        assert!(!history.can_undo());
    }

    #[test]
    fn test_discarded_batch_leaves_no_step() {
        let mut history = CommandHistory::new();
        let batch = history.start_batch("temporary");
        history.register(position(1));
        history.discard(batch).unwrap();

        assert!(!history.can_undo());
        assert!(!history.is_batch_open());
    }

    #[test]
    fn test_rollback_of_nested_batch_keeps_parent() {
        let mut history = CommandHistory::new();
        let outer = history.start_batch("outer");
        history.register(position(1));
        let inner = history.start_batch("inner");
        history.register(position(2));
        history.register(position(3));

        assert_eq!(history.rollback(inner).unwrap(), vec![position(2), position(3)]);
        history.store(outer).unwrap();

        let step = history.pop_undo().unwrap().unwrap();
        assert_eq!(step.commands, vec![position(1)]);
    }

    #[test]
    fn test_closing_outer_batch_first_is_rejected() {
        let mut history = CommandHistory::new();
        let outer = history.start_batch("outer");
        let inner = history.start_batch("inner");

        let err = history.store(outer).unwrap_err();
        assert_eq!(
            err,
            HistoryError::BatchMismatch { expected: "inner".to_string(), found: "outer".to_string() }
        );
        history.discard(inner).unwrap();
    }

    #[test]
    fn test_new_step_clears_redo() {
        let mut history = CommandHistory::new();
        history.register(position(1));
        let step = history.pop_undo().unwrap().unwrap();
        history.push_redo(step);
        assert!(history.can_redo());

        history.register(position(2));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_refused_inside_batch() {
        let mut history = CommandHistory::new();
        let batch = history.start_batch("open");
        assert_eq!(history.pop_undo().unwrap_err(), HistoryError::BatchOpen("open".to_string()));
        history.discard(batch).unwrap();
    }
}
