//! # Ontodia
//!
//! Authoring core of an interactive diagram editor for RDF data.
//!
//! The crate tracks pending edits made on a diagram of entities and links
//! (the *authoring state*), records every model mutation as an undoable
//! command inside history batches, revalidates touched entities in the
//! background, and serves label and type lookups from a cache layered over
//! an `oxigraph` triple store.
//!
//! ## Features
//!
//! - Immutable [`editor::AuthoringState`] with one pending event per entity or link
//! - Provisional [`editor::TemporaryState`] for in-progress gestures
//! - [`editor::EditorController`] orchestrating batched, undoable edits
//! - Stale-response suppression for validation and link-type requests
//! - [`storage::RdfCacheableStore`] with incremental label/type indices and
//!   coalesced membership lookups
//!
//! ## Example
//!
//! ```rust
//! use ontodia::core::{ElementIri, ElementModel};
//! use ontodia::editor::AuthoringState;
//!
//! let bob = ElementModel::new(ElementIri::from("http://example.org/Bob"));
//! let state = AuthoringState::empty().add_element(bob.clone());
//! assert!(state.is_new_element(&bob.id));
//!
//! let state = state.delete_element(bob.clone());
//! assert!(state.is_empty());
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::new_without_default)]

/// Core data structures and types
pub mod core;

/// Crate configuration loaded from JSON or built in code
pub mod config;

/// Triple store, derived indices and the cache in front of them
pub mod storage;

/// Module for parsing RDF documents into triples
pub mod parsing;

/// Diagram model and the command history it records into
pub mod diagram;

/// Authoring state machine and the editor controller
pub mod editor;

/// Collaborator interfaces implemented by the embedding application
pub mod data;

/// Non-visual state behind editor side panels
pub mod widgets;

pub mod error {
    //! Error types and result definitions

    use thiserror::Error;

    use crate::diagram::history::HistoryError;
    use crate::editor::authoring_state::AuthoringError;
    use crate::editor::editor_controller::EditorError;

    /// Result type alias for Ontodia operations
    pub type Result<T> = std::result::Result<T, Error>;

    /// Main error type for Ontodia
    #[derive(Error, Debug)]
    pub enum Error {
        /// Triple store error
        #[error("Store error: {0}")]
        Store(String),

        /// Parse error when reading RDF data
        #[error("Parse error: {0}")]
        Parse(String),

        /// Invalid IRI
        #[error("Invalid IRI: {0}")]
        InvalidIri(String),

        /// Configuration error
        #[error("Configuration error: {0}")]
        Config(String),

        /// IO error
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        /// Rejected authoring state transition
        #[error(transparent)]
        Authoring(#[from] AuthoringError),

        /// Editor invariant violation
        #[error(transparent)]
        Editor(#[from] EditorError),

        /// Unbalanced history batches
        #[error(transparent)]
        History(#[from] HistoryError),

        /// Data provider failure
        #[error("Data provider error: {0}")]
        Provider(String),

        /// Validation backend failure
        #[error("Validation error: {0}")]
        Validation(String),
    }

    impl From<oxigraph::store::StorageError> for Error {
        fn from(err: oxigraph::store::StorageError) -> Self {
            Error::Store(err.to_string())
        }
    }

    impl From<oxigraph::io::RdfParseError> for Error {
        fn from(err: oxigraph::io::RdfParseError) -> Self {
            Error::Parse(err.to_string())
        }
    }

    impl From<oxigraph::model::IriParseError> for Error {
        fn from(err: oxigraph::model::IriParseError) -> Self {
            Error::InvalidIri(err.to_string())
        }
    }

    impl From<serde_json::Error> for Error {
        fn from(err: serde_json::Error) -> Self {
            Error::Config(err.to_string())
        }
    }
}

// Re-export commonly used types
pub use error::{Error, Result};
