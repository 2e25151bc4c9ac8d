pub mod elements;
pub mod history;
pub mod model;

pub use elements::{Element, ElementId, Link, LinkId, NewLink};
pub use history::{Batch, Command, CommandHistory, HistoryError, ModelCommand};
pub use model::DiagramModel;
