pub mod links_toolbox;

pub use links_toolbox::{LinkTypesToolbox, ProgressState};
