pub mod authoring_state;
pub mod editor_controller;
pub mod events;
pub mod states;
pub mod validation;

pub use authoring_state::{
    AuthoringError, AuthoringEvent, AuthoringKind, AuthoringState, ElementEvent, LinkEvent, TemporaryState,
};
pub use editor_controller::{
    create_link_and_change_direction, Dialog, DialogType, DragItem, EditorController, EditorError, LoadingStatus,
    SelectionItem,
};
pub use events::{EditorEvent, EventSource, Subscription};
pub use states::{DiagramStates, ElementStatus, ItemState, LinkStatus, WarningBadge};
pub use validation::{
    changed_elements_to_validate, ElementValidation, LinkValidation, ValidationApi, ValidationError,
    ValidationRequest, ValidationState, ValidationTarget,
};
