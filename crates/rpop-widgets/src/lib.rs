#![forbid(unsafe_code)]

//! Review popup widgets.
//!
//! - [`ReviewPopup`] - the lifecycle controller (show, close, keyboard, timers)
//! - [`FocusableSurface`] - what the controller needs from a rendered tree
//! - [`HeadlessSurface`] - in-memory surface for tests and terminal hosts
//! - [`trap_tab`] - the Tab wrap rule of the focus trap

pub mod dismiss;
pub mod focus_trap;
pub mod review_popup;
pub mod surface;

pub use dismiss::DismissMethod;
pub use focus_trap::{TabOutcome, trap_tab};
pub use review_popup::{DismissalState, Listeners, PopupEvent, ReviewPopup};
pub use surface::{
    FocusableSurface, HeadlessSurface, PopupElements, PopupMarkup, PopupPhase, PopupRole,
    RenderedPopup, SurfaceHandle,
};
