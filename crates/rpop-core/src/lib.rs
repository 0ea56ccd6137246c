#![forbid(unsafe_code)]

//! Core: canonical input events, element handles, copy variants, and the
//! host-driven clock used to sequence popup animations.

pub mod clock;
pub mod element;
pub mod event;
pub mod variant;

pub use clock::{DeterministicClock, MonotonicClock};
pub use element::ElementId;
pub use event::{ClickEvent, Event, KeyCode, KeyEvent, KeyEventKind, Modifiers};
pub use variant::{Variant, VariantError};
