#![forbid(unsafe_code)]

//! Review-request popup: public facade crate.
//!
//! Re-exports the controller and its collaborators from the internal crates
//! and offers a prelude plus two ready-made wirings:
//!
//! - [`headless`] - in-memory stores and surface, for tests and demos
//! - [`durable`] - file-backed "never show again" flag (feature
//!   `state-persistence`)

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use rpop_core::{
    ClickEvent, DeterministicClock, ElementId, Event, KeyCode, KeyEvent, KeyEventKind, Modifiers,
    MonotonicClock, Variant, VariantError,
};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "state-persistence")]
pub use rpop_runtime::FileFlagStore;
pub use rpop_runtime::{
    EventName, EventSink, EventTracker, FanoutSink, FlagStore, FnSink, LogSink, MemoryFlagStore,
    MemorySink, PopupConfig, SinkError, StorageError, TrackedEvent,
};

// --- Widget re-exports -----------------------------------------------------

pub use rpop_widgets::{
    DismissMethod, DismissalState, FocusableSurface, HeadlessSurface, Listeners, PopupElements,
    PopupEvent, PopupMarkup, PopupPhase, PopupRole, RenderedPopup, ReviewPopup, SurfaceHandle,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for rpop hosts.
#[derive(Debug)]
pub enum Error {
    /// A flag store could not be read or written.
    Storage(StorageError),
    /// A variant label outside the whitelist.
    Variant(VariantError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "{err}"),
            Self::Variant(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Variant(err) => Some(err),
        }
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<VariantError> for Error {
    fn from(err: VariantError) -> Self {
        Self::Variant(err)
    }
}

/// Standard result type for rpop APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Wiring ---------------------------------------------------------------

/// A controller on a [`HeadlessSurface`] with in-memory flag stores.
#[must_use]
pub fn headless(config: PopupConfig) -> ReviewPopup<HeadlessSurface> {
    ReviewPopup::new(
        config,
        HeadlessSurface::new(),
        MemoryFlagStore::new(),
        MemoryFlagStore::new(),
    )
}

/// A controller whose "never show again" flag lives in a JSON file at
/// `path`; the session flag stays in memory.
///
/// The file is read once up front so a broken store is reported here rather
/// than silently suppressing the popup later.
#[cfg(feature = "state-persistence")]
pub fn durable<S: FocusableSurface>(
    config: PopupConfig,
    surface: S,
    path: impl AsRef<std::path::Path>,
) -> Result<ReviewPopup<S>> {
    let store = FileFlagStore::new(path);
    let dismissed = store.is_flag_set(&config.permanent_dismiss_key)?;
    tracing::debug!(
        path = %store.path().display(),
        permanently_dismissed = dismissed,
        "opened durable popup flags"
    );
    Ok(ReviewPopup::new(config, surface, store, MemoryFlagStore::new()))
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        DismissMethod, Error, Event, EventSink, FlagStore, FocusableSurface, HeadlessSurface,
        KeyCode, MemoryFlagStore, PopupConfig, PopupEvent, Result, ReviewPopup, Variant,
    };

    pub use crate::{core, runtime, widgets};
}

pub use rpop_core as core;
pub use rpop_runtime as runtime;
pub use rpop_widgets as widgets;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_error_converts() {
        fn pick(raw: &str) -> Result<Variant> {
            Ok(raw.parse::<Variant>()?)
        }
        let err = pick("Z").unwrap_err();
        assert!(matches!(err, Error::Variant(_)));
        assert!(err.to_string().contains("\"Z\""));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn storage_error_converts() {
        let err: Error = StorageError::Unavailable("disabled".into()).into();
        assert!(matches!(err, Error::Storage(StorageError::Unavailable(_))));
    }

    #[test]
    fn headless_popup_shows_once() {
        let mut popup = headless(PopupConfig::default());
        assert!(popup.show());
        assert!(!popup.show());
    }

    #[cfg(feature = "state-persistence")]
    #[test]
    fn durable_flag_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.json");

        let mut first = durable(PopupConfig::default(), HeadlessSurface::new(), &path).unwrap();
        assert!(first.show());
        first.set_dont_show_again(true);
        first.close(DismissMethod::CloseX);

        let mut second = durable(PopupConfig::default(), HeadlessSurface::new(), &path).unwrap();
        assert!(!second.show());
        assert!(second.dismissal_state().unwrap().permanently_dismissed);
    }

    #[cfg(feature = "state-persistence")]
    #[test]
    fn durable_reports_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = durable(PopupConfig::default(), HeadlessSurface::new(), &path).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }
}
