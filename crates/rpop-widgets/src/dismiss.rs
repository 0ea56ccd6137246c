#![forbid(unsafe_code)]

//! Dismiss methods.

use std::fmt;

/// Why a popup was closed.
///
/// Reported in the `dismissMethod` field of `popup_dismissed`. The method
/// never changes close behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DismissMethod {
    /// The close (×) control.
    CloseX,
    /// The "maybe later" control.
    MaybeLater,
    /// A click on the dimmed backdrop itself.
    OutsideClick,
    /// The Escape key.
    EscapeKey,
    /// The review link was followed.
    ReviewClicked,
    /// Closed programmatically without a reason.
    #[default]
    Unknown,
}

impl DismissMethod {
    /// Wire label of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CloseX => "close-x",
            Self::MaybeLater => "maybe-later",
            Self::OutsideClick => "outside-click",
            Self::EscapeKey => "escape-key",
            Self::ReviewClicked => "review-clicked",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DismissMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
