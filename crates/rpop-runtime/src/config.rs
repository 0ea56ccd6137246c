#![forbid(unsafe_code)]

//! Popup configuration.
//!
//! Defaults reproduce the shipped widget: the two storage keys are part of
//! the compatibility contract with existing installs and must not change
//! unless every stored flag is meant to be forgotten.
//!
//! # Env Var Contract
//!
//! - `RPOP_REVIEW_URL` - review link target
//! - `RPOP_ANIMATION_MS` - entry/exit animation duration in milliseconds
//! - `RPOP_REVIEW_CLOSE_DELAY_MS` - delay between review click and close
//! - `RPOP_VARIANT` - initial copy variant (`A` or `B`)
//!
//! Unparseable values are ignored with a warning; the default stays in place.

use core::time::Duration;

use rpop_core::Variant;

/// Default review link target.
pub const DEFAULT_REVIEW_URL: &str = "https://g.page/r/CTTpSusvMeqYEAI/review";
/// Session-scoped "already shown" key.
pub const DEFAULT_SESSION_KEY: &str = "stormscan_review_popup_shown";
/// Durable "never show again" key.
pub const DEFAULT_PERMANENT_DISMISS_KEY: &str = "stormscan_review_never_show";
/// Entry/exit animation duration.
pub const DEFAULT_ANIMATION_DURATION: Duration = Duration::from_millis(400);
/// Delay between activating the review link and closing the popup.
pub const DEFAULT_REVIEW_CLOSE_DELAY: Duration = Duration::from_millis(300);

/// Configuration for a review popup controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupConfig {
    /// Review link target.
    pub review_url: String,
    /// Key of the session-scoped "shown" flag.
    pub session_key: String,
    /// Key of the durable "never show again" flag.
    pub permanent_dismiss_key: String,
    /// Duration of the entry and exit animations.
    pub animation_duration: Duration,
    /// Delay between review link activation and the `review-clicked` close.
    pub review_close_delay: Duration,
    /// Copy variant the controller starts with.
    pub variant: Variant,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            review_url: DEFAULT_REVIEW_URL.to_owned(),
            session_key: DEFAULT_SESSION_KEY.to_owned(),
            permanent_dismiss_key: DEFAULT_PERMANENT_DISMISS_KEY.to_owned(),
            animation_duration: DEFAULT_ANIMATION_DURATION,
            review_close_delay: DEFAULT_REVIEW_CLOSE_DELAY,
            variant: Variant::default(),
        }
    }
}

impl PopupConfig {
    /// Defaults overridden by `RPOP_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by values from `lookup` (keyed by env var name).
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("RPOP_REVIEW_URL").filter(|v| !v.trim().is_empty()) {
            config.review_url = url;
        }
        if let Some(ms) = parse_millis(&lookup, "RPOP_ANIMATION_MS") {
            config.animation_duration = ms;
        }
        if let Some(ms) = parse_millis(&lookup, "RPOP_REVIEW_CLOSE_DELAY_MS") {
            config.review_close_delay = ms;
        }
        if let Some(raw) = lookup("RPOP_VARIANT") {
            match raw.parse::<Variant>() {
                Ok(variant) => config.variant = variant,
                Err(err) => tracing::warn!(var = "RPOP_VARIANT", error = %err, "ignoring env override"),
            }
        }

        config
    }

    /// Set the review link target.
    #[must_use]
    pub fn review_url(mut self, url: impl Into<String>) -> Self {
        self.review_url = url.into();
        self
    }

    /// Set both storage keys.
    #[must_use]
    pub fn keys(mut self, session_key: impl Into<String>, permanent_key: impl Into<String>) -> Self {
        self.session_key = session_key.into();
        self.permanent_dismiss_key = permanent_key.into();
        self
    }

    /// Set the entry/exit animation duration.
    #[must_use]
    pub fn animation_duration(mut self, duration: Duration) -> Self {
        self.animation_duration = duration;
        self
    }

    /// Set the delay before the `review-clicked` close.
    #[must_use]
    pub fn review_close_delay(mut self, delay: Duration) -> Self {
        self.review_close_delay = delay;
        self
    }

    /// Set the initial copy variant.
    #[must_use]
    pub fn variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }
}

fn parse_millis(lookup: &impl Fn(&str) -> Option<String>, var: &str) -> Option<Duration> {
    let raw = lookup(var)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(err) => {
            tracing::warn!(var, value = %raw, error = %err, "ignoring env override");
            None
        }
    }
}
