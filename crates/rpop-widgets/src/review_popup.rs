#![forbid(unsafe_code)]

//! Review popup lifecycle controller.
//!
//! [`ReviewPopup`] decides whether the popup may appear, renders it on a
//! [`FocusableSurface`], routes keyboard and click input while it is open,
//! and sequences the entry and exit transitions on a host-driven clock.
//!
//! # Gates
//!
//! `show()` passes three checks, in order, and stops at the first failure:
//!
//! 1. the durable "never show again" flag is not set,
//! 2. the session "shown" flag is not set,
//! 3. no popup is currently active (including one that is still closing).
//!
//! # Lifecycle
//!
//! ```text
//! show() ──▶ Entering ──(next tick)──▶ Open ──close()──▶ Closing ──(animation)──▶ gone
//! ```
//!
//! Focus moves to the review link once the entry animation has run. Every
//! timer belongs to the instance that scheduled it and dies with it.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use rpop_core::{Event, KeyCode};
//! use rpop_runtime::{MemoryFlagStore, MemorySink, PopupConfig};
//! use rpop_widgets::{DismissMethod, HeadlessSurface, PopupEvent, ReviewPopup};
//!
//! let sink = MemorySink::new();
//! let mut popup = ReviewPopup::new(
//!     PopupConfig::default(),
//!     HeadlessSurface::new(),
//!     MemoryFlagStore::new(),
//!     MemoryFlagStore::new(),
//! )
//! .with_sink(sink.clone());
//!
//! assert!(popup.show());
//! assert_eq!(
//!     popup.handle_event(&Event::key(KeyCode::Escape)),
//!     PopupEvent::Dismissed(DismissMethod::EscapeKey)
//! );
//! popup.advance(Duration::from_millis(400));
//! assert!(!popup.is_open());
//! assert!(!popup.show()); // once per session
//! ```

use core::time::Duration;

use bitflags::bitflags;
use rpop_core::{
    ClickEvent, DeterministicClock, ElementId, Event, KeyCode, KeyEvent, MonotonicClock, Variant,
    VariantError,
};
use rpop_runtime::{
    CancelToken, EventName, EventSink, EventTracker, FlagStore, PopupConfig, StorageResult,
    TaskQueue,
};
use serde_json::{Map, Value};

use crate::dismiss::DismissMethod;
use crate::focus_trap::{TabOutcome, trap_tab};
use crate::surface::{
    FocusableSurface, PopupElements, PopupMarkup, PopupPhase, PopupRole, SurfaceHandle,
};

bitflags! {
    /// Input listeners registered on behalf of the open popup.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Listeners: u8 {
        /// Document-level keydown (Tab trap, Escape).
        const KEYDOWN        = 0b0000_0001;
        /// Click on the backdrop itself.
        const BACKDROP_CLICK = 0b0000_0010;
        /// Clicks on the popup's controls.
        const CONTROL_CLICKS = 0b0000_0100;
    }
}

/// Persisted visibility state, as read from the flag stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DismissalState {
    /// The user asked never to see the popup again.
    pub permanently_dismissed: bool,
    /// The popup has already been shown in this session.
    pub shown_this_session: bool,
}

/// What the controller did with one input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupEvent {
    /// Not for the popup, or no popup listening.
    Ignored,
    /// The focus trap wrapped focus to this element.
    FocusWrapped(ElementId),
    /// Tab was left to default traversal.
    FocusPassthrough,
    /// The popup began closing.
    Dismissed(DismissMethod),
    /// The review link was activated; the popup closes shortly.
    ReviewOpened,
    /// The "don't show again" checkbox changed to this state.
    CheckboxToggled(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PopupTask {
    Activate,
    FocusPrimary,
    ReviewClose,
    Teardown,
}

#[derive(Debug)]
struct PopupInstance {
    handle: SurfaceHandle,
    elements: PopupElements,
    variant: Variant,
    phase: PopupPhase,
    dont_show_again: bool,
    previously_focused: Option<ElementId>,
    listeners: Listeners,
    lifetime: CancelToken,
}

/// Review popup controller.
///
/// Owns at most one popup instance. Collaborators are injected: two flag
/// stores (durable and session), the surface the popup renders on, and an
/// event sink (defaults to [`rpop_runtime::LogSink`]).
pub struct ReviewPopup<S: FocusableSurface> {
    config: PopupConfig,
    variant: Variant,
    persistent: Box<dyn FlagStore>,
    session: Box<dyn FlagStore>,
    surface: S,
    tracker: EventTracker,
    clock: DeterministicClock,
    tasks: TaskQueue<PopupTask>,
    instance: Option<PopupInstance>,
}

impl<S: FocusableSurface> ReviewPopup<S> {
    /// Create a controller with no popup showing.
    pub fn new(
        config: PopupConfig,
        surface: S,
        persistent: impl FlagStore + 'static,
        session: impl FlagStore + 'static,
    ) -> Self {
        tracing::debug!(variant = config.variant.as_str(), "review popup initialized");
        Self {
            variant: config.variant,
            config,
            persistent: Box::new(persistent),
            session: Box::new(session),
            surface,
            tracker: EventTracker::default(),
            clock: DeterministicClock::new(),
            tasks: TaskQueue::new(),
            instance: None,
        }
    }

    /// Deliver tracked events to `sink` instead of the log.
    #[must_use]
    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.tracker = EventTracker::new(sink);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────────

    /// Whether a popup instance is active (open or closing).
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.instance.is_some()
    }

    /// Phase of the active instance.
    #[must_use]
    pub fn phase(&self) -> Option<PopupPhase> {
        self.instance.as_ref().map(|i| i.phase)
    }

    /// Current copy variant.
    #[must_use]
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Listeners currently registered for the active instance.
    #[must_use]
    pub fn active_listeners(&self) -> Listeners {
        self.instance
            .as_ref()
            .map_or(Listeners::empty(), |i| i.listeners)
    }

    /// Element that held focus when the active instance was shown.
    #[must_use]
    pub fn previously_focused(&self) -> Option<ElementId> {
        self.instance.as_ref().and_then(|i| i.previously_focused)
    }

    /// Whether the active instance's checkbox is checked.
    #[must_use]
    pub fn dont_show_again(&self) -> bool {
        self.instance.as_ref().is_some_and(|i| i.dont_show_again)
    }

    /// Control ids of the active instance.
    #[must_use]
    pub fn elements(&self) -> Option<PopupElements> {
        self.instance.as_ref().map(|i| i.elements)
    }

    /// Read the persisted visibility state.
    pub fn dismissal_state(&self) -> StorageResult<DismissalState> {
        Ok(DismissalState {
            permanently_dismissed: self
                .persistent
                .is_flag_set(&self.config.permanent_dismiss_key)?,
            shown_this_session: self.session.is_flag_set(&self.config.session_key)?,
        })
    }

    /// Current host time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock.now_mono()
    }

    /// When the next scheduled task falls due, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.tasks.next_due()
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &PopupConfig {
        &self.config
    }

    /// Event tracker (delivery counters).
    #[must_use]
    pub fn tracker(&self) -> &EventTracker {
        &self.tracker
    }

    /// The surface the popup renders on.
    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Mutable access to the surface, for host-side changes.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    // ── Show / close ─────────────────────────────────────────────────────

    /// Show the popup if every gate allows it.
    ///
    /// Returns `true` if a popup was rendered.
    pub fn show(&mut self) -> bool {
        let state = match self.dismissal_state() {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(error = %err, "cannot read popup flags; not showing");
                return false;
            }
        };
        if state.permanently_dismissed {
            tracing::debug!(reason = "permanently-dismissed", "popup not shown");
            return false;
        }
        if state.shown_this_session {
            tracing::debug!(reason = "shown-this-session", "popup not shown");
            return false;
        }
        if self.instance.is_some() {
            tracing::debug!(reason = "already-active", "popup not shown");
            return false;
        }

        let previously_focused = self.surface.focused();
        let rendered = self.surface.render(&PopupMarkup {
            variant: self.variant,
            review_url: self.config.review_url.clone(),
            modal: true,
        });
        let lifetime = CancelToken::new();
        let now = self.clock.now_mono();
        self.tasks
            .schedule(now, Duration::ZERO, &lifetime, PopupTask::Activate);
        self.tasks.schedule(
            now,
            self.config.animation_duration,
            &lifetime,
            PopupTask::FocusPrimary,
        );
        self.instance = Some(PopupInstance {
            handle: rendered.handle,
            elements: rendered.elements,
            variant: self.variant,
            phase: PopupPhase::Entering,
            dont_show_again: false,
            previously_focused,
            listeners: Listeners::all(),
            lifetime,
        });

        if let Err(err) = self.session.set_flag(&self.config.session_key) {
            tracing::warn!(
                store = self.session.name(),
                error = %err,
                "failed to record popup shown for this session"
            );
        }
        self.track(EventName::PopupShown, Map::new());
        tracing::info!(
            variant = self.variant.as_str(),
            handle = rendered.handle.get(),
            "review popup shown"
        );
        true
    }

    /// Close the active popup.
    ///
    /// No-op (returns `false`) when nothing is showing or the popup is
    /// already closing.
    pub fn close(&mut self, method: DismissMethod) -> bool {
        self.close_at(method, self.clock.now_mono())
    }

    /// Close with the exit animation starting at `at`.
    fn close_at(&mut self, method: DismissMethod, at: Duration) -> bool {
        let delay = self.config.animation_duration;
        let Some(instance) = self.instance.as_mut() else {
            tracing::debug!(method = method.as_str(), "close ignored: no popup");
            return false;
        };
        if instance.phase == PopupPhase::Closing {
            tracing::debug!(method = method.as_str(), "close ignored: already closing");
            return false;
        }

        // Keydown stays registered until teardown: the trap holds while the
        // popup fades out.
        instance
            .listeners
            .remove(Listeners::BACKDROP_CLICK | Listeners::CONTROL_CLICKS);
        instance.phase = PopupPhase::Closing;
        let handle = instance.handle;
        let persist = instance.dont_show_again;
        self.tasks
            .schedule(at, delay, &instance.lifetime, PopupTask::Teardown);

        if persist {
            if let Err(err) = self
                .persistent
                .set_flag(&self.config.permanent_dismiss_key)
            {
                tracing::warn!(
                    store = self.persistent.name(),
                    error = %err,
                    "failed to persist permanent dismissal"
                );
            }
            self.track(EventName::PermanentDismiss, Map::new());
        }

        let mut data = Map::new();
        data.insert(
            "dismissMethod".to_owned(),
            Value::String(method.as_str().to_owned()),
        );
        self.track(EventName::PopupDismissed, data);
        self.surface.set_phase(handle, PopupPhase::Closing);
        tracing::info!(method = method.as_str(), permanent = persist, "review popup closing");
        true
    }

    /// Check or uncheck the "don't show again" box.
    ///
    /// Returns `false` if no popup is accepting input.
    pub fn set_dont_show_again(&mut self, checked: bool) -> bool {
        let Some(instance) = self.instance.as_mut() else {
            return false;
        };
        if instance.phase == PopupPhase::Closing {
            return false;
        }
        instance.dont_show_again = checked;
        let checkbox = instance.elements.dont_show_again;
        self.surface.set_checked(checkbox, checked);
        true
    }

    // ── Variant / reset ──────────────────────────────────────────────────

    /// Switch the copy variant used for the next popup and for tracking.
    ///
    /// Only `"A"` and `"B"` are accepted; anything else is logged and leaves
    /// the variant unchanged.
    pub fn set_variant(&mut self, raw: &str) -> Result<(), VariantError> {
        match raw.parse::<Variant>() {
            Ok(variant) => {
                self.variant = variant;
                tracing::debug!(variant = variant.as_str(), "popup variant set");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    requested = raw,
                    current = self.variant.as_str(),
                    "rejected popup variant"
                );
                Err(err)
            }
        }
    }

    /// Clear both visibility flags so the popup may show again.
    ///
    /// An active popup is left alone.
    pub fn reset(&mut self) {
        if let Err(err) = self.persistent.remove(&self.config.permanent_dismiss_key) {
            tracing::warn!(store = self.persistent.name(), error = %err, "failed to clear permanent flag");
        }
        if let Err(err) = self.session.remove(&self.config.session_key) {
            tracing::warn!(store = self.session.name(), error = %err, "failed to clear session flag");
        }
        tracing::info!("review popup flags reset");
    }

    // ── Input ────────────────────────────────────────────────────────────

    /// Route one input event to the popup.
    pub fn handle_event(&mut self, event: &Event) -> PopupEvent {
        match event {
            Event::Key(key) => self.handle_key(key),
            Event::Click(click) => self.handle_click(click),
        }
    }

    fn handle_key(&mut self, key: &KeyEvent) -> PopupEvent {
        let Some(instance) = self.instance.as_ref() else {
            return PopupEvent::Ignored;
        };
        if !instance.listeners.contains(Listeners::KEYDOWN) || !key.is_keydown() {
            return PopupEvent::Ignored;
        }

        if key.code == KeyCode::Escape {
            return self.dismiss(DismissMethod::EscapeKey);
        }

        if let Some(backwards) = key.tab_direction() {
            let focusables = self.surface.query_focusable(instance.handle);
            return match trap_tab(&focusables, self.surface.focused(), backwards) {
                TabOutcome::Wrap(target) => {
                    self.surface.focus(target);
                    PopupEvent::FocusWrapped(target)
                }
                TabOutcome::Default => PopupEvent::FocusPassthrough,
            };
        }

        let focused_role = self
            .surface
            .focused()
            .and_then(|id| instance.elements.role_of(id));
        // Native control semantics: Enter activates buttons and the link,
        // Space activates buttons and toggles the checkbox.
        match (key.code, focused_role) {
            (
                KeyCode::Enter,
                Some(
                    role @ (PopupRole::CloseButton | PopupRole::ReviewLink | PopupRole::MaybeLater),
                ),
            )
            | (
                KeyCode::Char(' '),
                Some(
                    role @ (PopupRole::CloseButton
                    | PopupRole::MaybeLater
                    | PopupRole::DontShowAgain),
                ),
            ) => self.activate(role),
            _ => PopupEvent::Ignored,
        }
    }

    fn handle_click(&mut self, click: &ClickEvent) -> PopupEvent {
        let Some(instance) = self.instance.as_ref() else {
            return PopupEvent::Ignored;
        };
        let Some(role) = instance.elements.role_of(click.target) else {
            return PopupEvent::Ignored;
        };
        let needed = if role == PopupRole::Backdrop {
            Listeners::BACKDROP_CLICK
        } else {
            Listeners::CONTROL_CLICKS
        };
        if !instance.listeners.contains(needed) {
            return PopupEvent::Ignored;
        }
        self.activate(role)
    }

    fn activate(&mut self, role: PopupRole) -> PopupEvent {
        match role {
            PopupRole::Backdrop => self.dismiss(DismissMethod::OutsideClick),
            PopupRole::CloseButton => self.dismiss(DismissMethod::CloseX),
            PopupRole::MaybeLater => self.dismiss(DismissMethod::MaybeLater),
            PopupRole::ReviewLink => self.open_review(),
            PopupRole::DontShowAgain => {
                let checked = !self.dont_show_again();
                if self.set_dont_show_again(checked) {
                    PopupEvent::CheckboxToggled(checked)
                } else {
                    PopupEvent::Ignored
                }
            }
        }
    }

    fn dismiss(&mut self, method: DismissMethod) -> PopupEvent {
        if self.close(method) {
            PopupEvent::Dismissed(method)
        } else {
            PopupEvent::Ignored
        }
    }

    fn open_review(&mut self) -> PopupEvent {
        let now = self.clock.now_mono();
        let Some(instance) = self.instance.as_ref() else {
            return PopupEvent::Ignored;
        };
        if instance.phase == PopupPhase::Closing {
            return PopupEvent::Ignored;
        }
        self.tasks.schedule(
            now,
            self.config.review_close_delay,
            &instance.lifetime,
            PopupTask::ReviewClose,
        );
        self.track(EventName::ReviewClicked, Map::new());
        self.surface.open_link(&self.config.review_url);
        PopupEvent::ReviewOpened
    }

    // ── Time ─────────────────────────────────────────────────────────────

    /// Advance host time by `dt` and run every task that fell due.
    pub fn advance(&mut self, dt: Duration) {
        self.clock.advance(dt);
        self.run_due();
    }

    /// Move host time to `now` (never backwards) and run due tasks.
    pub fn advance_to(&mut self, now: Duration) {
        self.clock.set(now);
        self.run_due();
    }

    fn run_due(&mut self) {
        while let Some((due, task)) = self.tasks.pop_due(self.clock.now_mono()) {
            self.run_task(due, task);
        }
    }

    fn run_task(&mut self, due: Duration, task: PopupTask) {
        match task {
            PopupTask::Activate => {
                if let Some(instance) = self.instance.as_mut()
                    && instance.phase == PopupPhase::Entering
                {
                    instance.phase = PopupPhase::Open;
                    let handle = instance.handle;
                    self.surface.set_phase(handle, PopupPhase::Open);
                }
            }
            PopupTask::FocusPrimary => {
                if let Some(instance) = self.instance.as_ref()
                    && instance.phase != PopupPhase::Closing
                {
                    let target = instance.elements.review_link;
                    if !self.surface.focus(target) {
                        tracing::debug!(element = %target, "review link no longer focusable");
                    }
                }
            }
            PopupTask::ReviewClose => {
                self.close_at(DismissMethod::ReviewClicked, due);
            }
            PopupTask::Teardown => self.teardown(),
        }
    }

    fn teardown(&mut self) {
        let Some(instance) = self.instance.take() else {
            return;
        };
        instance.lifetime.cancel();
        self.surface.teardown(instance.handle);

        match instance.previously_focused {
            Some(prev) if self.surface.contains(prev) => {
                self.surface.focus(prev);
            }
            Some(prev) => {
                tracing::debug!(element = %prev, "previous focus holder is gone; not restoring");
            }
            None => {}
        }
        tracing::debug!(
            handle = instance.handle.get(),
            variant = instance.variant.as_str(),
            "review popup torn down"
        );
    }

    fn track(&mut self, name: EventName, data: Map<String, Value>) {
        self.tracker.track(name, self.variant, data);
        self.surface.set_marker(&name.marker_attribute());
    }
}

impl<S: FocusableSurface + std::fmt::Debug> std::fmt::Debug for ReviewPopup<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewPopup")
            .field("variant", &self.variant)
            .field("persistent", &self.persistent.name())
            .field("session", &self.session.name())
            .field("surface", &self.surface)
            .field("tracker", &self.tracker)
            .field("now", &self.clock.now_mono())
            .field("tasks", &self.tasks)
            .field("instance", &self.instance)
            .finish()
    }
}
