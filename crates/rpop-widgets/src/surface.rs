#![forbid(unsafe_code)]

//! The rendered surface the popup lives on.
//!
//! The controller never draws anything itself. It hands a [`PopupMarkup`] to
//! a [`FocusableSurface`], gets back the ids of the controls it needs to tell
//! apart, and from then on talks to the surface only in terms of opaque
//! [`ElementId`]s and a [`SurfaceHandle`].
//!
//! # Invariants
//!
//! - `query_focusable` returns the popup's focusable elements in document
//!   order, as the tree looks *now*.
//! - `focus` on an element that is no longer on the surface does nothing and
//!   returns `false`.
//! - After `teardown`, none of the popup's elements are on the surface.
//!
//! [`HeadlessSurface`] implements the contract in memory: no drawing, full
//! bookkeeping. Tests drive it directly, and terminal hosts can use it as the
//! focus model behind their own rendering.

use std::collections::{BTreeSet, HashMap};

use rpop_core::{ElementId, Variant};

/// Handle to one rendered popup on a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(u64);

impl SurfaceHandle {
    /// Create a handle from a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Visual phase of a rendered popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PopupPhase {
    /// Rendered, entry transition not started yet.
    #[default]
    Entering,
    /// Fully shown.
    Open,
    /// Exit transition running; teardown follows.
    Closing,
}

/// Structural role of a popup element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PopupRole {
    /// The dimmed full-screen overlay behind the card.
    Backdrop,
    /// The close (×) button.
    CloseButton,
    /// The primary call to action: the external review link.
    ReviewLink,
    /// The secondary "maybe later" button.
    MaybeLater,
    /// The "don't show this again" checkbox.
    DontShowAgain,
}

impl PopupRole {
    /// Focusable controls in document order.
    pub const FOCUS_ORDER: [PopupRole; 4] = [
        PopupRole::CloseButton,
        PopupRole::ReviewLink,
        PopupRole::MaybeLater,
        PopupRole::DontShowAgain,
    ];
}

/// What the surface should render.
///
/// Copy text and styling are the surface's business; the markup only fixes
/// structure and the values the controller depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupMarkup {
    /// Copy variant to render.
    pub variant: Variant,
    /// Target of the review link.
    pub review_url: String,
    /// Accessible dialog role (`aria-modal`).
    pub modal: bool,
}

/// Element ids of a rendered popup's controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupElements {
    /// The dimmed overlay.
    pub backdrop: ElementId,
    /// The close (×) button.
    pub close: ElementId,
    /// The review link.
    pub review_link: ElementId,
    /// The "maybe later" button.
    pub maybe_later: ElementId,
    /// The "don't show again" checkbox.
    pub dont_show_again: ElementId,
}

impl PopupElements {
    /// Id of the element playing `role`.
    #[must_use]
    pub const fn get(&self, role: PopupRole) -> ElementId {
        match role {
            PopupRole::Backdrop => self.backdrop,
            PopupRole::CloseButton => self.close,
            PopupRole::ReviewLink => self.review_link,
            PopupRole::MaybeLater => self.maybe_later,
            PopupRole::DontShowAgain => self.dont_show_again,
        }
    }

    /// Role of `element`, if it is one of the popup's controls.
    ///
    /// Elements inside the card that are not controls (text, badges) have no
    /// role, which is what keeps a click on the card from counting as a
    /// backdrop click.
    #[must_use]
    pub fn role_of(&self, element: ElementId) -> Option<PopupRole> {
        [PopupRole::Backdrop]
            .into_iter()
            .chain(PopupRole::FOCUS_ORDER)
            .find(|role| self.get(*role) == element)
    }
}

/// Result of rendering a popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderedPopup {
    /// Handle for later surface calls.
    pub handle: SurfaceHandle,
    /// Ids of the popup's controls.
    pub elements: PopupElements,
}

/// A rendered tree that can host the popup and manage keyboard focus.
pub trait FocusableSurface {
    /// Render a popup and return its handle and control ids.
    fn render(&mut self, markup: &PopupMarkup) -> RenderedPopup;

    /// Remove a rendered popup. Unknown handles are ignored.
    fn teardown(&mut self, handle: SurfaceHandle);

    /// Focusable elements of the popup, in document order.
    fn query_focusable(&self, handle: SurfaceHandle) -> Vec<ElementId>;

    /// Move focus to `element`. Returns `false` if it is not on the surface.
    fn focus(&mut self, element: ElementId) -> bool;

    /// The element currently holding focus, if any.
    fn focused(&self) -> Option<ElementId>;

    /// Whether `element` is still on the surface.
    fn contains(&self, element: ElementId) -> bool;

    /// Switch the popup's visual phase (drives the CSS/terminal transition).
    fn set_phase(&mut self, _handle: SurfaceHandle, _phase: PopupPhase) {}

    /// Reflect the checkbox state.
    fn set_checked(&mut self, _element: ElementId, _checked: bool) {}

    /// Open an external link in a new browsing context.
    fn open_link(&mut self, _url: &str) {}

    /// Set a `data-*` marker attribute on the host document.
    fn set_marker(&mut self, _attribute: &str) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Headless surface
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct HeadlessPopup {
    markup: PopupMarkup,
    elements: PopupElements,
    /// Non-control nodes inside the card (headline, badge, ...).
    card: ElementId,
    focusable: Vec<ElementId>,
    phase: PopupPhase,
    checked: bool,
}

/// In-memory [`FocusableSurface`].
///
/// Besides popups, the surface holds "host" elements standing in for the
/// page the popup is shown over, so focus restoration can be exercised.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    next_id: u64,
    host_elements: Vec<ElementId>,
    popups: HashMap<SurfaceHandle, HeadlessPopup>,
    focused: Option<ElementId>,
    opened_links: Vec<String>,
    markers: BTreeSet<String>,
    renders: usize,
}

impl HeadlessSurface {
    /// Create an empty surface.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self) -> ElementId {
        self.next_id += 1;
        ElementId::new(self.next_id)
    }

    /// Add a focusable page element outside any popup.
    pub fn add_host_element(&mut self) -> ElementId {
        let id = self.alloc();
        self.host_elements.push(id);
        id
    }

    /// Remove a page element; drops focus if it held it.
    pub fn remove_host_element(&mut self, element: ElementId) {
        self.host_elements.retain(|e| *e != element);
        if self.focused == Some(element) {
            self.focused = None;
        }
    }

    /// Remove `element` from a popup's focusable set, as if it were hidden.
    pub fn hide_focusable(&mut self, handle: SurfaceHandle, element: ElementId) {
        if let Some(popup) = self.popups.get_mut(&handle) {
            popup.focusable.retain(|e| *e != element);
        }
        if self.focused == Some(element) {
            self.focused = None;
        }
    }

    /// The non-control card element of a popup.
    #[must_use]
    pub fn card(&self, handle: SurfaceHandle) -> Option<ElementId> {
        self.popups.get(&handle).map(|p| p.card)
    }

    /// Markup a popup was rendered from.
    #[must_use]
    pub fn markup(&self, handle: SurfaceHandle) -> Option<&PopupMarkup> {
        self.popups.get(&handle).map(|p| &p.markup)
    }

    /// Current visual phase of a popup.
    #[must_use]
    pub fn phase(&self, handle: SurfaceHandle) -> Option<PopupPhase> {
        self.popups.get(&handle).map(|p| p.phase)
    }

    /// Rendered checkbox state of a popup.
    #[must_use]
    pub fn is_checked(&self, handle: SurfaceHandle) -> Option<bool> {
        self.popups.get(&handle).map(|p| p.checked)
    }

    /// Number of popups currently on the surface.
    #[must_use]
    pub fn live_popups(&self) -> usize {
        self.popups.len()
    }

    /// Total number of `render` calls.
    #[must_use]
    pub fn render_count(&self) -> usize {
        self.renders
    }

    /// Links opened through [`FocusableSurface::open_link`], oldest first.
    #[must_use]
    pub fn opened_links(&self) -> &[String] {
        &self.opened_links
    }

    /// Whether a marker attribute has been set.
    #[must_use]
    pub fn has_marker(&self, attribute: &str) -> bool {
        self.markers.contains(attribute)
    }

    /// Default Tab traversal over every focusable element in document order
    /// (host elements first, then popups), without any trap.
    ///
    /// Returns the newly focused element.
    pub fn tab(&mut self, backwards: bool) -> Option<ElementId> {
        let mut handles: Vec<_> = self.popups.keys().copied().collect();
        handles.sort_by_key(|h| h.get());
        let order: Vec<ElementId> = self
            .host_elements
            .iter()
            .copied()
            .chain(handles.iter().flat_map(|h| self.popups[h].focusable.iter().copied()))
            .collect();
        if order.is_empty() {
            return None;
        }

        let next = match self.focused.and_then(|f| order.iter().position(|e| *e == f)) {
            None if backwards => order.len() - 1,
            None => 0,
            Some(0) if backwards => order.len() - 1,
            Some(i) if backwards => i - 1,
            Some(i) => (i + 1) % order.len(),
        };
        self.focused = Some(order[next]);
        self.focused
    }
}

impl FocusableSurface for HeadlessSurface {
    fn render(&mut self, markup: &PopupMarkup) -> RenderedPopup {
        self.renders += 1;
        self.next_id += 1;
        let handle = SurfaceHandle::new(self.next_id);
        let elements = PopupElements {
            backdrop: self.alloc(),
            close: self.alloc(),
            review_link: self.alloc(),
            maybe_later: self.alloc(),
            dont_show_again: self.alloc(),
        };
        let card = self.alloc();
        let focusable = PopupRole::FOCUS_ORDER
            .iter()
            .map(|role| elements.get(*role))
            .collect();
        self.popups.insert(
            handle,
            HeadlessPopup {
                markup: markup.clone(),
                elements,
                card,
                focusable,
                phase: PopupPhase::Entering,
                checked: false,
            },
        );
        RenderedPopup { handle, elements }
    }

    fn teardown(&mut self, handle: SurfaceHandle) {
        let Some(popup) = self.popups.remove(&handle) else {
            return;
        };
        let e = popup.elements;
        let owned = [
            e.backdrop,
            e.close,
            e.review_link,
            e.maybe_later,
            e.dont_show_again,
            popup.card,
        ];
        if self.focused.is_some_and(|f| owned.contains(&f)) {
            self.focused = None;
        }
    }

    fn query_focusable(&self, handle: SurfaceHandle) -> Vec<ElementId> {
        self.popups
            .get(&handle)
            .map(|p| p.focusable.clone())
            .unwrap_or_default()
    }

    fn focus(&mut self, element: ElementId) -> bool {
        if !self.contains(element) {
            return false;
        }
        self.focused = Some(element);
        true
    }

    fn focused(&self) -> Option<ElementId> {
        self.focused
    }

    fn contains(&self, element: ElementId) -> bool {
        self.host_elements.contains(&element)
            || self.popups.values().any(|p| {
                p.card == element
                    || p.elements.backdrop == element
                    || p.focusable.contains(&element)
            })
    }

    fn set_phase(&mut self, handle: SurfaceHandle, phase: PopupPhase) {
        if let Some(popup) = self.popups.get_mut(&handle) {
            popup.phase = phase;
        }
    }

    fn set_checked(&mut self, element: ElementId, checked: bool) {
        if let Some(popup) = self
            .popups
            .values_mut()
            .find(|p| p.elements.dont_show_again == element)
        {
            popup.checked = checked;
        }
    }

    fn open_link(&mut self, url: &str) {
        self.opened_links.push(url.to_owned());
    }

    fn set_marker(&mut self, attribute: &str) {
        self.markers.insert(attribute.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markup() -> PopupMarkup {
        PopupMarkup {
            variant: Variant::B,
            review_url: "https://example.test/review".into(),
            modal: true,
        }
    }

    #[test]
    fn render_exposes_controls_in_focus_order() {
        let mut surface = HeadlessSurface::new();
        let rendered = surface.render(&markup());
        let e = rendered.elements;
        assert_eq!(
            surface.query_focusable(rendered.handle),
            vec![e.close, e.review_link, e.maybe_later, e.dont_show_again]
        );
        assert_eq!(surface.phase(rendered.handle), Some(PopupPhase::Entering));
        assert_eq!(surface.render_count(), 1);
    }

    #[test]
    fn role_lookup() {
        let mut surface = HeadlessSurface::new();
        let rendered = surface.render(&markup());
        let e = rendered.elements;
        assert_eq!(e.role_of(e.backdrop), Some(PopupRole::Backdrop));
        assert_eq!(e.role_of(e.dont_show_again), Some(PopupRole::DontShowAgain));
        let card = surface.card(rendered.handle).unwrap();
        assert_eq!(e.role_of(card), None);
    }

    #[test]
    fn teardown_removes_elements_and_drops_focus() {
        let mut surface = HeadlessSurface::new();
        let rendered = surface.render(&markup());
        assert!(surface.focus(rendered.elements.review_link));

        surface.teardown(rendered.handle);

        assert_eq!(surface.live_popups(), 0);
        assert_eq!(surface.focused(), None);
        assert!(!surface.contains(rendered.elements.review_link));
        assert!(surface.query_focusable(rendered.handle).is_empty());
        assert!(!surface.focus(rendered.elements.close));
    }

    #[test]
    fn removed_host_element_cannot_take_focus() {
        let mut surface = HeadlessSurface::new();
        let button = surface.add_host_element();
        assert!(surface.focus(button));
        surface.remove_host_element(button);
        assert_eq!(surface.focused(), None);
        assert!(!surface.focus(button));
    }

    #[test]
    fn default_tab_walks_document_order() {
        let mut surface = HeadlessSurface::new();
        let host = surface.add_host_element();
        let rendered = surface.render(&markup());
        assert_eq!(surface.tab(false), Some(host));
        assert_eq!(surface.tab(false), Some(rendered.elements.close));
        assert_eq!(surface.tab(true), Some(host));
        assert_eq!(surface.tab(true), Some(rendered.elements.dont_show_again));
    }

    #[test]
    fn hide_focusable_shrinks_set() {
        let mut surface = HeadlessSurface::new();
        let rendered = surface.render(&markup());
        surface.hide_focusable(rendered.handle, rendered.elements.close);
        assert_eq!(surface.query_focusable(rendered.handle).len(), 3);
        assert!(!surface.contains(rendered.elements.close));
    }

    #[test]
    fn checkbox_and_markers_recorded() {
        let mut surface = HeadlessSurface::new();
        let rendered = surface.render(&markup());
        surface.set_checked(rendered.elements.dont_show_again, true);
        surface.set_marker("data-popup-popup-shown");
        surface.open_link("https://example.test/review");
        assert_eq!(surface.is_checked(rendered.handle), Some(true));
        assert!(surface.has_marker("data-popup-popup-shown"));
        assert_eq!(surface.opened_links(), ["https://example.test/review"]);
    }
}
