#![forbid(unsafe_code)]

//! Focus trap wrap rule.
//!
//! While a modal popup is open, Tab must cycle inside it. Browsers and
//! terminal hosts already move focus between neighbours; the trap only has
//! to intervene at the two edges:
//!
//! - Tab on the last focusable element wraps to the first.
//! - Shift+Tab on the first focusable element wraps to the last.
//!
//! Everything else is left to default traversal.

use rpop_core::ElementId;

/// What the focus trap decided for one Tab press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabOutcome {
    /// Focus must move to this element instead of the default target.
    Wrap(ElementId),
    /// Default traversal applies.
    Default,
}

/// Apply the wrap rule to an ordered set of focusable elements.
///
/// `focusables` must be the current document-order set; callers recompute it
/// for every key press. An empty set, or an active element outside the set,
/// yields [`TabOutcome::Default`].
#[must_use]
pub fn trap_tab(focusables: &[ElementId], active: Option<ElementId>, backwards: bool) -> TabOutcome {
    let (Some(&first), Some(&last)) = (focusables.first(), focusables.last()) else {
        return TabOutcome::Default;
    };
    let Some(active) = active else {
        return TabOutcome::Default;
    };

    if backwards && active == first {
        TabOutcome::Wrap(last)
    } else if !backwards && active == last {
        TabOutcome::Wrap(first)
    } else {
        TabOutcome::Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<ElementId> {
        raw.iter().copied().map(ElementId::new).collect()
    }

    #[test]
    fn tab_on_last_wraps_to_first() {
        let order = ids(&[1, 2, 3, 4]);
        assert_eq!(
            trap_tab(&order, Some(ElementId::new(4)), false),
            TabOutcome::Wrap(ElementId::new(1))
        );
    }

    #[test]
    fn shift_tab_on_first_wraps_to_last() {
        let order = ids(&[1, 2, 3, 4]);
        assert_eq!(
            trap_tab(&order, Some(ElementId::new(1)), true),
            TabOutcome::Wrap(ElementId::new(4))
        );
    }

    #[test]
    fn middle_elements_use_default() {
        let order = ids(&[1, 2, 3, 4]);
        for active in [2, 3] {
            assert_eq!(trap_tab(&order, Some(ElementId::new(active)), false), TabOutcome::Default);
            assert_eq!(trap_tab(&order, Some(ElementId::new(active)), true), TabOutcome::Default);
        }
        assert_eq!(trap_tab(&order, Some(ElementId::new(1)), false), TabOutcome::Default);
        assert_eq!(trap_tab(&order, Some(ElementId::new(4)), true), TabOutcome::Default);
    }

    #[test]
    fn empty_set_is_default() {
        assert_eq!(trap_tab(&[], Some(ElementId::new(1)), false), TabOutcome::Default);
    }

    #[test]
    fn no_focus_holder_is_default() {
        assert_eq!(trap_tab(&ids(&[1, 2]), None, false), TabOutcome::Default);
    }

    #[test]
    fn outside_focus_holder_is_default() {
        assert_eq!(
            trap_tab(&ids(&[1, 2]), Some(ElementId::new(99)), true),
            TabOutcome::Default
        );
    }

    #[test]
    fn single_element_wraps_to_itself() {
        let only = ElementId::new(5);
        assert_eq!(trap_tab(&[only], Some(only), false), TabOutcome::Wrap(only));
        assert_eq!(trap_tab(&[only], Some(only), true), TabOutcome::Wrap(only));
    }
}
