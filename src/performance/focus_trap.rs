//! Keep Tab focus inside dialogs.

use std::rc::Rc;

use crate::dom::Subscriptions;
use crate::host::{EventKind, EventTarget, Host};

/// Containers that trap focus.
pub const TRAP_SELECTOR: &str = "[role=\"dialog\"], .modal";
/// Elements that can receive keyboard focus.
pub const FOCUSABLE_SELECTOR: &str = "button, [href], input, select, textarea, \
     [tabindex]:not([tabindex=\"-1\"])";

/// Where focus should jump for a Tab press, if it has to wrap.
///
/// Shift+Tab on the first focusable element goes to the last one and Tab on
/// the last goes to the first; anything else is left to the browser.
pub fn wrap_target<N: PartialEq + Clone>(
    focusable: &[N],
    active: Option<&N>,
    backwards: bool,
) -> Option<N> {
    let (first, last) = (focusable.first()?, focusable.last()?);
    let active = active?;
    if backwards && active == first {
        Some(last.clone())
    } else if !backwards && active == last {
        Some(first.clone())
    } else {
        None
    }
}

/// Trap focus inside `container`.
pub fn install<H: Host>(subs: &Rc<Subscriptions<H>>, container: &H::Node) {
    let host = Rc::downgrade(subs.host());
    let scope = container.clone();
    let _ = subs.listen(
        &EventTarget::Node(container.clone()),
        EventKind::KeyDown,
        Rc::new(move |event| {
            if !event.is_key("Tab") {
                return;
            }
            let Some(host) = host.upgrade() else { return };
            let focusable = host.select_within(&scope, FOCUSABLE_SELECTOR);
            let active = host.active_element();
            if let Some(next) =
                wrap_target(&focusable, active.as_ref(), event.shift_key)
            {
                event.prevent_default();
                host.focus(&next);
            }
        }),
    );
}

/// Trap focus inside every dialog on the page. Returns how many were found.
pub fn install_all<H: Host>(subs: &Rc<Subscriptions<H>>) -> usize {
    let dialogs = subs.host().select_all(TRAP_SELECTOR);
    for dialog in &dialogs {
        install(subs, dialog);
    }
    dialogs.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    #[test]
    fn only_the_edges_wrap() {
        let items = [1, 2, 3];
        assert_eq!(wrap_target(&items, Some(&3), false), Some(1));
        assert_eq!(wrap_target(&items, Some(&1), true), Some(3));
        assert_eq!(wrap_target(&items, Some(&2), false), None);
        assert_eq!(wrap_target(&items, Some(&1), false), None);
        assert_eq!(wrap_target::<i32>(&[], Some(&1), false), None);
        assert_eq!(wrap_target(&items, None, true), None);
    }

    #[test]
    fn tab_cycles_inside_the_dialog() {
        let host = Rc::new(MemoryHost::from_html(
            "<div role=\"dialog\">\
               <button id=\"first\">A</button>\
               <span tabindex=\"-1\">skip</span>\
               <a id=\"last\" href=\"#x\">B</a>\
             </div>",
        ));
        let subs = Rc::new(Subscriptions::new(Rc::clone(&host)));
        assert_eq!(install_all(&subs), 1);
        let first = host.select("#first").unwrap();
        let last = host.select("#last").unwrap();

        host.focus(&last);
        let event = host.press_key("Tab", false, false);
        assert!(event.default_prevented());
        assert_eq!(host.active_element(), Some(first));

        let event = host.press_key("Tab", false, true);
        assert!(event.default_prevented());
        assert_eq!(host.active_element(), Some(last));

        host.focus(&first);
        let event = host.press_key("Tab", false, false);
        assert!(!event.default_prevented());
    }
}
