//! Polite screen-reader announcements.

use std::rc::Rc;

use web_time::Duration;

use crate::dom::Subscriptions;
use crate::host::Host;

/// Class of the visually hidden live region.
pub const ANNOUNCE_CLASS: &str = "sr-only";

/// Append a short-lived `aria-live` region carrying `message` to the body.
/// The node is removed after `lifetime`, or on release if that comes first.
pub fn announce<H: Host>(subs: &Subscriptions<H>, message: &str, lifetime: Duration) {
    let host = subs.host();
    let Some(body) = host.body() else { return };
    let node = match subs.inject(&body, "div", Some(ANNOUNCE_CLASS)) {
        Ok(node) => node,
        Err(e) => {
            log::debug!("Announcement skipped: {e}");
            return;
        }
    };
    host.set_attribute(&node, "aria-live", "polite");
    host.set_attribute(&node, "aria-atomic", "true");
    host.set_text(&node, message);

    let host = Rc::clone(host);
    let _ = subs.timeout(lifetime, move || {
        if host.is_connected(&node) {
            host.remove(&node);
        }
    });
}
