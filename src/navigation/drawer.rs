//! Mobile navigation drawer.
//!
//! [`DrawerState`] is the single source of truth: the toggle icon, the
//! drawer/backdrop `open` classes and the body scroll lock are all derived
//! from it whenever it changes.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use web_time::Duration;

use super::announce::announce;
use crate::dom::Subscriptions;
use crate::host::{EventKind, EventTarget, Host};

/// Toggle icon.
pub const ICON_SELECTOR: &str = "#mobile-nav-icon";
/// Drawer container.
pub const CONTAINER_SELECTOR: &str = ".mobile-nav-container";
/// Dimmed backdrop behind the drawer.
pub const BACKDROP_SELECTOR: &str = "#mobile-backdrop";
/// Links inside the drawer.
pub const LINK_SELECTOR: &str = ".mobile-nav > ul > li a";
/// Class applied to the drawer and backdrop while open.
pub const OPEN_CLASS: &str = "open";

/// Drawer visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawerState {
    /// Hidden; page scrolls normally.
    #[default]
    Closed,
    /// Visible; body scroll locked.
    Open,
}

/// Inputs that can move the drawer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawerTrigger {
    /// Toggle icon click.
    Toggle,
    /// Alt+M.
    Shortcut,
    /// Backdrop click.
    Backdrop,
    /// Click on the container itself, outside the menu.
    EmptyArea,
    /// Click on a link inside the drawer.
    Link,
    /// Escape key.
    Escape,
    /// Programmatic close (anchor navigation, teardown).
    Dismiss,
}

impl DrawerState {
    /// State after `trigger`.
    #[must_use]
    pub fn next(self, trigger: DrawerTrigger) -> Self {
        match (self, trigger) {
            (Self::Closed, DrawerTrigger::Toggle | DrawerTrigger::Shortcut) => {
                Self::Open
            }
            _ => Self::Closed,
        }
    }

    /// Whether the drawer is showing.
    #[must_use]
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

/// The drawer's elements plus its state.
pub struct Drawer<H: Host> {
    subs: Weak<Subscriptions<H>>,
    icon: H::Node,
    container: H::Node,
    backdrop: H::Node,
    base: &'static str,
    state: Cell<DrawerState>,
    focus_delay: Duration,
    announcement: Duration,
}

impl<H: Host> Drawer<H> {
    /// Find the drawer's elements and wire its triggers. Returns `None` when
    /// any of the three elements is missing.
    pub fn install(
        subs: &Rc<Subscriptions<H>>,
        base: &'static str,
        focus_delay: Duration,
        announcement: Duration,
    ) -> Option<Rc<Self>> {
        let host = subs.host();
        let (Some(icon), Some(container), Some(backdrop)) = (
            host.select(ICON_SELECTOR),
            host.select(CONTAINER_SELECTOR),
            host.select(BACKDROP_SELECTOR),
        ) else {
            log::debug!("Mobile navigation elements not found");
            return None;
        };
        let links = host.select_all(LINK_SELECTOR);
        let drawer = Rc::new(Self {
            subs: Rc::downgrade(subs),
            icon,
            container,
            backdrop,
            base,
            state: Cell::new(DrawerState::Closed),
            focus_delay,
            announcement,
        });

        drawer.on_click(subs, drawer.icon.clone(), DrawerTrigger::Toggle);
        drawer.on_click(subs, drawer.backdrop.clone(), DrawerTrigger::Backdrop);
        drawer.on_click(subs, drawer.container.clone(), DrawerTrigger::EmptyArea);
        for link in links {
            drawer.on_click(subs, link, DrawerTrigger::Link);
        }
        Some(drawer)
    }

    fn on_click(
        self: &Rc<Self>,
        subs: &Subscriptions<H>,
        node: H::Node,
        trigger: DrawerTrigger,
    ) {
        let weak = Rc::downgrade(self);
        let own = node.clone();
        let _ = subs.listen(
            &EventTarget::Node(node),
            EventKind::Click,
            Rc::new(move |event| {
                let Some(drawer) = weak.upgrade() else { return };
                if trigger == DrawerTrigger::EmptyArea
                    && event.target.as_ref() != Some(&own)
                {
                    return;
                }
                let _ = drawer.apply(trigger);
            }),
        );
    }

    /// Current state.
    pub fn state(&self) -> DrawerState {
        self.state.get()
    }

    /// Feed a trigger through the state machine and render the result.
    /// Returns whether the state changed.
    pub fn apply(&self, trigger: DrawerTrigger) -> bool {
        let before = self.state.get();
        let after = before.next(trigger);
        if before == after {
            return false;
        }
        self.state.set(after);
        let Some(subs) = self.subs.upgrade() else {
            return true;
        };
        match after {
            DrawerState::Open => self.render_open(&subs),
            DrawerState::Closed => self.render_closed(&subs),
        }
        true
    }

    fn render_open(&self, subs: &Subscriptions<H>) {
        let host = subs.host();
        host.set_attribute(
            &self.icon,
            "src",
            &format!("{}img/mobile-nav-icon-close.svg", self.base),
        );
        host.set_attribute(&self.icon, "aria-label", "Close menu");
        host.add_class(&self.container, OPEN_CLASS);
        host.add_class(&self.backdrop, OPEN_CLASS);
        if let Some(body) = host.body() {
            host.set_style(&body, "overflow", "hidden");
        }
        if let Some(first) =
            host.select_within(&self.container, "a, button").into_iter().next()
        {
            let host = Rc::clone(host);
            let _ = subs.timeout(self.focus_delay, move || host.focus(&first));
        }
        announce(subs, "Menu opened", self.announcement);
    }

    fn render_closed(&self, subs: &Subscriptions<H>) {
        let host = subs.host();
        host.set_attribute(
            &self.icon,
            "src",
            &format!("{}img/mobile-nav-icon.svg", self.base),
        );
        host.set_attribute(&self.icon, "aria-label", "Open menu");
        host.remove_class(&self.container, OPEN_CLASS);
        host.remove_class(&self.backdrop, OPEN_CLASS);
        if let Some(body) = host.body() {
            host.set_style(&body, "overflow", "");
        }
        host.focus(&self.icon);
        announce(subs, "Menu closed", self.announcement);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    const MARKUP: &str = r##"
        <header><img id="mobile-nav-icon" src="img/mobile-nav-icon.svg"></header>
        <div id="mobile-backdrop"></div>
        <div class="mobile-nav-container">
          <nav class="mobile-nav"><ul>
            <li><a href="#about">About</a></li>
            <li><a href="#projects">Projects</a></li>
          </ul></nav>
        </div>"##;

    fn install(host: &Rc<MemoryHost>) -> (Rc<Subscriptions<MemoryHost>>, Rc<Drawer<MemoryHost>>) {
        let subs = Rc::new(Subscriptions::new(Rc::clone(host)));
        let drawer = Drawer::install(
            &subs,
            "",
            Duration::from_millis(100),
            Duration::from_millis(1000),
        )
        .unwrap();
        (subs, drawer)
    }

    #[test]
    fn transition_table() {
        use DrawerTrigger::*;
        let open = DrawerState::Open;
        let closed = DrawerState::Closed;
        assert_eq!(closed.next(Toggle), open);
        assert_eq!(open.next(Toggle), closed);
        assert_eq!(closed.next(Shortcut), open);
        for t in [Backdrop, EmptyArea, Link, Escape, Dismiss] {
            assert_eq!(open.next(t), closed);
            assert_eq!(closed.next(t), closed);
        }
    }

    #[test]
    fn toggle_twice_restores_everything() {
        let host = Rc::new(MemoryHost::from_html(MARKUP));
        let (_subs, drawer) = install(&host);
        let icon = host.select(ICON_SELECTOR).unwrap();
        let container = host.select(CONTAINER_SELECTOR).unwrap();
        let body = host.body().unwrap();

        let _ = host.click(icon);
        assert!(drawer.state().is_open());
        assert!(host.has_class(&container, OPEN_CLASS));
        assert_eq!(host.style(body, "overflow").as_deref(), Some("hidden"));
        assert_eq!(
            host.attribute(&icon, "src").as_deref(),
            Some("img/mobile-nav-icon-close.svg")
        );
        assert_eq!(host.attribute(&icon, "aria-label").as_deref(), Some("Close menu"));

        host.advance(Duration::from_millis(100));
        assert_eq!(host.active_element(), host.select(".mobile-nav a"));

        let _ = host.click(icon);
        assert_eq!(drawer.state(), DrawerState::Closed);
        assert!(!host.has_class(&container, OPEN_CLASS));
        assert_eq!(host.style(body, "overflow"), None);
        assert_eq!(host.active_element(), Some(icon));
    }

    #[test]
    fn empty_area_closes_only_on_direct_hits() {
        let host = Rc::new(MemoryHost::from_html(MARKUP));
        let (_subs, drawer) = install(&host);
        let _ = drawer.apply(DrawerTrigger::Toggle);

        let _ = host.click(host.select(".mobile-nav").unwrap());
        assert!(drawer.state().is_open());
        let _ = host.click(host.select(CONTAINER_SELECTOR).unwrap());
        assert!(!drawer.state().is_open());
    }

    #[test]
    fn links_and_backdrop_close() {
        let host = Rc::new(MemoryHost::from_html(MARKUP));
        let (_subs, drawer) = install(&host);

        let _ = drawer.apply(DrawerTrigger::Toggle);
        let _ = host.click(host.select(LINK_SELECTOR).unwrap());
        assert!(!drawer.state().is_open());

        let _ = drawer.apply(DrawerTrigger::Toggle);
        let _ = host.click(host.select(BACKDROP_SELECTOR).unwrap());
        assert!(!drawer.state().is_open());
    }

    #[test]
    fn announcements_expire() {
        let host = Rc::new(MemoryHost::from_html(MARKUP));
        let (_subs, drawer) = install(&host);
        let _ = drawer.apply(DrawerTrigger::Toggle);
        let note = host.select(".sr-only").unwrap();
        assert_eq!(host.text(&note), "Menu opened");
        assert_eq!(host.attribute(&note, "aria-live").as_deref(), Some("polite"));
        host.advance(Duration::from_millis(1000));
        assert!(host.select(".sr-only").is_none());
    }

    #[test]
    fn project_pages_use_the_parent_asset_path() {
        let host = Rc::new(MemoryHost::from_html(MARKUP));
        let subs = Rc::new(Subscriptions::new(Rc::clone(&host)));
        let drawer = Drawer::install(
            &subs,
            "../",
            Duration::from_millis(100),
            Duration::from_millis(1000),
        )
        .unwrap();
        let _ = drawer.apply(DrawerTrigger::Shortcut);
        let icon = host.select(ICON_SELECTOR).unwrap();
        assert_eq!(
            host.attribute(&icon, "src").as_deref(),
            Some("../img/mobile-nav-icon-close.svg")
        );
    }

    #[test]
    fn missing_elements_skip_the_drawer() {
        let host = Rc::new(MemoryHost::from_html("<header></header>"));
        let subs = Rc::new(Subscriptions::new(Rc::clone(&host)));
        assert!(Drawer::install(&subs, "", Duration::ZERO, Duration::ZERO).is_none());
        assert_eq!(host.listener_count(), 0);
    }
}
