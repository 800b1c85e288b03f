//! Mobile drawer, anchor scrolling, header styling and back-to-top.

pub mod announce;
pub mod drawer;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::Serialize;
use web_time::Duration;

use self::announce::announce;
use self::drawer::{Drawer, DrawerState, DrawerTrigger};
use crate::dom::timing::throttled;
use crate::dom::url::base_path;
use crate::dom::{set_styles, Subscriptions};
use crate::error::FolioError;
use crate::host::{DomEvent, EventKind, EventTarget, Host};
use crate::lifecycle::{Manager, ManagerState, StateCell};
use crate::options::NavigationOptions;

/// In-page anchors that scroll smoothly.
pub const ANCHOR_SELECTOR: &str = "a[href^=\"#\"]";
/// Back-to-top control.
pub const BACK_TO_TOP_SELECTOR: &str = ".back-to-top-container";
/// Class added to the header once the page has scrolled.
pub const SCROLLED_CLASS: &str = "scrolled";

/// Snapshot returned by [`NavigationManager::navigation_state`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState {
    /// Whether the mobile drawer is open.
    pub mobile_navigation_open: bool,
    /// `scrollY` at the time of the call.
    pub current_scroll: f64,
    /// Whether the manager is ready.
    pub is_initialized: bool,
}

/// Reading progress in percent, capped at 100.
#[must_use]
pub fn scroll_percent(scroll_y: f64, document_height: f64, viewport_height: f64) -> f64 {
    let range = document_height - viewport_height;
    if range <= 0.0 {
        return 0.0;
    }
    (scroll_y / range * 100.0).clamp(0.0, 100.0)
}

/// Navigation behavior for one page.
pub struct NavigationManager<H: Host> {
    me: Weak<Self>,
    host: Rc<H>,
    options: NavigationOptions,
    state: StateCell,
    subs: RefCell<Option<Rc<Subscriptions<H>>>>,
    drawer: RefCell<Option<Rc<Drawer<H>>>>,
}

impl<H: Host> NavigationManager<H> {
    /// Manager for `host`; nothing happens until [`init`](Manager::init).
    pub fn new(host: Rc<H>, options: NavigationOptions) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            me: me.clone(),
            host,
            options,
            state: StateCell::default(),
            subs: RefCell::new(None),
            drawer: RefCell::new(None),
        })
    }

    fn subs(&self) -> Option<Rc<Subscriptions<H>>> {
        self.subs.borrow().as_ref().map(Rc::clone)
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn setup(&self, subs: &Rc<Subscriptions<H>>) {
        let base = base_path(&self.host.location_path());
        *self.drawer.borrow_mut() = Drawer::install(
            subs,
            base,
            Self::ms(self.options.drawer_focus_delay_ms),
            Self::ms(self.options.announcement_ms),
        );
        self.setup_anchors(subs);
        self.setup_header(subs);
        self.setup_back_to_top(subs);
        self.setup_keys(subs);
        if self.options.scroll_progress {
            self.setup_progress(subs);
        }
    }

    fn setup_anchors(&self, subs: &Rc<Subscriptions<H>>) {
        for link in self.host.select_all(ANCHOR_SELECTOR) {
            let me = self.me.clone();
            let own = link.clone();
            let _ = subs.listen(
                &EventTarget::Node(link),
                EventKind::Click,
                Rc::new(move |event| {
                    event.prevent_default();
                    let Some(nav) = me.upgrade() else { return };
                    let href = nav.host.attribute(&own, "href").unwrap_or_default();
                    let _ = nav.scroll_to_section(href.trim_start_matches('#'));
                }),
            );
        }
    }

    fn setup_header(&self, subs: &Rc<Subscriptions<H>>) {
        let Some(header) = self.host.select("header") else {
            return;
        };
        let host = Rc::downgrade(&self.host);
        let threshold = self.options.header_threshold;
        let handler = throttled(subs, Self::ms(self.options.header_throttle_ms), move || {
            let Some(host) = host.upgrade() else { return };
            if host.scroll_y() > threshold {
                host.add_class(&header, SCROLLED_CLASS);
            } else {
                host.remove_class(&header, SCROLLED_CLASS);
            }
        });
        let _ = subs.listen(&EventTarget::Window, EventKind::Scroll, handler);
    }

    fn setup_back_to_top(&self, subs: &Rc<Subscriptions<H>>) {
        let Some(button) = self.host.select(BACK_TO_TOP_SELECTOR) else {
            return;
        };
        let host = Rc::downgrade(&self.host);
        let own = button.clone();
        let handler = throttled(
            subs,
            Self::ms(self.options.back_to_top_throttle_ms),
            move || {
                let Some(host) = host.upgrade() else { return };
                let (visibility, opacity) = if host.scroll_y() == 0.0 {
                    ("hidden", "0")
                } else {
                    ("visible", "1")
                };
                set_styles(&*host, &own, &[("visibility", visibility), ("opacity", opacity)]);
            },
        );
        let _ = subs.listen(&EventTarget::Window, EventKind::Scroll, handler);

        let me = self.me.clone();
        let _ = subs.listen(
            &EventTarget::Node(button.clone()),
            EventKind::Click,
            Rc::new(move |_| {
                if let Some(nav) = me.upgrade() {
                    nav.scroll_to_top();
                }
            }),
        );
        let me = self.me.clone();
        let _ = subs.listen(
            &EventTarget::Node(button),
            EventKind::KeyDown,
            Rc::new(move |event| {
                if event.is_key("Enter") || event.is_key(" ") {
                    event.prevent_default();
                    if let Some(nav) = me.upgrade() {
                        nav.scroll_to_top();
                    }
                }
            }),
        );
    }

    fn setup_keys(&self, subs: &Rc<Subscriptions<H>>) {
        let me = self.me.clone();
        let _ = subs.listen(
            &EventTarget::Document,
            EventKind::KeyDown,
            Rc::new(move |event| {
                if let Some(nav) = me.upgrade() {
                    nav.handle_key(event);
                }
            }),
        );
    }

    fn handle_key(&self, event: &DomEvent<H::Node>) {
        if event.is_key("Escape") {
            let _ = self.drawer_trigger(DrawerTrigger::Escape);
            return;
        }
        if !event.alt_key {
            return;
        }
        let typing = event.target.as_ref().is_some_and(|t| {
            matches!(self.host.tag_name(t).as_str(), "INPUT" | "TEXTAREA")
        });
        if typing {
            return;
        }
        let Some(key) = event.key.as_deref() else { return };
        if key.eq_ignore_ascii_case("m") {
            event.prevent_default();
            let _ = self.drawer_trigger(DrawerTrigger::Shortcut);
        } else if let Some(section) = self.options.shortcut(key) {
            event.prevent_default();
            let section = section.to_owned();
            let _ = self.scroll_to_section(&section);
        }
    }

    fn setup_progress(&self, subs: &Rc<Subscriptions<H>>) {
        let Some(body) = self.host.body() else { return };
        let bar = match subs
            .inject(&body, "div", Some("scroll-progress"))
            .and_then(|track| subs.inject(&track, "div", Some("scroll-progress-bar")))
        {
            Ok(bar) => bar,
            Err(e) => {
                log::warn!("Scroll progress bar unavailable: {e}");
                return;
            }
        };
        let host = Rc::downgrade(&self.host);
        let update = move || {
            let Some(host) = host.upgrade() else { return };
            let percent = scroll_percent(
                host.scroll_y(),
                host.document_height(),
                host.viewport().height,
            );
            host.set_style(&bar, "width", &format!("{percent}%"));
        };
        update();
        let handler = throttled(subs, Self::ms(self.options.header_throttle_ms), update);
        let _ = subs.listen(&EventTarget::Window, EventKind::Scroll, handler);
    }

    fn drawer_trigger(&self, trigger: DrawerTrigger) -> bool {
        let drawer = self.drawer.borrow().as_ref().map(Rc::clone);
        drawer.is_some_and(|d| d.apply(trigger))
    }

    /// Open the drawer if closed, close it if open.
    pub fn toggle_drawer(&self) {
        let _ = self.drawer_trigger(DrawerTrigger::Toggle);
    }

    /// Close the drawer if open.
    pub fn close_drawer(&self) {
        let _ = self.drawer_trigger(DrawerTrigger::Dismiss);
    }

    /// Current drawer state; `Closed` when the page has no drawer.
    pub fn drawer_state(&self) -> DrawerState {
        self.drawer
            .borrow()
            .as_ref()
            .map_or(DrawerState::Closed, |d| d.state())
    }

    /// Smoothly scroll to `#id` below the fixed header, lock body scroll
    /// while the scroll runs and move focus to the target. Returns `false`
    /// (with a warning) when no such element exists.
    pub fn scroll_to_section(&self, id: &str) -> bool {
        let target = if id.is_empty() {
            None
        } else {
            self.host.select(&format!("#{id}"))
        };
        let Some(target) = target else {
            log::warn!("Target element #{id} not found");
            return false;
        };
        self.close_drawer();

        let top = self.host.offset_top(&target) - self.options.header_offset;
        let body = self.host.body();
        if let Some(body) = &body {
            self.host.set_style(body, "overflow", "hidden");
        }
        self.host.scroll_to(top, true);
        if let (Some(subs), Some(body)) = (self.subs(), body) {
            let host = Rc::clone(&self.host);
            let _ = subs.timeout(Self::ms(self.options.scroll_lock_ms), move || {
                host.set_style(&body, "overflow", "");
            });
        }
        self.focus_temporarily(&target);
        true
    }

    /// Scroll to the top of the page and move focus to the hero.
    pub fn scroll_to_top(&self) {
        self.host.scroll_to(0.0, true);
        if let Some(hero) = self.host.select("#hero").or_else(|| self.host.select("main")) {
            self.focus_temporarily(&hero);
        }
        self.announce("Scrolled to top");
    }

    fn focus_temporarily(&self, node: &H::Node) {
        self.host.set_attribute(node, "tabindex", "-1");
        self.host.focus(node);
        if let Some(subs) = self.subs() {
            let host = Rc::clone(&self.host);
            let node = node.clone();
            let _ = subs.timeout(Self::ms(self.options.focus_tabindex_ms), move || {
                host.remove_attribute(&node, "tabindex");
            });
        }
    }

    /// Post a screen-reader announcement.
    pub fn announce(&self, message: &str) {
        if let Some(subs) = self.subs() {
            announce(&subs, message, Self::ms(self.options.announcement_ms));
        }
    }

    /// Drawer, scroll and readiness snapshot.
    pub fn navigation_state(&self) -> NavigationState {
        NavigationState {
            mobile_navigation_open: self.drawer_state().is_open(),
            current_scroll: self.host.scroll_y(),
            is_initialized: self.state.is_ready(),
        }
    }
}

impl<H: Host> Manager for NavigationManager<H> {
    fn name(&self) -> &'static str {
        "navigation"
    }

    fn state(&self) -> ManagerState {
        self.state.get()
    }

    fn init(&self) -> Result<(), FolioError> {
        if !self.state.begin_init() {
            return Ok(());
        }
        let subs = Rc::new(Subscriptions::new(Rc::clone(&self.host)));
        *self.subs.borrow_mut() = Some(Rc::clone(&subs));
        self.setup(&subs);
        self.state.ready();
        log::info!("NavigationManager initialized");
        Ok(())
    }

    fn destroy(&self) {
        self.close_drawer();
        let _ = self.drawer.borrow_mut().take();
        if let Some(subs) = self.subs.borrow_mut().take() {
            subs.release();
        }
        if self.state.destroy() {
            log::info!("NavigationManager destroyed");
        }
    }

    fn status(&self) -> serde_json::Value {
        serde_json::to_value(self.navigation_state()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    const PAGE: &str = r##"
        <header>
          <nav><a href="#about">About</a><a href="#nowhere">Gone</a></nav>
          <img id="mobile-nav-icon" src="img/mobile-nav-icon.svg">
        </header>
        <div id="mobile-backdrop"></div>
        <div class="mobile-nav-container"><nav class="mobile-nav"><ul>
          <li><a href="#about">About</a></li>
        </ul></nav></div>
        <main>
          <section id="hero"></section>
          <section id="about"><input id="email"></section>
          <section id="projects"></section>
        </main>
        <div class="back-to-top-container" tabindex="0"></div>"##;

    fn page() -> (Rc<MemoryHost>, Rc<NavigationManager<MemoryHost>>) {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        for (id, top) in [("hero", 0.0), ("about", 900.0), ("projects", 1800.0)] {
            host.set_layout(host.select(&format!("#{id}")).unwrap(), top, 900.0);
        }
        let nav = NavigationManager::new(Rc::clone(&host), NavigationOptions::default());
        nav.init().unwrap();
        (host, nav)
    }

    #[test]
    fn anchor_click_scrolls_below_header_and_focuses_target() {
        let (host, nav) = page();
        let about = host.select("#about").unwrap();
        let body = host.body().unwrap();

        let event = host.click(host.select("header nav a").unwrap());
        assert!(event.default_prevented());
        assert_eq!(host.scroll_y(), 820.0);
        assert_eq!(host.active_element(), Some(about));
        assert_eq!(host.attribute(&about, "tabindex").as_deref(), Some("-1"));
        assert_eq!(host.style(body, "overflow").as_deref(), Some("hidden"));

        host.advance(Duration::from_millis(1000));
        assert!(host.attribute(&about, "tabindex").is_none());
        assert_eq!(host.style(body, "overflow"), None);
        assert!(nav.navigation_state().is_initialized);
    }

    #[test]
    fn missing_anchor_target_does_not_scroll() {
        let (host, nav) = page();
        host.scroll_window_to(300.0);
        let _ = host.click(host.select("a[href=\"#nowhere\"]").unwrap());
        assert_eq!(host.scroll_y(), 300.0);
        assert!(!nav.scroll_to_section(""));
    }

    #[test]
    fn anchor_navigation_closes_the_drawer() {
        let (host, nav) = page();
        nav.toggle_drawer();
        assert!(nav.drawer_state().is_open());
        assert!(nav.scroll_to_section("projects"));
        assert_eq!(nav.drawer_state(), DrawerState::Closed);
        assert_eq!(host.active_element(), host.select("#projects"));
    }

    #[test]
    fn header_and_back_to_top_follow_scroll() {
        let (host, _nav) = page();
        let header = host.select("header").unwrap();
        let button = host.select(BACK_TO_TOP_SELECTOR).unwrap();

        host.scroll_window_to(60.0);
        assert!(host.has_class(&header, SCROLLED_CLASS));
        assert_eq!(host.style(button, "visibility").as_deref(), Some("visible"));

        host.advance(Duration::from_millis(200));
        host.scroll_window_to(0.0);
        assert!(!host.has_class(&header, SCROLLED_CLASS));
        assert_eq!(host.style(button, "opacity").as_deref(), Some("0"));
    }

    #[test]
    fn back_to_top_keyboard_activation() {
        let (host, _nav) = page();
        host.scroll_window_to(1500.0);
        let button = host.select(BACK_TO_TOP_SELECTOR).unwrap();
        host.focus(&button);

        let event = host.press_key(" ", false, false);
        assert!(event.default_prevented());
        assert_eq!(host.scroll_y(), 0.0);
        assert_eq!(host.active_element(), host.select("#hero"));
        let note = host.select(".sr-only").unwrap();
        assert_eq!(host.text(&note), "Scrolled to top");
    }

    #[test]
    fn escape_and_alt_m_drive_the_drawer() {
        let (host, nav) = page();
        let _ = host.press_key("Escape", false, false);
        assert_eq!(nav.drawer_state(), DrawerState::Closed);

        let event = host.press_key("M", true, false);
        assert!(event.default_prevented());
        assert!(nav.drawer_state().is_open());

        let _ = host.press_key("Escape", false, false);
        assert_eq!(nav.drawer_state(), DrawerState::Closed);
    }

    #[test]
    fn section_shortcuts_skip_form_fields() {
        let (host, _nav) = page();
        let _ = host.press_key("p", true, false);
        assert_eq!(host.scroll_y(), 1720.0);

        host.focus(&host.select("#email").unwrap());
        let event = host.press_key("h", true, false);
        assert!(!event.default_prevented());
        assert_eq!(host.scroll_y(), 1720.0);
    }

    #[test]
    fn progress_bar_is_opt_in() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        host.set_layout(host.select("#projects").unwrap(), 0.0, 1800.0);
        let options = NavigationOptions {
            scroll_progress: true,
            ..NavigationOptions::default()
        };
        let nav = NavigationManager::new(Rc::clone(&host), options);
        nav.init().unwrap();
        let bar = host.select(".scroll-progress > .scroll-progress-bar").unwrap();
        assert_eq!(host.style(bar, "width").as_deref(), Some("0%"));

        host.scroll_window_to(500.0);
        assert_eq!(host.style(bar, "width").as_deref(), Some("50%"));

        nav.destroy();
        assert!(host.select(".scroll-progress").is_none());
    }

    #[test]
    fn destroy_closes_drawer_and_removes_everything() {
        let (host, nav) = page();
        nav.toggle_drawer();
        nav.destroy();
        assert_eq!(host.listener_count(), 0);
        assert_eq!(host.pending_timers(), 0);
        assert!(host.select(".sr-only").is_none());
        assert_eq!(host.style(host.body().unwrap(), "overflow"), None);
        assert_eq!(nav.state(), ManagerState::Destroyed);
        assert!(!nav.navigation_state().mobile_navigation_open);
    }

    #[test]
    fn scroll_percent_is_capped() {
        assert_eq!(scroll_percent(0.0, 800.0, 800.0), 0.0);
        assert_eq!(scroll_percent(250.0, 1300.0, 800.0), 50.0);
        assert_eq!(scroll_percent(900.0, 1300.0, 800.0), 100.0);
    }
}
