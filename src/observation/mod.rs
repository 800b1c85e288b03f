//! Viewport-driven reveals, active-link tracking and lazy images.
//!
//! The [`ObservationManager`] owns a registry of named intersection
//! watchers. Three are built in (`scrollAnimation`, `content`, `lazyLoad`);
//! callers may add their own with [`ObservationManager::add_observer`].
//! Without intersection support everything is revealed immediately and only
//! the scroll-based active-link tracking remains.

pub mod active_section;
pub mod lazy_image;
pub mod reveal;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rustc_hash::FxHashMap;
use serde_json::json;
use web_time::Duration;

use self::active_section::ActiveLinks;
use self::lazy_image::LazySwap;
use crate::dom::Subscriptions;
use crate::error::FolioError;
use crate::host::{Capability, Host, WatchCallback, WatchOptions, WatcherId};
use crate::lifecycle::{Manager, ManagerState, StateCell};
use crate::options::ObservationOptions;

/// Registry name of the section reveal watcher.
pub const SCROLL_ANIMATION: &str = "scrollAnimation";
/// Registry name of the card reveal watcher.
pub const CONTENT: &str = "content";
/// Registry name of the lazy image watcher.
pub const LAZY_LOAD: &str = "lazyLoad";

struct Registration<N> {
    watcher: Option<WatcherId>,
    targets: Vec<N>,
}

/// Owner of every intersection watcher on the page.
pub struct ObservationManager<H: Host> {
    host: Rc<H>,
    options: ObservationOptions,
    state: StateCell,
    subs: RefCell<Option<Rc<Subscriptions<H>>>>,
    observers: RefCell<FxHashMap<String, Registration<H::Node>>>,
    active: RefCell<Option<Rc<ActiveLinks<H>>>>,
    native: Cell<bool>,
    paused: Cell<bool>,
}

impl<H: Host> ObservationManager<H> {
    /// Manager for `host`; nothing happens until [`init`](Manager::init).
    pub fn new(host: Rc<H>, options: ObservationOptions) -> Self {
        Self {
            host,
            options,
            state: StateCell::default(),
            subs: RefCell::new(None),
            observers: RefCell::new(FxHashMap::default()),
            active: RefCell::new(None),
            native: Cell::new(false),
            paused: Cell::new(false),
        }
    }

    fn subs(&self) -> Result<Rc<Subscriptions<H>>, FolioError> {
        self.subs
            .borrow()
            .as_ref()
            .map(Rc::clone)
            .ok_or(FolioError::NotReady("observers"))
    }

    fn setup(&self, subs: &Rc<Subscriptions<H>>) -> Result<(), FolioError> {
        let native = self.host.supports(Capability::IntersectionObserver);
        self.native.set(native);

        if native {
            let sections = self.host.select_all(reveal::SECTION_SELECTOR);
            self.register(
                SCROLL_ANIMATION,
                sections,
                reveal::section_callback(&self.host),
                &self.options.reveal_watch(),
            )?;

            let mut content = reveal::prepare_cards(&*self.host);
            content.extend(self.host.select(reveal::ABOUT_SELECTOR));
            self.register(
                CONTENT,
                content,
                reveal::content_callback(subs),
                &self.options.content_watch(),
            )?;

            let swap = LazySwap {
                fade: Duration::from_millis(self.options.lazy_fade_ms),
                placeholder: self.options.placeholder.clone(),
            };
            let images = self.host.select_all(lazy_image::LAZY_SELECTOR);
            self.register(
                LAZY_LOAD,
                images,
                lazy_image::watch_callback(subs, swap),
                &self.options.lazy_watch(),
            )?;
        } else {
            log::info!("IntersectionObserver unavailable; revealing content now");
            reveal::reveal_all_now(&*self.host);
            lazy_image::load_all_now(&*self.host);
        }

        *self.active.borrow_mut() = ActiveLinks::install(subs, &self.options);
        Ok(())
    }

    fn register(
        &self,
        name: &str,
        targets: Vec<H::Node>,
        callback: WatchCallback<H::Node>,
        options: &WatchOptions,
    ) -> Result<(), FolioError> {
        if self.observers.borrow().contains_key(name) {
            log::warn!("Observer '{name}' already exists");
            return Err(FolioError::DuplicateObserver(name.to_owned()));
        }
        let watcher = self.host.watch(options, callback)?;
        for target in &targets {
            self.host.observe(watcher, target);
        }
        self.subs()?.adopt_watcher(watcher);
        let _ = self.observers.borrow_mut().insert(
            name.to_owned(),
            Registration {
                watcher: Some(watcher),
                targets,
            },
        );
        Ok(())
    }

    /// Watch `elements` under a new unique `name`. Options default to
    /// threshold 0.1 and a `0px` root margin.
    pub fn add_observer(
        &self,
        name: &str,
        elements: Vec<H::Node>,
        callback: WatchCallback<H::Node>,
        options: Option<WatchOptions>,
    ) -> Result<(), FolioError> {
        self.register(name, elements, callback, &options.unwrap_or_default())
    }

    /// Disconnect and forget a watcher. Unknown names are ignored.
    pub fn remove_observer(&self, name: &str) {
        let removed = self.observers.borrow_mut().remove(name);
        if let Some(watcher) = removed.and_then(|r| r.watcher) {
            match self.subs.borrow().as_ref() {
                Some(subs) => subs.drop_watcher(watcher),
                None => self.host.disconnect(watcher),
            }
        }
    }

    /// Disconnect every watcher but keep their names registered.
    pub fn pause_observers(&self) {
        for registration in self.observers.borrow_mut().values_mut() {
            if let Some(watcher) = registration.watcher.take() {
                match self.subs.borrow().as_ref() {
                    Some(subs) => subs.drop_watcher(watcher),
                    None => self.host.disconnect(watcher),
                }
            }
        }
        self.paused.set(true);
    }

    /// Registered watcher names, sorted.
    pub fn observer_names(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.observers.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of elements a registration was created with.
    pub fn target_count(&self, name: &str) -> Option<usize> {
        self.observers.borrow().get(name).map(|r| r.targets.len())
    }

    /// Handle of a live watcher.
    pub fn watcher(&self, name: &str) -> Option<WatcherId> {
        self.observers.borrow().get(name).and_then(|r| r.watcher)
    }

    /// Section currently marked active in the navigation.
    pub fn active_section(&self) -> Option<String> {
        self.active.borrow().as_ref().and_then(|a| a.current())
    }
}

impl<H: Host> Manager for ObservationManager<H> {
    fn name(&self) -> &'static str {
        "observers"
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
        self.paused.set(false);
        match self.setup(&subs) {
            Ok(()) => {
                self.state.ready();
                log::info!("ObservationManager initialized");
                Ok(())
            }
            Err(e) => {
                self.destroy();
                self.state.failed();
                Err(e)
            }
        }
    }

    fn destroy(&self) {
        if let Some(active) = self.active.borrow_mut().take() {
            active.cancel();
        }
        if let Some(subs) = self.subs.borrow_mut().take() {
            subs.release();
        }
        self.observers.borrow_mut().clear();
        if self.state.destroy() {
            log::info!("ObservationManager destroyed");
        }
    }

    fn handle_resize(&self) {
        if let Some(active) = self.active.borrow().as_ref() {
            active.update();
        }
    }

    fn status(&self) -> serde_json::Value {
        json!({
            "isInitialized": self.state.is_ready(),
            "observerCount": self.observers.borrow().len(),
            "supportedNatively": self.native.get(),
            "observers": self.observer_names(),
            "paused": self.paused.get(),
            "activeSection": self.active_section(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::host::memory::NodeId;
    use crate::host::{Intersection, MemoryHost};

    const PAGE: &str = r##"
        <header><nav><a href="#hero">Home</a><a href="#about">About</a></nav></header>
        <main>
          <section id="hero"></section>
          <section id="about">
            <div class="about-me"><div class="content">
              <div class="sub-content"></div><div class="image"></div>
            </div></div>
            <div class="expertise-grid-cell"></div>
            <div class="project-grid-cell"></div>
            <img data-src="/portrait.jpg">
          </section>
        </main>"##;

    fn manager(host: &Rc<MemoryHost>) -> ObservationManager<MemoryHost> {
        ObservationManager::new(Rc::clone(host), ObservationOptions::default())
    }

    #[test]
    fn registers_builtin_watchers_with_their_options() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        let obs = manager(&host);
        obs.init().unwrap();

        assert_eq!(obs.observer_names(), vec!["content", "lazyLoad", "scrollAnimation"]);
        assert_eq!(obs.target_count(SCROLL_ANIMATION), Some(2));
        assert_eq!(obs.target_count(CONTENT), Some(3));
        let lazy = obs.watcher(LAZY_LOAD).unwrap();
        assert_eq!(
            host.watcher_options(lazy),
            Some(WatchOptions::new(0.1, "50px 0px"))
        );
        let card = host.select(".project-grid-cell").unwrap();
        assert_eq!(host.style(card, "transition-delay").as_deref(), Some("0.1s"));
        assert_eq!(obs.active_section().as_deref(), Some("hero"));
    }

    #[test]
    fn init_is_idempotent() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        let obs = manager(&host);
        obs.init().unwrap();
        let watchers = host.watcher_count();
        let listeners = host.listener_count();
        obs.init().unwrap();
        assert_eq!(host.watcher_count(), watchers);
        assert_eq!(host.listener_count(), listeners);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        let obs = manager(&host);
        obs.init().unwrap();
        let noop: WatchCallback<NodeId> =
            Rc::new(|_: WatcherId, _: &[Intersection<NodeId>]| {});
        let err = obs
            .add_observer(CONTENT, Vec::new(), noop, None)
            .unwrap_err();
        assert!(matches!(err, FolioError::DuplicateObserver(ref n) if n == CONTENT));
    }

    #[test]
    fn custom_observer_uses_default_options_and_can_be_removed() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        let obs = manager(&host);
        obs.init().unwrap();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let hero = host.select("#hero").unwrap();
        obs.add_observer(
            "hero",
            vec![hero],
            Rc::new(move |_: WatcherId, entries: &[Intersection<NodeId>]| {
                counter.set(counter.get() + entries.len());
            }),
            None,
        )
        .unwrap();
        let watcher = obs.watcher("hero").unwrap();
        assert_eq!(host.watcher_options(watcher), Some(WatchOptions::default()));

        host.set_intersecting(hero, true);
        assert_eq!(hits.get(), 1);

        obs.remove_observer("hero");
        host.set_intersecting(hero, true);
        assert_eq!(hits.get(), 1);
        assert!(obs.watcher("hero").is_none());
    }

    #[test]
    fn pause_disconnects_but_keeps_names() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        let obs = manager(&host);
        obs.init().unwrap();
        obs.pause_observers();
        assert_eq!(host.watcher_count(), 0);
        assert_eq!(obs.observer_names().len(), 3);
        assert_eq!(obs.status()["paused"], true);
    }

    #[test]
    fn fallback_reveals_everything_and_still_tracks_links() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        host.set_capability(Capability::IntersectionObserver, false);
        let obs = manager(&host);
        obs.init().unwrap();

        assert_eq!(host.watcher_count(), 0);
        for section in host.select_all("main section") {
            assert!(host.has_class(&section, reveal::REVEAL_CLASS));
        }
        assert!(host.select("img[data-src]").is_none());
        assert_eq!(obs.status()["supportedNatively"], false);
        assert_eq!(obs.active_section().as_deref(), Some("hero"));
    }

    #[test]
    fn destroy_releases_everything_and_restart_is_clean() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        let obs = manager(&host);
        obs.init().unwrap();
        let listeners = host.listener_count();
        obs.destroy();
        assert_eq!(host.watcher_count(), 0);
        assert_eq!(host.listener_count(), 0);
        assert_eq!(obs.state(), ManagerState::Destroyed);

        obs.init().unwrap();
        assert_eq!(host.watcher_count(), 3);
        assert_eq!(host.listener_count(), listeners);
    }
}
