//! Application coordinator.
//!
//! [`App`] owns every manager, starts them in a fixed order once the
//! document is interactive, wires the page-wide handlers (visibility,
//! resize, unload, errors) and announces readiness with a
//! `portfolioReady` event. If startup fails the page is switched to a
//! static fallback in which all content is visible.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use serde_json::{json, Map, Value};
use web_time::Duration;

use crate::animation::AnimationManager;
use crate::dom::timing::debounced;
use crate::dom::{set_styles, Subscriptions};
use crate::error::FolioError;
use crate::host::{EventKind, EventTarget, Host};
use crate::lifecycle::{Manager, ManagerState, StateCell};
use crate::navigation::NavigationManager;
use crate::observation::ObservationManager;
use crate::options::Options;
use crate::performance::{timestamp_ms, PerformanceManager};

/// Custom event dispatched on the document once startup completes.
pub const READY_EVENT: &str = "portfolioReady";
/// Version reported in the ready event.
pub const VERSION: &str = "1.0.0";
/// Body class marking the static fallback.
pub const FALLBACK_CLASS: &str = "fallback-mode";
/// Sections forced visible in the fallback.
pub const FALLBACK_SECTIONS: &str = "main section";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Started as soon as the document is interactive.
    Core,
    /// Started after the animation delay.
    Deferred,
}

struct Module {
    manager: Rc<dyn Manager>,
    stage: Stage,
}

/// Owner and sequencer of every behavior manager on the page.
pub struct App<H: Host> {
    me: Weak<Self>,
    host: Rc<H>,
    options: Options,
    state: StateCell,
    subs: RefCell<Option<Rc<Subscriptions<H>>>>,
    modules: RefCell<Vec<Module>>,
    navigation: Rc<NavigationManager<H>>,
    observers: Rc<ObservationManager<H>>,
    animations: Rc<AnimationManager<H>>,
    performance: Option<Rc<PerformanceManager<H>>>,
    fallback: Cell<bool>,
}

impl<H: Host> App<H> {
    /// Coordinator with the built-in managers registered in startup order:
    /// navigation, observers, animations and (unless disabled)
    /// performance.
    pub fn new(host: Rc<H>, options: Options) -> Rc<Self> {
        let navigation =
            NavigationManager::new(Rc::clone(&host), options.navigation.clone());
        let observers = Rc::new(ObservationManager::new(
            Rc::clone(&host),
            options.observation.clone(),
        ));
        let animations = Rc::new(AnimationManager::new(
            Rc::clone(&host),
            options.animation.clone(),
        ));
        let performance = options.lifecycle.monitor_performance.then(|| {
            PerformanceManager::new(Rc::clone(&host), options.performance.clone())
        });

        let mut modules = vec![
            Module {
                manager: navigation.clone(),
                stage: Stage::Core,
            },
            Module {
                manager: observers.clone(),
                stage: Stage::Core,
            },
            Module {
                manager: animations.clone(),
                stage: Stage::Deferred,
            },
        ];
        if let Some(performance) = &performance {
            modules.push(Module {
                manager: performance.clone(),
                stage: Stage::Core,
            });
        }

        Rc::new_cyclic(|me| Self {
            me: me.clone(),
            host,
            options,
            state: StateCell::default(),
            subs: RefCell::new(None),
            modules: RefCell::new(modules),
            navigation,
            observers,
            animations,
            performance,
            fallback: Cell::new(false),
        })
    }

    /// Coordinator configured from the page's inline options element.
    pub fn from_document(host: Rc<H>) -> Rc<Self> {
        let options = Options::from_document(&*host);
        Self::new(host, options)
    }

    /// Register an additional manager. It is started with the core
    /// managers and torn down after the built-in ones.
    pub fn register(&self, manager: Rc<dyn Manager>) {
        let name = manager.name();
        let mut modules = self.modules.borrow_mut();
        if modules.iter().any(|m| m.manager.name() == name) {
            log::warn!("Module '{name}' is already registered");
            return;
        }
        modules.push(Module {
            manager,
            stage: Stage::Core,
        });
    }

    /// Registered module names in startup order.
    pub fn module_names(&self) -> Vec<&'static str> {
        self.modules.borrow().iter().map(|m| m.manager.name()).collect()
    }

    /// Registered manager by name.
    pub fn module(&self, name: &str) -> Option<Rc<dyn Manager>> {
        self.modules
            .borrow()
            .iter()
            .find(|m| m.manager.name() == name)
            .map(|m| Rc::clone(&m.manager))
    }

    /// The navigation manager.
    pub fn navigation(&self) -> &Rc<NavigationManager<H>> {
        &self.navigation
    }

    /// The observation manager.
    pub fn observers(&self) -> &Rc<ObservationManager<H>> {
        &self.observers
    }

    /// The animation manager.
    pub fn animations(&self) -> &Rc<AnimationManager<H>> {
        &self.animations
    }

    /// The performance manager, unless monitoring is disabled.
    pub fn performance(&self) -> Option<&Rc<PerformanceManager<H>>> {
        self.performance.as_ref()
    }

    /// Coordinator state.
    pub fn state(&self) -> ManagerState {
        self.state.get()
    }

    /// Whether the static fallback is active.
    pub fn is_fallback(&self) -> bool {
        self.fallback.get()
    }

    /// Start the application. Waits for `DOMContentLoaded` while the
    /// document is still loading. A no-op while already running.
    pub fn init(&self) -> Result<(), FolioError> {
        if !self.state.begin_init() {
            return Ok(());
        }
        log::info!("Initializing portfolio application...");
        let subs = Rc::new(Subscriptions::new(Rc::clone(&self.host)));
        if let Some(stale) = self.subs.replace(Some(Rc::clone(&subs))) {
            stale.release();
        }

        if !self.host.is_loading() {
            return self.start(&subs);
        }
        let me = self.me.clone();
        let waiting = Rc::new(Cell::new(None));
        let slot = Rc::clone(&waiting);
        let id = subs.listen(
            &EventTarget::Document,
            EventKind::DomContentLoaded,
            Rc::new(move |_| {
                let Some(app) = me.upgrade() else { return };
                let Some(subs) = app.subs.borrow().as_ref().map(Rc::clone) else {
                    return;
                };
                if let Some(id) = slot.take() {
                    subs.unlisten(id);
                }
                let _ = app.start(&subs);
            }),
        );
        waiting.set(Some(id));
        Ok(())
    }

    fn start(&self, subs: &Rc<Subscriptions<H>>) -> Result<(), FolioError> {
        match self.boot(subs) {
            Ok(()) => {
                self.state.ready();
                log::info!("Portfolio application initialized");
                self.dispatch_ready();
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to initialize portfolio application: {e}");
                if let Some(subs) = self.subs.borrow_mut().take() {
                    subs.release();
                }
                self.enter_fallback_mode();
                self.state.failed();
                Err(e)
            }
        }
    }

    /// Core managers start in order; deferred ones are scheduled only once
    /// all of them are up. A failure rolls back the managers already
    /// started.
    fn boot(&self, subs: &Rc<Subscriptions<H>>) -> Result<(), FolioError> {
        let modules: Vec<(Rc<dyn Manager>, Stage)> = self
            .modules
            .borrow()
            .iter()
            .map(|m| (Rc::clone(&m.manager), m.stage))
            .collect();
        let mut started: Vec<&Rc<dyn Manager>> = Vec::new();
        for (manager, _) in modules.iter().filter(|(_, stage)| *stage == Stage::Core) {
            if let Err(e) = manager.init() {
                log::error!("Failed to initialize module '{}': {e}", manager.name());
                for manager in started {
                    manager.destroy();
                }
                return Err(e);
            }
            log::debug!("Module '{}' initialized", manager.name());
            started.push(manager);
        }
        for (manager, stage) in modules {
            if stage == Stage::Deferred {
                self.defer(subs, manager);
            }
        }
        self.setup_global_handlers(subs);
        Ok(())
    }

    fn defer(&self, subs: &Subscriptions<H>, manager: Rc<dyn Manager>) {
        let me = self.me.clone();
        let delay = Duration::from_millis(self.options.lifecycle.animation_delay_ms);
        let _ = subs.timeout(delay, move || {
            let Some(app) = me.upgrade() else { return };
            match manager.init() {
                Ok(()) => log::debug!("Module '{}' initialized", manager.name()),
                Err(e) => {
                    log::error!("Failed to initialize module '{}': {e}", manager.name());
                    app.enter_fallback_mode();
                }
            }
        });
    }

    fn setup_global_handlers(&self, subs: &Rc<Subscriptions<H>>) {
        let me = self.me.clone();
        let _ = subs.listen(
            &EventTarget::Document,
            EventKind::VisibilityChange,
            Rc::new(move |_| {
                if let Some(app) = me.upgrade() {
                    app.handle_visibility_change();
                }
            }),
        );

        let me = self.me.clone();
        let _ = subs.listen(
            &EventTarget::Window,
            EventKind::Resize,
            debounced(
                subs,
                Duration::from_millis(self.options.lifecycle.resize_debounce_ms),
                move || {
                    if let Some(app) = me.upgrade() {
                        app.handle_resize();
                    }
                },
            ),
        );

        let me = self.me.clone();
        let _ = subs.listen(
            &EventTarget::Window,
            EventKind::BeforeUnload,
            Rc::new(move |_| {
                if let Some(app) = me.upgrade() {
                    app.destroy();
                }
            }),
        );

        let _ = subs.listen(
            &EventTarget::Window,
            EventKind::Error,
            Rc::new(|event| {
                log::error!(
                    "Global error: {}",
                    event.message.as_deref().unwrap_or("unknown error")
                );
            }),
        );

        let _ = subs.listen(
            &EventTarget::Window,
            EventKind::UnhandledRejection,
            Rc::new(|event| {
                log::warn!(
                    "Unhandled promise rejection: {}",
                    event.message.as_deref().unwrap_or("no reason")
                );
                event.prevent_default();
            }),
        );
    }

    fn handle_visibility_change(&self) {
        if self.host.is_hidden() {
            self.animations.pause_animations();
            if let Some(performance) = &self.performance {
                performance.pause_monitoring();
            }
        } else {
            self.animations.resume_animations();
            if let Some(performance) = &self.performance {
                performance.resume_monitoring();
            }
        }
    }

    /// Forward a viewport change to every manager.
    pub fn handle_resize(&self) {
        let modules: Vec<Rc<dyn Manager>> = self
            .modules
            .borrow()
            .iter()
            .map(|m| Rc::clone(&m.manager))
            .collect();
        for manager in modules {
            manager.handle_resize();
        }
    }

    fn dispatch_ready(&self) {
        let detail = json!({
            "timestamp": timestamp_ms(),
            "modules": self.module_names(),
            "version": VERSION,
        });
        self.host.dispatch_custom(READY_EVENT, &detail);
    }

    /// Show every section statically and mark the body.
    pub fn enter_fallback_mode(&self) {
        if let Some(body) = self.host.body() {
            self.host.add_class(&body, FALLBACK_CLASS);
        }
        for section in self.host.select_all(FALLBACK_SECTIONS) {
            self.host.add_class(&section, "visible");
            set_styles(
                &*self.host,
                &section,
                &[("opacity", "1"), ("transform", "none")],
            );
        }
        self.fallback.set(true);
        log::error!("Application running in fallback mode");
    }

    /// Per-module status plus the coordinator's own state.
    pub fn status(&self) -> Value {
        let mut modules = Map::new();
        for module in self.modules.borrow().iter() {
            let manager = &module.manager;
            let _ = modules.insert(
                manager.name().to_owned(),
                json!({
                    "available": true,
                    "initialized": manager.state() == ManagerState::Ready,
                    "state": manager.state(),
                    "status": manager.status(),
                }),
            );
        }
        json!({
            "isInitialized": self.state.is_ready(),
            "state": self.state.get(),
            "fallbackMode": self.fallback.get(),
            "modules": modules,
            "timestamp": timestamp_ms(),
        })
    }

    /// Tear everything down and start again.
    pub fn restart(&self) -> Result<(), FolioError> {
        log::info!("Restarting portfolio application...");
        self.destroy();
        self.init()
    }

    /// Destroy every manager in registration order and drop the global
    /// handlers.
    pub fn destroy(&self) {
        let modules: Vec<Rc<dyn Manager>> = self
            .modules
            .borrow()
            .iter()
            .map(|m| Rc::clone(&m.manager))
            .collect();
        for manager in modules {
            manager.destroy();
        }
        if let Some(subs) = self.subs.borrow_mut().take() {
            subs.release();
        }
        if self.state.destroy() {
            log::info!("Portfolio application destroyed");
        }
    }
}
