//! Load timing, memory and frame-rate monitoring, the mitigations they
//! trigger, global error handlers and the accessibility extras (focus
//! traps, high contrast, modal Escape handling).

pub mod focus_trap;
pub mod frame_rate;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use serde::Serialize;
use web_time::{Duration, SystemTime, UNIX_EPOCH};

use self::frame_rate::FrameRate;
use crate::animation::disable_motion;
use crate::dom::device::{prefers_high_contrast, prefers_reduced_motion};
use crate::dom::frame::FrameLoop;
use crate::dom::timing::every;
use crate::dom::{remove_all, storage, style_all, Subscriptions};
use crate::error::FolioError;
use crate::host::{
    Capability, EventKind, EventTarget, Host, Intersection, LoadTiming,
    WatchOptions, WatcherId,
};
use crate::lifecycle::{Manager, ManagerState, StateCell};
use crate::observation::{lazy_image, reveal};
use crate::options::PerformanceOptions;

/// Elements whose animation is stripped when frames run slow.
pub const LOW_FPS_SELECTOR: &str = ".animate-pulse, .animate-glow, .animate-float";
/// Elements whose animation is stripped after a script error.
pub const ANIMATED_SELECTOR: &str = "[class*=\"animate-\"]";
/// Elements removed in fallback mode.
pub const COMPLEX_SELECTOR: &str = ".parallax, .node-graph-canvas";
/// Open dialogs closed by Escape.
pub const OPEN_MODAL_SELECTOR: &str = ".modal.open, [role=\"dialog\"][aria-hidden=\"false\"]";
/// Close control inside a dialog.
pub const CLOSE_SELECTOR: &str = "[data-close], .close-button";
/// Storage key remembering a low-FPS degradation.
pub const DEGRADED_KEY: &str = "degraded";

const FOCUS_STYLE: &str = "*:focus { outline: 2px solid var(--primary) !important; \
     outline-offset: 2px !important; }\n\
     *:focus:not(:focus-visible) { outline: none !important; }";

const CUSTOM_PROPERTY_FALLBACK: &str = "body { background: #000000; color: #ffffff; }\n\
     .btn-primary { background: #fff3a0; color: #000000; }\n\
     .card { background: rgba(255, 255, 255, 0.05); }";

/// A page-wide adjustment applied in response to a measurement or
/// preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Mitigation {
    /// Slow page load: shorter base transition.
    ShortTransitions,
    /// Slow load event: images load on intersection.
    LazyImages,
    /// Frame rate below the threshold: decorative animations stripped.
    LowFrameRate,
    /// Script error: complex effects removed.
    Fallback,
    /// Reduced-motion preference honored.
    ReducedMotion,
    /// High-contrast palette applied.
    HighContrast,
    /// Static stylesheet standing in for custom properties.
    StyleFallback,
}

/// Snapshot returned by [`PerformanceManager::report`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    /// Navigation timing, once analyzed.
    #[serde(flatten)]
    pub timing: Option<LoadTiming>,
    /// Rate of the last measured one-second window.
    pub fps: Option<u32>,
    /// Mitigations applied so far, in order.
    pub mitigations: Vec<Mitigation>,
    /// Whether monitoring and mitigations are active.
    pub is_optimized: bool,
    /// Whether the accessibility extras are installed.
    pub accessibility_enabled: bool,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Wall-clock milliseconds since the Unix epoch.
pub(crate) fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Monitors the page and degrades gracefully when it struggles.
pub struct PerformanceManager<H: Host> {
    me: Weak<Self>,
    host: Rc<H>,
    options: PerformanceOptions,
    state: StateCell,
    subs: RefCell<Option<Rc<Subscriptions<H>>>>,
    frames: RefCell<Option<Rc<FrameLoop<H>>>>,
    rate: RefCell<Option<FrameRate>>,
    timing: Cell<Option<LoadTiming>>,
    fps: Cell<Option<u32>>,
    mitigations: RefCell<Vec<Mitigation>>,
    traps: Cell<usize>,
    memory_warnings: Cell<u32>,
}

impl<H: Host> PerformanceManager<H> {
    /// Manager for `host`; nothing happens until [`init`](Manager::init).
    pub fn new(host: Rc<H>, options: PerformanceOptions) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            me: me.clone(),
            host,
            options,
            state: StateCell::default(),
            subs: RefCell::new(None),
            frames: RefCell::new(None),
            rate: RefCell::new(None),
            timing: Cell::new(None),
            fps: Cell::new(None),
            mitigations: RefCell::new(Vec::new()),
            traps: Cell::new(0),
            memory_warnings: Cell::new(0),
        })
    }

    /// Record `mitigation`. Returns `false` when it was already applied.
    fn mark(&self, mitigation: Mitigation) -> bool {
        let mut applied = self.mitigations.borrow_mut();
        if applied.contains(&mitigation) {
            return false;
        }
        applied.push(mitigation);
        true
    }

    fn setup(&self, subs: &Rc<Subscriptions<H>>) -> Result<(), FolioError> {
        self.watch_load(subs);
        if self.host.supports(Capability::MemoryInfo) {
            let me = self.me.clone();
            every(
                subs,
                Duration::from_millis(self.options.memory_interval_ms),
                move || {
                    if let Some(this) = me.upgrade() {
                        this.check_memory();
                    }
                },
            );
        }
        self.setup_accessibility(subs)?;
        self.setup_browser_fallbacks(subs)?;
        self.setup_error_handlers(subs);
        self.start_frame_rate_monitor();
        Ok(())
    }

    fn watch_load(&self, subs: &Rc<Subscriptions<H>>) {
        let delay = Duration::from_millis(self.options.analyze_delay_ms);
        let me = self.me.clone();
        let analyze = move || {
            if let Some(this) = me.upgrade() {
                this.analyze_load();
            }
        };
        if self.host.load_timing().is_some() {
            let _ = subs.timeout(delay, analyze);
            return;
        }
        let weak = Rc::downgrade(subs);
        let analyze = Rc::new(analyze);
        let _ = subs.listen(
            &EventTarget::Window,
            EventKind::Load,
            Rc::new(move |_| {
                let Some(subs) = weak.upgrade() else { return };
                let analyze = Rc::clone(&analyze);
                let _ = subs.timeout(delay, move || analyze());
            }),
        );
    }

    /// Read navigation timing and apply the load-based mitigations.
    pub fn analyze_load(&self) {
        if self.timing.get().is_some() {
            return;
        }
        let Some(timing) = self.host.load_timing() else {
            log::debug!("Navigation timing unavailable");
            return;
        };
        self.timing.set(Some(timing));
        log::info!(
            "Page loaded in {:.0}ms (load event {:.0}ms)",
            timing.total_load_time,
            timing.load_time
        );
        if timing.total_load_time > self.options.slow_load_ms
            && self.mark(Mitigation::ShortTransitions)
        {
            self.host.set_root_property("--transition-base", "0.1s");
            log::info!("Reduced animation duration for better performance");
        }
        if timing.load_time > self.options.lazy_load_ms {
            self.enable_lazy_images();
        }
    }

    fn enable_lazy_images(&self) {
        let Ok(subs) = self.subs() else { return };
        if !self.host.supports(Capability::IntersectionObserver)
            || !self.mark(Mitigation::LazyImages)
        {
            return;
        }
        let host = Rc::downgrade(&self.host);
        let callback = Rc::new(
            move |watcher: WatcherId, entries: &[Intersection<H::Node>]| {
                let Some(host) = host.upgrade() else { return };
                for entry in entries.iter().filter(|e| e.is_intersecting) {
                    lazy_image::swap_now(&*host, &entry.target);
                    host.unobserve(watcher, &entry.target);
                }
            },
        );
        let watcher = match self.host.watch(&WatchOptions::new(0.0, "0px"), callback) {
            Ok(watcher) => watcher,
            Err(e) => {
                log::warn!("Lazy image loading unavailable: {e}");
                return;
            }
        };
        for img in self.host.select_all(lazy_image::LAZY_SELECTOR) {
            self.host.add_class(&img, lazy_image::LAZY_CLASS);
            self.host.observe(watcher, &img);
        }
        subs.adopt_watcher(watcher);
    }

    /// Sample heap usage and warn above the configured share of the limit.
    pub fn check_memory(&self) {
        let Some(usage) = self.host.memory_usage() else { return };
        let percent = usage.usage_percent();
        if percent > self.options.memory_warn_percent {
            log::warn!("High memory usage detected: {percent:.1}%");
            self.memory_warnings.set(self.memory_warnings.get() + 1);
            let tracked = self.subs().map(|s| s.listener_count()).unwrap_or(0);
            log::info!("Event listeners cleaned up ({tracked} tracked)");
        }
    }

    fn start_frame_rate_monitor(&self) {
        if prefers_reduced_motion(&*self.host) {
            return;
        }
        if self.options.remember_degraded
            && storage::load::<_, bool>(&*self.host, DEGRADED_KEY) == Some(true)
        {
            log::info!("Low frame rate remembered from an earlier visit");
            self.optimize_for_low_fps();
            return;
        }
        *self.rate.borrow_mut() = Some(FrameRate::new(self.host.now(), Duration::from_secs(1)));
        let frames = FrameLoop::new(Rc::clone(&self.host));
        let me = self.me.clone();
        frames.start(move |timestamp| {
            if let Some(this) = me.upgrade() {
                this.sample_frame(timestamp);
            }
        });
        *self.frames.borrow_mut() = Some(frames);
    }

    fn sample_frame(&self, timestamp: f64) {
        let fps = self
            .rate
            .borrow_mut()
            .as_mut()
            .and_then(|rate| rate.record(timestamp));
        if let Some(fps) = fps {
            self.record_fps(fps);
        }
    }

    /// Stop sampling frames while the page is hidden.
    pub fn pause_monitoring(&self) {
        if let Some(frames) = self.frames.borrow().as_ref() {
            frames.pause();
        }
    }

    /// Start sampling again with a fresh measurement window.
    pub fn resume_monitoring(&self) {
        if let Some(rate) = self.rate.borrow_mut().as_mut() {
            rate.restart(self.host.now());
        }
        if let Some(frames) = self.frames.borrow().as_ref() {
            frames.resume();
        }
    }

    fn record_fps(&self, fps: u32) {
        self.fps.set(Some(fps));
        if fps < self.options.low_fps {
            log::debug!("Frame rate dropped to {fps}");
            self.optimize_for_low_fps();
        }
    }

    /// Strip decorative animations and shorten transitions. Applied once.
    pub fn optimize_for_low_fps(&self) {
        if !self.mark(Mitigation::LowFrameRate) {
            return;
        }
        style_all(&*self.host, LOW_FPS_SELECTOR, "animation", "none");
        self.host.set_root_property("--transition-fast", "0.05s");
        self.host.set_root_property("--transition-base", "0.1s");
        if self.options.remember_degraded {
            let _ = storage::store(&*self.host, DEGRADED_KEY, &true);
        }
        log::info!("Optimized animations for low FPS");
    }

    /// Drop a remembered low-FPS degradation.
    pub fn forget_degradation(&self) -> bool {
        storage::forget(&*self.host, DEGRADED_KEY)
    }

    fn setup_accessibility(&self, subs: &Rc<Subscriptions<H>>) -> Result<(), FolioError> {
        if prefers_reduced_motion(&*self.host) && self.mark(Mitigation::ReducedMotion) {
            disable_motion(&*self.host);
        }
        if prefers_high_contrast(&*self.host) && self.mark(Mitigation::HighContrast) {
            self.host
                .set_root_property("--bg-card", "rgba(255, 255, 255, 0.15)");
            self.host.set_root_property("--text-color-secondary", "#ffffff");
            self.host.set_root_property("--primary", "#ffff00");
            log::info!("High contrast mode enabled");
        }

        self.traps.set(focus_trap::install_all(subs));
        self.inject_style(subs, FOCUS_STYLE)?;

        let me = self.me.clone();
        let _ = subs.listen(
            &EventTarget::Document,
            EventKind::KeyDown,
            Rc::new(move |event| {
                if !event.is_key("Escape") {
                    return;
                }
                if let Some(this) = me.upgrade() {
                    let _ = this.close_modals();
                }
            }),
        );
        Ok(())
    }

    fn inject_style(&self, subs: &Subscriptions<H>, css: &str) -> Result<(), FolioError> {
        let Some(parent) = self.host.select("head").or_else(|| self.host.body()) else {
            log::debug!("No document head to attach styles to");
            return Ok(());
        };
        let style = subs.inject(&parent, "style", None)?;
        self.host.set_text(&style, css);
        Ok(())
    }

    /// Click the close control of every open dialog. Returns how many were
    /// closed.
    pub fn close_modals(&self) -> usize {
        let mut closed = 0;
        for modal in self.host.select_all(OPEN_MODAL_SELECTOR) {
            if let Some(button) = self.host.select_within(&modal, CLOSE_SELECTOR).first() {
                self.host.activate(button);
                closed += 1;
            }
        }
        closed
    }

    fn setup_browser_fallbacks(&self, subs: &Rc<Subscriptions<H>>) -> Result<(), FolioError> {
        if !self.host.supports(Capability::IntersectionObserver) {
            reveal::reveal_all_now(&*self.host);
            log::info!("Intersection Observer fallback activated");
        }
        if !self.host.supports(Capability::CustomProperties)
            && self.mark(Mitigation::StyleFallback)
        {
            self.inject_style(subs, CUSTOM_PROPERTY_FALLBACK)?;
            log::info!("CSS Custom Properties fallback activated");
        }
        Ok(())
    }

    fn setup_error_handlers(&self, subs: &Rc<Subscriptions<H>>) {
        let me = self.me.clone();
        let _ = subs.listen(
            &EventTarget::Window,
            EventKind::Error,
            Rc::new(move |event| {
                log::warn!(
                    "Script error caught: {}",
                    event.message.as_deref().unwrap_or("unknown error")
                );
                if let Some(this) = me.upgrade() {
                    this.enable_fallback();
                }
            }),
        );
        let _ = subs.listen(
            &EventTarget::Window,
            EventKind::UnhandledRejection,
            Rc::new(|event| {
                event.prevent_default();
                log::warn!(
                    "Unhandled promise rejection: {}",
                    event.message.as_deref().unwrap_or("no reason")
                );
            }),
        );
    }

    /// Strip animations and remove the expensive effects after a runtime
    /// fault.
    pub fn enable_fallback(&self) {
        style_all(&*self.host, ANIMATED_SELECTOR, "animation", "none");
        if !self.mark(Mitigation::Fallback) {
            return;
        }
        self.host.set_root_property("--transition-base", "0s");
        let removed = remove_all(&*self.host, COMPLEX_SELECTOR);
        log::info!("Fallback mode enabled ({removed} elements removed)");
    }

    /// Collected timing data and applied mitigations.
    pub fn report(&self) -> PerformanceReport {
        let ready = self.state.is_ready();
        PerformanceReport {
            timing: self.timing.get(),
            fps: self.fps.get(),
            mitigations: self.mitigations.borrow().clone(),
            is_optimized: ready,
            accessibility_enabled: ready,
            timestamp: timestamp_ms(),
        }
    }

    /// Mitigations applied so far.
    pub fn mitigations(&self) -> Vec<Mitigation> {
        self.mitigations.borrow().clone()
    }

    /// Dialogs with a focus trap.
    pub fn focus_traps(&self) -> usize {
        self.traps.get()
    }

    /// Memory checks that crossed the warning threshold.
    pub fn memory_warnings(&self) -> u32 {
        self.memory_warnings.get()
    }

    fn subs(&self) -> Result<Rc<Subscriptions<H>>, FolioError> {
        self.subs
            .borrow()
            .as_ref()
            .map(Rc::clone)
            .ok_or(FolioError::NotReady("performance"))
    }
}

impl<H: Host> Manager for PerformanceManager<H> {
    fn name(&self) -> &'static str {
        "performance"
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
        match self.setup(&subs) {
            Ok(()) => {
                self.state.ready();
                log::info!("PerformanceManager initialized");
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
        if let Some(frames) = self.frames.borrow_mut().take() {
            frames.stop();
        }
        let _ = self.rate.borrow_mut().take();
        if let Some(subs) = self.subs.borrow_mut().take() {
            subs.release();
        }
        self.timing.set(None);
        self.fps.set(None);
        self.mitigations.borrow_mut().clear();
        self.traps.set(0);
        if self.state.destroy() {
            log::info!("PerformanceManager destroyed");
        }
    }

    fn status(&self) -> serde_json::Value {
        let mut status = serde_json::to_value(self.report())
            .unwrap_or_else(|_| serde_json::json!({}));
        if let Some(map) = status.as_object_mut() {
            let _ = map.insert(
                "isInitialized".into(),
                self.state.is_ready().into(),
            );
            let _ = map.insert(
                "monitoringFrameRate".into(),
                self.frames
                    .borrow()
                    .as_ref()
                    .is_some_and(|f| f.is_running())
                    .into(),
            );
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::device::{HIGH_CONTRAST_QUERY, REDUCED_MOTION_QUERY};
    use crate::host::{DomEvent, MemoryHost, MemoryUsage};

    const PAGE: &str = r##"
        <div class="floating-shape"></div>
        <main>
          <section id="hero" class="parallax animate-pulse"></section>
          <section id="about"><img data-src="/a.jpg"><img data-src="/b.jpg"></section>
        </main>
        <canvas class="node-graph-canvas"></canvas>
        <div class="modal open" role="dialog" aria-hidden="false">
          <button class="close-button">x</button>
          <a href="#about">About</a>
        </div>"##;

    fn manager(host: &Rc<MemoryHost>) -> Rc<PerformanceManager<MemoryHost>> {
        PerformanceManager::new(Rc::clone(host), PerformanceOptions::default())
    }

    fn timing(load_time: f64, total: f64) -> LoadTiming {
        LoadTiming {
            load_time,
            total_load_time: total,
            ..LoadTiming::default()
        }
    }

    #[test]
    fn slow_load_shortens_transitions_and_lazies_images() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        let perf = manager(&host);
        perf.init().unwrap();

        host.set_load_timing(timing(1500.0, 2500.0));
        host.finish_loading();
        assert!(perf.report().timing.is_none());
        host.advance(Duration::from_millis(100));

        assert_eq!(host.root_property("--transition-base").as_deref(), Some("0.1s"));
        assert_eq!(
            perf.mitigations(),
            vec![Mitigation::ShortTransitions, Mitigation::LazyImages]
        );
        let img = host.select("img").unwrap();
        assert!(host.has_class(&img, lazy_image::LAZY_CLASS));
        host.set_intersecting(img, true);
        assert_eq!(host.attribute(&img, "src").as_deref(), Some("/a.jpg"));
        assert!(!host.has_class(&img, lazy_image::LAZY_CLASS));
    }

    #[test]
    fn fast_load_changes_nothing() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        host.set_load_timing(timing(20.0, 600.0));
        let perf = manager(&host);
        perf.init().unwrap();
        host.advance(Duration::from_millis(100));

        let report = perf.report();
        assert_eq!(report.timing, Some(timing(20.0, 600.0)));
        assert!(report.mitigations.is_empty());
        assert!(host.root_property("--transition-base").is_none());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["totalLoadTime"], 600.0);
        assert_eq!(json["isOptimized"], true);
    }

    #[test]
    fn low_frame_rate_strips_animation_once_and_is_remembered() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        let perf = manager(&host);
        perf.init().unwrap();

        for _ in 0..25 {
            host.advance(Duration::from_millis(34));
            let _ = host.run_frame();
        }
        assert_eq!(perf.report().fps, Some(20));
        assert_eq!(perf.mitigations(), vec![Mitigation::LowFrameRate]);
        let hero = host.select("#hero").unwrap();
        assert_eq!(host.style(hero, "animation").as_deref(), Some("none"));
        assert_eq!(host.root_property("--transition-fast").as_deref(), Some("0.05s"));
        assert_eq!(host.stored("folio:degraded").as_deref(), Some("true"));

        perf.destroy();
        assert_eq!(host.pending_frames(), 0);
        perf.init().unwrap();
        assert_eq!(perf.mitigations(), vec![Mitigation::LowFrameRate]);
        assert_eq!(host.pending_frames(), 0);
        assert!(perf.forget_degradation());
    }

    #[test]
    fn smooth_frames_keep_animations() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        let perf = manager(&host);
        perf.init().unwrap();
        host.run_frames(70);
        assert!(perf.report().fps.is_some_and(|fps| fps >= 60));
        assert!(perf.mitigations().is_empty());
    }

    #[test]
    fn frames_missing_while_hidden_do_not_degrade() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        let perf = manager(&host);
        perf.init().unwrap();
        host.run_frames(120);
        assert_eq!(perf.report().fps, Some(63));

        host.advance(Duration::from_secs(5));
        host.run_frames(2);
        assert_eq!(perf.report().fps, Some(63));
        assert!(perf.mitigations().is_empty());
        assert_eq!(host.stored("folio:degraded"), None);

        perf.pause_monitoring();
        assert_eq!(host.pending_frames(), 0);
        host.advance(Duration::from_secs(5));
        perf.resume_monitoring();
        host.run_frames(70);
        assert_eq!(perf.report().fps, Some(63));
        assert!(perf.mitigations().is_empty());
    }

    #[test]
    fn memory_pressure_warns_on_each_check() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        host.set_memory_usage(MemoryUsage {
            used: 90.0,
            total: 95.0,
            limit: 100.0,
        });
        let perf = manager(&host);
        perf.init().unwrap();
        host.advance(Duration::from_secs(25));
        assert_eq!(perf.memory_warnings(), 2);
    }

    #[test]
    fn accessibility_preferences_and_escape() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        host.set_media(REDUCED_MOTION_QUERY, true);
        host.set_media(HIGH_CONTRAST_QUERY, true);
        let perf = manager(&host);
        perf.init().unwrap();

        assert!(host.select(".floating-shape").is_none());
        assert_eq!(host.root_property("--primary").as_deref(), Some("#ffff00"));
        assert_eq!(host.pending_frames(), 0);
        assert_eq!(perf.focus_traps(), 1);
        assert!(host.select("style").is_some());

        let closes = Rc::new(Cell::new(0));
        let counter = Rc::clone(&closes);
        let button = host.select(".close-button").unwrap();
        let _ = host.listen(
            &EventTarget::Node(button),
            EventKind::Click,
            Rc::new(move |_: &DomEvent<crate::host::memory::NodeId>| {
                counter.set(counter.get() + 1);
            }),
        );
        let _ = host.press_key("Escape", false, false);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn script_errors_enable_fallback() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        let perf = manager(&host);
        perf.init().unwrap();

        let _ = host.dispatch(
            &EventTarget::Window,
            DomEvent::new(EventKind::Error).with_message("boom"),
        );
        assert!(host.select(".parallax").is_none());
        assert!(host.select(".node-graph-canvas").is_none());
        assert_eq!(host.root_property("--transition-base").as_deref(), Some("0s"));
        assert!(perf.mitigations().contains(&Mitigation::Fallback));

        let rejection = host.dispatch(
            &EventTarget::Window,
            DomEvent::new(EventKind::UnhandledRejection).with_message("nope"),
        );
        assert!(rejection.default_prevented());
    }

    #[test]
    fn missing_capabilities_use_fallbacks() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        host.set_capability(Capability::IntersectionObserver, false);
        host.set_capability(Capability::CustomProperties, false);
        let perf = manager(&host);
        perf.init().unwrap();

        let about = host.select("#about").unwrap();
        assert!(host.has_class(&about, reveal::REVEAL_CLASS));
        assert!(perf.mitigations().contains(&Mitigation::StyleFallback));
        assert_eq!(host.select_all("style").len(), 2);
    }

    #[test]
    fn destroy_releases_everything() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        host.set_memory_usage(MemoryUsage {
            used: 1.0,
            total: 2.0,
            limit: 100.0,
        });
        let perf = manager(&host);
        perf.init().unwrap();
        perf.init().unwrap();
        assert!(host.listener_count() > 0);

        perf.destroy();
        assert_eq!(host.listener_count(), 0);
        assert_eq!(host.pending_timers(), 0);
        assert_eq!(host.pending_frames(), 0);
        assert!(host.select("style").is_none());
        assert_eq!(perf.state(), ManagerState::Destroyed);
        assert_eq!(perf.status()["isInitialized"], false);
    }
}
