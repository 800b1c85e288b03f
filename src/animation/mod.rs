//! Decorative and entrance effects.
//!
//! Continuous effects (node graph, cursor follower) each run on a
//! [`FrameLoop`](crate::dom::frame::FrameLoop) and are stopped on destroy;
//! scroll-driven parallax is coalesced into one frame per burst. With the
//! reduced-motion preference set, none of them is scheduled.

pub mod cursor;
pub mod node_graph;
pub mod typewriter;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use web_time::Duration;

use self::cursor::CursorEffect;
use self::node_graph::NodeGraphEffect;
use self::typewriter::{Typewriter, TypewriterProgress};
use crate::dom::device::{prefers_reduced_motion, DeviceClass};
use crate::dom::frame::CoalescedFrame;
use crate::dom::{remove_all, set_styles, style_all, Subscriptions};
use crate::error::FolioError;
use crate::host::{Capability, EventKind, EventTarget, Host};
use crate::lifecycle::{Manager, ManagerState, StateCell};
use crate::options::AnimationOptions;

/// Elements removed outright under reduced motion.
pub const FLOATING_SELECTOR: &str = ".floating-shape, .animate-float";
/// Injected loading overlay.
pub const OVERLAY_CLASS: &str = "loading-overlay";
/// Hero moved by the parallax effect.
pub const HERO_SELECTOR: &str = ".hero";
/// Sections that fade in on load.
pub const SECTION_SELECTOR: &str = "main section";

const OVERLAY_HTML: &str = "<div class=\"loading-content\">\
    <div class=\"loading-spinner\"></div>\
    <div class=\"loading-text\">Loading...</div></div>";

/// Transition-speed custom properties.
pub const TRANSITION_VARS: [&str; 3] =
    ["--transition-fast", "--transition-base", "--transition-slow"];

/// Set every transition-speed variable to a near-zero duration and remove
/// floating decorations.
pub fn disable_motion<H: Host>(host: &H) {
    for var in TRANSITION_VARS {
        host.set_root_property(var, "0.01ms");
    }
    let removed = remove_all(host, FLOATING_SELECTOR);
    log::info!("Animations disabled for reduced motion ({removed} elements removed)");
}

/// Hero offset for a scroll position, rounded to hundredths of a pixel.
#[must_use]
pub fn parallax_offset(scroll_y: f64, factor: f64) -> f64 {
    (scroll_y * factor * 100.0).round() / 100.0 + 0.0
}

/// Owner of every animation on the page.
pub struct AnimationManager<H: Host> {
    host: Rc<H>,
    options: AnimationOptions,
    state: StateCell,
    subs: RefCell<Option<Rc<Subscriptions<H>>>>,
    node_graph: RefCell<Option<NodeGraphEffect<H>>>,
    cursor: RefCell<Option<CursorEffect<H>>>,
    parallax: RefCell<Option<Rc<CoalescedFrame<H>>>>,
    typewriter: RefCell<Option<(H::Node, Typewriter, Rc<TypewriterProgress>)>>,
    typed: Cell<bool>,
    reduced_motion: Cell<bool>,
    paused: Cell<bool>,
    seed: Cell<Option<u64>>,
}

impl<H: Host> AnimationManager<H> {
    /// Manager for `host`; nothing happens until [`init`](Manager::init).
    pub fn new(host: Rc<H>, options: AnimationOptions) -> Self {
        Self {
            host,
            options,
            state: StateCell::default(),
            subs: RefCell::new(None),
            node_graph: RefCell::new(None),
            cursor: RefCell::new(None),
            parallax: RefCell::new(None),
            typewriter: RefCell::new(None),
            typed: Cell::new(false),
            reduced_motion: Cell::new(false),
            paused: Cell::new(false),
            seed: Cell::new(None),
        }
    }

    /// Seed the node-graph particles deterministically.
    pub fn set_seed(&self, seed: u64) {
        self.seed.set(Some(seed));
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn setup(&self, subs: &Rc<Subscriptions<H>>) -> Result<(), FolioError> {
        self.setup_overlay(subs)?;
        self.setup_typewriter(subs);
        self.setup_parallax(subs);
        self.setup_node_graph(subs)?;
        self.setup_page_transitions(subs);
        if self.host.supports(Capability::IntersectionObserver) {
            self.prepare_content();
        }
        if self.options.cursor.enabled {
            *self.cursor.borrow_mut() = CursorEffect::install(subs, &self.options.cursor);
        }
        Ok(())
    }

    fn setup_overlay(&self, subs: &Rc<Subscriptions<H>>) -> Result<(), FolioError> {
        let Some(body) = self.host.body() else {
            return Ok(());
        };
        let overlay = subs.inject(&body, "div", Some(OVERLAY_CLASS))?;
        self.host.set_inner_html(&overlay, OVERLAY_HTML);

        let weak = Rc::downgrade(subs);
        let fade = Self::ms(self.options.overlay_fade_ms);
        let _ = subs.timeout(Self::ms(self.options.overlay_ms), move || {
            let Some(subs) = weak.upgrade() else { return };
            let host = subs.host();
            let transition = format!("all {}ms ease-out", fade.as_millis());
            set_styles(
                &**host,
                &overlay,
                &[("opacity", "0"), ("transition", transition.as_str())],
            );
            let inner = Rc::downgrade(&subs);
            let _ = subs.timeout(fade, move || {
                if let Some(subs) = inner.upgrade() {
                    subs.eject(&overlay);
                }
            });
        });
        Ok(())
    }

    fn setup_typewriter(&self, subs: &Rc<Subscriptions<H>>) {
        let options = &self.options.typewriter;
        if !options.enabled || self.typed.get() {
            return;
        }
        let Some(heading) = self.host.select(typewriter::HEADING_SELECTOR) else {
            return;
        };
        let writer = Typewriter::new(options);
        let progress = typewriter::start(
            subs,
            heading.clone(),
            writer.clone(),
            Self::ms(options.start_delay_ms),
            Self::ms(options.char_delay_ms),
        );
        *self.typewriter.borrow_mut() = Some((heading, writer, progress));
    }

    fn setup_parallax(&self, subs: &Rc<Subscriptions<H>>) {
        let Some(hero) = self.host.select(HERO_SELECTOR) else {
            return;
        };
        let host = Rc::downgrade(&self.host);
        let factor = self.options.parallax_factor;
        let frame = CoalescedFrame::new(Rc::clone(&self.host), move || {
            let Some(host) = host.upgrade() else { return };
            let offset = parallax_offset(host.scroll_y(), factor);
            host.set_style(&hero, "transform", &format!("translateY({offset}px)"));
        });
        let requested = Rc::downgrade(&frame);
        let _ = subs.listen(
            &EventTarget::Window,
            EventKind::Scroll,
            Rc::new(move |_| {
                if let Some(frame) = requested.upgrade() {
                    frame.request();
                }
            }),
        );
        *self.parallax.borrow_mut() = Some(frame);
    }

    fn setup_node_graph(&self, subs: &Rc<Subscriptions<H>>) -> Result<(), FolioError> {
        let options = &self.options.node_graph;
        if !options.enabled {
            return Ok(());
        }
        let count = match DeviceClass::detect(&*self.host) {
            DeviceClass::Mobile => options.mobile_particles,
            DeviceClass::Tablet | DeviceClass::Desktop => options.desktop_particles,
        };
        let effect = match self.seed.get() {
            Some(seed) => {
                NodeGraphEffect::install(subs, options, count, &mut StdRng::seed_from_u64(seed))?
            }
            None => NodeGraphEffect::install(subs, options, count, &mut rand::rng())?,
        };
        *self.node_graph.borrow_mut() = effect;
        Ok(())
    }

    fn setup_page_transitions(&self, subs: &Rc<Subscriptions<H>>) {
        let stagger = self.options.section_stagger_ms;
        for (i, section) in self.host.select_all(SECTION_SELECTOR).into_iter().enumerate() {
            self.host.add_class(&section, "page-transition");
            let host = Rc::clone(&self.host);
            let _ = subs.timeout(Self::ms(i as u64 * stagger), move || {
                host.add_class(&section, "loaded");
            });
        }
    }

    fn prepare_content(&self) {
        let staged = [
            (".expertise-grid-cell", "translateY(50px)"),
            (".project-grid-cell", "translateY(50px) scale(0.9)"),
        ];
        for (selector, transform) in staged {
            for card in self.host.select_all(selector) {
                set_styles(
                    &*self.host,
                    &card,
                    &[
                        ("transition-delay", "0.1s"),
                        ("opacity", "0"),
                        ("transform", transform),
                    ],
                );
            }
        }
    }

    /// Freeze CSS animations and continuous effects. Idempotent.
    pub fn pause_animations(&self) {
        if self.paused.replace(true) {
            return;
        }
        style_all(&*self.host, "*", "animation-play-state", "paused");
        if let Some(graph) = self.node_graph.borrow().as_ref() {
            graph.pause();
        }
        if let Some(cursor) = self.cursor.borrow().as_ref() {
            cursor.pause();
        }
    }

    /// Undo [`pause_animations`](Self::pause_animations). The play-state
    /// is always restored; the effects resume only when paused.
    pub fn resume_animations(&self) {
        style_all(&*self.host, "*", "animation-play-state", "running");
        if !self.paused.replace(false) {
            return;
        }
        if let Some(graph) = self.node_graph.borrow().as_ref() {
            graph.resume();
        }
        if let Some(cursor) = self.cursor.borrow().as_ref() {
            cursor.resume();
        }
    }

    /// Whether animations are currently paused.
    pub fn is_paused(&self) -> bool {
        self.paused.get()
    }

    /// Number of continuous effects with a scheduled frame.
    pub fn active_animations(&self) -> usize {
        let graph = self.node_graph.borrow().as_ref().is_some_and(NodeGraphEffect::is_running);
        let cursor = self.cursor.borrow().as_ref().is_some_and(CursorEffect::is_running);
        usize::from(graph) + usize::from(cursor)
    }

    /// Whether the typewriter has finished (or was completed on teardown).
    pub fn typewriter_done(&self) -> bool {
        self.typed.get()
            || self
                .typewriter
                .borrow()
                .as_ref()
                .is_some_and(|(_, _, progress)| progress.is_done())
    }

    fn finish_typewriter(&self) {
        let Some((heading, writer, progress)) = self.typewriter.borrow_mut().take() else {
            return;
        };
        if !progress.is_done() {
            self.host.set_inner_html(&heading, &writer.final_html());
        }
        self.typed.set(true);
    }
}

impl<H: Host> Manager for AnimationManager<H> {
    fn name(&self) -> &'static str {
        "animations"
    }

    fn state(&self) -> ManagerState {
        self.state.get()
    }

    fn init(&self) -> Result<(), FolioError> {
        if !self.state.begin_init() {
            return Ok(());
        }
        let reduced = prefers_reduced_motion(&*self.host);
        self.reduced_motion.set(reduced);
        self.paused.set(false);
        if reduced {
            disable_motion(&*self.host);
            self.state.ready();
            return Ok(());
        }

        let subs = Rc::new(Subscriptions::new(Rc::clone(&self.host)));
        *self.subs.borrow_mut() = Some(Rc::clone(&subs));
        match self.setup(&subs) {
            Ok(()) => {
                self.state.ready();
                log::info!("AnimationManager initialized");
                if self.host.is_hidden() {
                    self.pause_animations();
                }
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
        if let Some(graph) = self.node_graph.borrow_mut().take() {
            graph.stop();
        }
        if let Some(cursor) = self.cursor.borrow_mut().take() {
            cursor.stop();
        }
        if let Some(frame) = self.parallax.borrow_mut().take() {
            frame.cancel();
        }
        self.finish_typewriter();
        if let Some(subs) = self.subs.borrow_mut().take() {
            subs.release();
        }
        let _ = remove_all(&*self.host, &format!("#{}", node_graph::CANVAS_ID));
        if self.state.destroy() {
            log::info!("AnimationManager destroyed");
        }
    }

    fn status(&self) -> serde_json::Value {
        let active = self.active_animations();
        json!({
            "isInitialized": self.state.is_ready(),
            "activeAnimations": active,
            "reducedMotion": self.reduced_motion.get(),
            "hasAnimationFrame": active > 0,
            "paused": self.paused.get(),
            "typewriterDone": self.typewriter_done(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::device::REDUCED_MOTION_QUERY;
    use crate::host::MemoryHost;

    const PAGE: &str = r#"
        <div class="circle-in"></div><div class="circle-out"></div>
        <section class="hero"><h1 class="hero-heading">Hi</h1>
          <div class="floating-shape"></div><div class="animate-float"></div></section>
        <main>
          <section id="about">
            <div class="expertise-grid-cell"></div>
            <div class="project-grid-cell"></div>
          </section>
          <section id="projects"></section>
        </main>"#;

    fn manager(host: &Rc<MemoryHost>) -> AnimationManager<MemoryHost> {
        let anim = AnimationManager::new(Rc::clone(host), AnimationOptions::default());
        anim.set_seed(3);
        anim
    }

    #[test]
    fn init_starts_every_effect() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        let anim = manager(&host);
        anim.init().unwrap();

        assert!(host.select(".loading-overlay .loading-text").is_some());
        assert!(host.select("#node-graph-canvas").is_some());
        assert_eq!(anim.active_animations(), 2);
        assert_eq!(anim.status()["hasAnimationFrame"], true);

        let project = host.select(".project-grid-cell").unwrap();
        assert_eq!(
            host.style(project, "transform").as_deref(),
            Some("translateY(50px) scale(0.9)")
        );
        assert_eq!(host.style(project, "opacity").as_deref(), Some("0"));
        assert_eq!(host.select_all(".floating-shape").len(), 1);
    }

    #[test]
    fn sections_load_in_sequence() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        let anim = manager(&host);
        anim.init().unwrap();
        let sections = host.select_all("main section");
        assert!(sections.iter().all(|s| host.has_class(s, "page-transition")));

        host.advance(Duration::ZERO);
        assert!(host.has_class(&sections[0], "loaded"));
        assert!(!host.has_class(&sections[1], "loaded"));
        host.advance(Duration::from_millis(100));
        assert!(host.has_class(&sections[1], "loaded"));
    }

    #[test]
    fn overlay_fades_then_leaves() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        let anim = manager(&host);
        anim.init().unwrap();
        let overlay = host.select(".loading-overlay").unwrap();

        host.advance(Duration::from_millis(1000));
        assert_eq!(host.style(overlay, "opacity").as_deref(), Some("0"));
        assert!(host.is_connected(&overlay));
        host.advance(Duration::from_millis(500));
        assert!(!host.is_connected(&overlay));
    }

    #[test]
    fn parallax_moves_hero_once_per_frame() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        let anim = manager(&host);
        anim.init().unwrap();
        let hero = host.select(".hero").unwrap();

        host.scroll_window_to(100.0);
        host.scroll_window_to(200.0);
        assert_eq!(host.style(hero, "transform"), None);
        let _ = host.run_frame();
        assert_eq!(host.style(hero, "transform").as_deref(), Some("translateY(-30px)"));
    }

    #[test]
    fn parallax_offset_rounds_and_avoids_negative_zero() {
        assert_eq!(parallax_offset(100.0, -0.15), -15.0);
        assert_eq!(format!("{}", parallax_offset(0.0, -0.15)), "0");
    }

    #[test]
    fn reduced_motion_schedules_nothing() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        host.set_media(REDUCED_MOTION_QUERY, true);
        let anim = manager(&host);
        anim.init().unwrap();

        assert!(host.select(FLOATING_SELECTOR).is_none());
        assert_eq!(host.pending_frames(), 0);
        assert_eq!(host.pending_timers(), 0);
        assert!(host.select(".loading-overlay").is_none());
        assert_eq!(host.root_property("--transition-base").as_deref(), Some("0.01ms"));
        assert_eq!(host.text_content(host.select(".hero-heading").unwrap()), "Hi");
        assert_eq!(anim.status()["reducedMotion"], true);
    }

    #[test]
    fn pause_and_resume_are_idempotent() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        let anim = manager(&host);
        anim.init().unwrap();
        let hero = host.select(".hero").unwrap();

        anim.pause_animations();
        anim.pause_animations();
        assert_eq!(host.style(hero, "animation-play-state").as_deref(), Some("paused"));
        assert_eq!(host.pending_frames(), 0);
        assert_eq!(anim.active_animations(), 0);

        anim.resume_animations();
        anim.resume_animations();
        assert_eq!(host.style(hero, "animation-play-state").as_deref(), Some("running"));
        assert_eq!(host.pending_frames(), 2);
    }

    #[test]
    fn starting_on_a_hidden_page_starts_paused() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        host.set_hidden(true);
        let anim = manager(&host);
        anim.init().unwrap();
        let hero = host.select(".hero").unwrap();
        assert!(anim.is_paused());
        assert_eq!(host.pending_frames(), 0);
        assert_eq!(host.style(hero, "animation-play-state").as_deref(), Some("paused"));

        host.set_hidden(false);
        anim.resume_animations();
        assert_eq!(host.style(hero, "animation-play-state").as_deref(), Some("running"));
        assert_eq!(host.pending_frames(), 2);
    }

    #[test]
    fn resume_restores_play_state_paused_before_init() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        let anim = manager(&host);
        anim.pause_animations();
        anim.init().unwrap();
        assert!(!anim.is_paused());

        anim.resume_animations();
        let hero = host.select(".hero").unwrap();
        assert_eq!(host.style(hero, "animation-play-state").as_deref(), Some("running"));
        assert_eq!(host.pending_frames(), 2);
    }

    #[test]
    fn destroy_then_init_leaves_no_duplicates() {
        let host = Rc::new(MemoryHost::from_html(PAGE));
        let anim = manager(&host);
        anim.init().unwrap();
        let listeners = host.listener_count();

        anim.destroy();
        assert_eq!(host.pending_frames(), 0);
        assert_eq!(host.pending_timers(), 0);
        assert_eq!(host.listener_count(), 0);
        assert!(host.select(".loading-overlay").is_none());
        assert!(host.select("#node-graph-canvas").is_none());
        assert!(anim.typewriter_done());
        let heading = host.select(".hero-heading").unwrap();
        assert!(host.inner_html(heading).contains("<br />"));

        anim.init().unwrap();
        assert_eq!(host.select_all(".loading-overlay").len(), 1);
        assert_eq!(host.select_all("canvas").len(), 1);
        assert_eq!(host.listener_count(), listeners);
        // The typewriter does not run a second time.
        assert!(host.inner_html(heading).contains("<br />"));
    }
}
