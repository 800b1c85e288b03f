//! Active navigation link tracking.
//!
//! The rule is a pure function over section boxes; [`ActiveLinks`] wires it
//! to a throttled scroll/resize handler that recomputes once per frame.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use web_time::Duration;

use crate::dom::frame::CoalescedFrame;
use crate::dom::timing::throttled;
use crate::dom::Subscriptions;
use crate::host::{EventKind, EventTarget, Host};
use crate::options::ObservationOptions;

/// Sections eligible for tracking.
pub const SECTION_SELECTOR: &str = "main section[id]";
/// Links that point at those sections.
pub const LINK_SELECTOR: &str = "header nav a[href^=\"#\"]";
/// Class marking the current link.
pub const ACTIVE_CLASS: &str = "active";

/// Layout of one tracked section.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionBox {
    /// Element id.
    pub id: String,
    /// `offsetTop`
    pub top: f64,
    /// `offsetHeight`
    pub height: f64,
}

/// Parameters of the active-section rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveRule {
    /// Added to `scrollY` to form the reference position.
    pub offset: f64,
    /// How far above its top a section already counts as current.
    pub lead: f64,
    /// Scroll positions below this fall back to the first section.
    pub top_zone: f64,
}

impl Default for ActiveRule {
    fn default() -> Self {
        Self {
            offset: 100.0,
            lead: 150.0,
            top_zone: 50.0,
        }
    }
}

impl From<&ObservationOptions> for ActiveRule {
    fn from(o: &ObservationOptions) -> Self {
        Self {
            offset: o.active_offset,
            lead: o.active_lead,
            top_zone: o.active_top_zone,
        }
    }
}

impl ActiveRule {
    /// Pick the current section for `scroll_y`.
    ///
    /// With `P = scroll_y + offset`: the last section whose
    /// `[top - lead, top + height)` contains `P`; otherwise the section whose
    /// top is closest to `P`; otherwise (near the top of the page) the first
    /// section.
    #[must_use]
    pub fn pick<'a>(
        &self,
        sections: &'a [SectionBox],
        scroll_y: f64,
    ) -> Option<&'a str> {
        let position = scroll_y + self.offset;
        let mut current = None;
        let mut closest: Option<(&SectionBox, f64)> = None;
        for section in sections {
            if position >= section.top - self.lead
                && position < section.top + section.height
            {
                current = Some(section);
            }
            let distance = (position - section.top).abs();
            match closest {
                Some((_, best)) if best <= distance => {}
                _ => closest = Some((section, distance)),
            }
        }
        current
            .or(closest.map(|(s, _)| s))
            .or_else(|| {
                (scroll_y < self.top_zone).then(|| sections.first()).flatten()
            })
            .map(|s| s.id.as_str())
    }
}

/// Scroll-driven active-link tracker.
pub struct ActiveLinks<H: Host> {
    host: Rc<H>,
    rule: ActiveRule,
    sections: Vec<H::Node>,
    links: Vec<H::Node>,
    current: RefCell<Option<String>>,
    frame: Rc<CoalescedFrame<H>>,
}

impl<H: Host> ActiveLinks<H> {
    /// Install the tracker. Returns `None` (and registers nothing) when the
    /// page has no tracked sections or no in-page links.
    pub fn install(
        subs: &Rc<Subscriptions<H>>,
        options: &ObservationOptions,
    ) -> Option<Rc<Self>> {
        let host = Rc::clone(subs.host());
        let sections = host.select_all(SECTION_SELECTOR);
        let links = host.select_all(LINK_SELECTOR);
        if sections.is_empty() || links.is_empty() {
            log::debug!("No sections or nav links; active-link tracking off");
            return None;
        }
        let tracker = Rc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let frame = CoalescedFrame::new(Rc::clone(&host), move || {
                if let Some(tracker) = weak.upgrade() {
                    tracker.update();
                }
            });
            Self {
                host,
                rule: ActiveRule::from(options),
                sections,
                links,
                current: RefCell::new(None),
                frame,
            }
        });

        let weak = Rc::downgrade(&tracker);
        let handler = throttled(
            subs,
            Duration::from_millis(options.active_throttle_ms),
            move || {
                if let Some(tracker) = weak.upgrade() {
                    tracker.frame.request();
                }
            },
        );
        let _ = subs.listen(
            &EventTarget::Window,
            EventKind::Scroll,
            Rc::clone(&handler),
        );
        let _ = subs.listen(&EventTarget::Window, EventKind::Resize, handler);

        tracker.update();
        Some(tracker)
    }

    /// Drop a pending recomputation.
    pub fn cancel(&self) {
        self.frame.cancel();
    }

    /// Recompute and apply the active link now.
    pub fn update(&self) {
        let boxes: Vec<SectionBox> = self
            .sections
            .iter()
            .filter_map(|s| {
                Some(SectionBox {
                    id: self.host.attribute(s, "id")?,
                    top: self.host.offset_top(s),
                    height: self.host.offset_height(s),
                })
            })
            .collect();
        let Some(active) = self.rule.pick(&boxes, self.host.scroll_y()) else {
            return;
        };
        let href = format!("#{active}");
        for link in &self.links {
            self.host.remove_class(link, ACTIVE_CLASS);
            if self.host.attribute(link, "href").as_deref() == Some(href.as_str())
            {
                self.host.add_class(link, ACTIVE_CLASS);
            }
        }
        *self.current.borrow_mut() = Some(active.to_owned());
    }

    /// Id of the section last marked current.
    pub fn current(&self) -> Option<String> {
        self.current.borrow().clone()
    }
}
