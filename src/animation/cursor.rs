//! Two-circle cursor follower with magnetic hover.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;

use crate::dom::frame::FrameLoop;
use crate::dom::{set_styles, Subscriptions};
use crate::host::{EventKind, EventTarget, Host};
use crate::options::CursorOptions;

/// Marker that tracks the pointer exactly.
pub const INNER_SELECTOR: &str = ".circle-in";
/// Marker that eases toward the pointer.
pub const OUTER_SELECTOR: &str = ".circle-out";
/// Elements that attract the outer marker.
pub const MAGNETIC_SELECTOR: &str = "a, button";
/// Class on the outer marker while a magnetic element is hovered.
pub const HOVER_CLASS: &str = "cursor-hover";

const INNER_OFFSET: f32 = 4.0;
const OUTER_OFFSET: f32 = 13.0;

/// Pointer-following state, independent of any document.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorFollower {
    pointer: Vec2,
    outer: Vec2,
    smoothing: f32,
    strength: f32,
    magnet: Option<Vec2>,
}

impl CursorFollower {
    /// Follower at the origin. `smoothing` below 1 is treated as 1.
    #[must_use]
    pub fn new(smoothing: f32, strength: f32) -> Self {
        Self {
            pointer: Vec2::ZERO,
            outer: Vec2::ZERO,
            smoothing: smoothing.max(1.0),
            strength: strength.clamp(0.0, 1.0),
            magnet: None,
        }
    }

    /// Record the raw pointer position.
    pub fn point(&mut self, pointer: Vec2) {
        self.pointer = pointer;
    }

    /// Start or stop pulling toward a hovered element's center.
    pub fn set_magnet(&mut self, center: Option<Vec2>) {
        self.magnet = center;
    }

    /// Top-left of the inner marker.
    #[must_use]
    pub fn inner(&self) -> Vec2 {
        self.pointer - Vec2::splat(INNER_OFFSET)
    }

    /// Top-left of the outer marker.
    #[must_use]
    pub fn outer(&self) -> Vec2 {
        self.outer
    }

    /// Where the outer marker is heading.
    #[must_use]
    pub fn target(&self) -> Vec2 {
        let aim = match self.magnet {
            Some(center) => self.pointer.lerp(center, self.strength),
            None => self.pointer,
        };
        aim - Vec2::splat(OUTER_OFFSET)
    }

    /// Close `1 / smoothing` of the remaining gap. Returns the new position.
    pub fn step(&mut self) -> Vec2 {
        self.outer += (self.target() - self.outer) / self.smoothing;
        self.outer
    }
}

fn place<H: Host>(host: &H, node: &H::Node, at: Vec2) {
    let top = format!("{}px", at.y);
    let left = format!("{}px", at.x);
    set_styles(host, node, &[("top", top.as_str()), ("left", left.as_str())]);
}

/// Cursor markers wired to pointer events and a frame loop.
pub struct CursorEffect<H: Host> {
    follower: Rc<RefCell<CursorFollower>>,
    frames: Rc<FrameLoop<H>>,
}

impl<H: Host> CursorEffect<H> {
    /// Wire the markers. Returns `None` when either marker is missing.
    pub fn install(subs: &Rc<Subscriptions<H>>, options: &CursorOptions) -> Option<Self> {
        let host = Rc::clone(subs.host());
        let (Some(inner), Some(outer)) =
            (host.select(INNER_SELECTOR), host.select(OUTER_SELECTOR))
        else {
            log::debug!("Cursor markers not found");
            return None;
        };
        let follower = Rc::new(RefCell::new(CursorFollower::new(
            options.smoothing,
            options.magnetic_strength,
        )));
        place(&*host, &outer, Vec2::ZERO);

        let weak_host = Rc::downgrade(&host);
        let moved = Rc::downgrade(&follower);
        let _ = subs.listen(
            &EventTarget::Document,
            EventKind::MouseMove,
            Rc::new(move |event| {
                let (Some(host), Some(follower), Some(pointer)) =
                    (weak_host.upgrade(), moved.upgrade(), event.pointer)
                else {
                    return;
                };
                let mut follower = follower.borrow_mut();
                follower.point(pointer);
                place(&*host, &inner, follower.inner());
            }),
        );

        if options.magnetic {
            for element in host.select_all(MAGNETIC_SELECTOR) {
                Self::magnetize(subs, &follower, element, outer.clone());
            }
        }

        let frames = FrameLoop::new(Rc::clone(&host));
        let weak_host = Rc::downgrade(&host);
        let stepped = Rc::downgrade(&follower);
        frames.start(move |_| {
            let (Some(host), Some(follower)) = (weak_host.upgrade(), stepped.upgrade())
            else {
                return;
            };
            let at = follower.borrow_mut().step();
            place(&*host, &outer, at);
        });

        Some(Self { follower, frames })
    }

    fn magnetize(
        subs: &Subscriptions<H>,
        follower: &Rc<RefCell<CursorFollower>>,
        element: H::Node,
        outer: H::Node,
    ) {
        let host = Rc::downgrade(subs.host());
        let entered = Rc::downgrade(follower);
        let own = element.clone();
        let marker = outer.clone();
        let _ = subs.listen(
            &EventTarget::Node(element.clone()),
            EventKind::MouseEnter,
            Rc::new(move |_| {
                let (Some(host), Some(follower)) = (host.upgrade(), entered.upgrade()) else {
                    return;
                };
                let center = host.client_rect(&own).center()
                    + Vec2::new(0.0, host.scroll_y() as f32);
                follower.borrow_mut().set_magnet(Some(center));
                host.add_class(&marker, HOVER_CLASS);
            }),
        );

        let host = Rc::downgrade(subs.host());
        let left = Rc::downgrade(follower);
        let _ = subs.listen(
            &EventTarget::Node(element),
            EventKind::MouseLeave,
            Rc::new(move |_| {
                let (Some(host), Some(follower)) = (host.upgrade(), left.upgrade()) else {
                    return;
                };
                follower.borrow_mut().set_magnet(None);
                host.remove_class(&outer, HOVER_CLASS);
            }),
        );
    }

    /// Current follower state.
    pub fn follower(&self) -> CursorFollower {
        self.follower.borrow().clone()
    }

    /// Whether the easing loop is scheduled.
    pub fn is_running(&self) -> bool {
        self.frames.is_running()
    }

    /// Stop easing the outer marker.
    pub fn pause(&self) {
        self.frames.pause();
    }

    /// Continue after [`pause`](Self::pause).
    pub fn resume(&self) {
        self.frames.resume();
    }

    /// Stop for good.
    pub fn stop(&self) {
        self.frames.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{DomEvent, MemoryHost};

    #[test]
    fn outer_marker_closes_an_eighth_of_the_gap_per_frame() {
        let mut f = CursorFollower::new(8.0, 0.3);
        f.point(Vec2::new(93.0, 173.0));
        assert_eq!(f.target(), Vec2::new(80.0, 160.0));
        assert_eq!(f.step(), Vec2::new(10.0, 20.0));
        assert_eq!(f.step(), Vec2::new(18.75, 37.5));
        for _ in 0..200 {
            let _ = f.step();
        }
        assert!(f.outer().distance(f.target()) < 1e-3);
    }

    #[test]
    fn magnet_pulls_target_toward_center() {
        let mut f = CursorFollower::new(8.0, 0.5);
        f.point(Vec2::new(100.0, 100.0));
        f.set_magnet(Some(Vec2::new(200.0, 100.0)));
        assert_eq!(f.target(), Vec2::new(137.0, 87.0));
        f.set_magnet(None);
        assert_eq!(f.target(), Vec2::new(87.0, 87.0));
    }

    #[test]
    fn degenerate_smoothing_snaps() {
        let mut f = CursorFollower::new(0.0, 0.0);
        f.point(Vec2::new(20.0, 20.0));
        assert_eq!(f.step(), Vec2::new(7.0, 7.0));
    }

    #[test]
    fn markers_follow_pointer_events() {
        let host = Rc::new(MemoryHost::from_html(
            "<div class=\"circle-in\"></div><div class=\"circle-out\"></div>\
             <button id=\"go\">Go</button>",
        ));
        let subs = Rc::new(Subscriptions::new(Rc::clone(&host)));
        let effect = CursorEffect::install(&subs, &CursorOptions::default()).unwrap();
        let inner = host.select(INNER_SELECTOR).unwrap();
        let outer = host.select(OUTER_SELECTOR).unwrap();

        host.move_pointer(50.0, 30.0);
        assert_eq!(host.style(inner, "left").as_deref(), Some("46px"));
        assert_eq!(host.style(inner, "top").as_deref(), Some("26px"));

        let _ = host.run_frame();
        assert_eq!(effect.follower().outer(), Vec2::new(37.0 / 8.0, 17.0 / 8.0));
        assert!(host.style(outer, "left").is_some());

        let button = host.select("#go").unwrap();
        let _ = host.dispatch(
            &EventTarget::Node(button),
            DomEvent::new(EventKind::MouseEnter).with_target(button),
        );
        assert!(host.has_class(&outer, HOVER_CLASS));
        let _ = host.dispatch(
            &EventTarget::Node(button),
            DomEvent::new(EventKind::MouseLeave).with_target(button),
        );
        assert!(!host.has_class(&outer, HOVER_CLASS));

        effect.stop();
        subs.release();
        assert_eq!(host.pending_frames(), 0);
        assert_eq!(host.listener_count(), 0);
    }
}
