//! Animation-frame scheduling wrappers.
//!
//! [`FrameLoop`] drives a continuous per-frame effect and always retains the
//! handle of its next frame so it can be cancelled. [`CoalescedFrame`]
//! collapses bursts of scroll/resize events into a single callback on the
//! next frame.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::host::{FrameId, Host};

type Tick = Box<dyn FnMut(f64)>;

/// A continuous effect: a running flag, the retained next-frame handle and
/// the per-frame step.
pub struct FrameLoop<H: Host> {
    host: Rc<H>,
    running: Cell<bool>,
    frame: Cell<Option<FrameId>>,
    tick: RefCell<Option<Tick>>,
    frames: Cell<u64>,
}

impl<H: Host> FrameLoop<H> {
    /// Idle loop on `host`.
    pub fn new(host: Rc<H>) -> Rc<Self> {
        Rc::new(Self {
            host,
            running: Cell::new(false),
            frame: Cell::new(None),
            tick: RefCell::new(None),
            frames: Cell::new(0),
        })
    }

    /// Start calling `tick` once per frame with the frame timestamp.
    /// Replaces the step of an already running loop.
    pub fn start(self: &Rc<Self>, tick: impl FnMut(f64) + 'static) {
        *self.tick.borrow_mut() = Some(Box::new(tick));
        if !self.running.replace(true) {
            self.schedule();
        }
    }

    /// Resume with the existing step after [`pause`](Self::pause).
    pub fn resume(self: &Rc<Self>) {
        if self.tick.borrow().is_some() && !self.running.replace(true) {
            self.schedule();
        }
    }

    /// Stop without forgetting the step.
    pub fn pause(&self) {
        self.running.set(false);
        if let Some(id) = self.frame.take() {
            self.host.cancel_frame(id);
        }
    }

    /// Stop and drop the step.
    pub fn stop(&self) {
        self.pause();
        let _ = self.tick.borrow_mut().take();
    }

    /// Whether a frame is scheduled or running.
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Frames stepped since creation.
    pub fn frames(&self) -> u64 {
        self.frames.get()
    }

    fn schedule(self: &Rc<Self>) {
        let weak: Weak<Self> = Rc::downgrade(self);
        let id = self.host.request_frame(Box::new(move |timestamp| {
            if let Some(this) = weak.upgrade() {
                this.step(timestamp);
            }
        }));
        self.frame.set(Some(id));
    }

    fn step(self: &Rc<Self>, timestamp: f64) {
        self.frame.set(None);
        if !self.running.get() {
            return;
        }
        self.frames.set(self.frames.get() + 1);
        // Taken out so the step may call back into the loop.
        let mut tick = self.tick.borrow_mut().take();
        if let Some(step) = tick.as_mut() {
            step(timestamp);
        }
        {
            let mut slot = self.tick.borrow_mut();
            if slot.is_none() && self.running.get() {
                *slot = tick;
            }
        }
        if self.running.get() && self.frame.get().is_none() {
            self.schedule();
        }
    }
}

/// Runs an action at most once per frame no matter how often it is
/// requested.
pub struct CoalescedFrame<H: Host> {
    host: Rc<H>,
    pending: Cell<Option<FrameId>>,
    action: Box<dyn Fn()>,
}

impl<H: Host> CoalescedFrame<H> {
    /// Coalescer running `action`.
    pub fn new(host: Rc<H>, action: impl Fn() + 'static) -> Rc<Self> {
        Rc::new(Self {
            host,
            pending: Cell::new(None),
            action: Box::new(action),
        })
    }

    /// Ask for `action` to run on the next frame.
    pub fn request(self: &Rc<Self>) {
        if self.pending.get().is_some() {
            return;
        }
        let weak = Rc::downgrade(self);
        let id = self.host.request_frame(Box::new(move |_| {
            if let Some(this) = weak.upgrade() {
                this.pending.set(None);
                (this.action)();
            }
        }));
        self.pending.set(Some(id));
    }

    /// Drop a pending request.
    pub fn cancel(&self) {
        if let Some(id) = self.pending.take() {
            self.host.cancel_frame(id);
        }
    }
}
