//! Throttle and debounce for scroll/resize reactions.
//!
//! The rate-limiting decisions live in the plain [`Throttle`] and
//! [`Debounce`] state machines so they can be tested without a host; the
//! [`throttled`] and [`debounced`] builders wire them to host timers.
//! [`every`] re-arms a one-shot timer for periodic checks.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use web_time::Duration;

use super::Subscriptions;
use crate::host::{Handler, Host, TimerId};

/// What a throttled call should do right now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThrottleDecision {
    /// Enough time passed since the last run: run immediately.
    RunNow,
    /// Too soon: (re)schedule a trailing run after this delay.
    Defer(Duration),
}

/// Leading-edge throttle with a trailing call.
///
/// A call runs immediately when more than `interval` elapsed since the last
/// run; otherwise the pending trailing run is replaced by one scheduled for
/// the remainder of the interval.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval_ms: f64,
    last_run: Option<f64>,
}

impl Throttle {
    /// Throttle allowing one run per `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ms: interval.as_secs_f64() * 1000.0,
            last_run: None,
        }
    }

    /// Decide what a call at `now` (ms) should do.
    #[must_use]
    pub fn decide(&self, now: f64) -> ThrottleDecision {
        match self.last_run {
            Some(last) if now - last <= self.interval_ms => {
                let remaining = (self.interval_ms - (now - last)).max(0.0);
                ThrottleDecision::Defer(Duration::from_secs_f64(
                    remaining / 1000.0,
                ))
            }
            _ => ThrottleDecision::RunNow,
        }
    }

    /// Record a run at `now` (ms).
    pub fn mark_run(&mut self, now: f64) {
        self.last_run = Some(now);
    }
}

/// Trailing-edge debounce: only the last call in a burst runs, `delay`
/// after it.
#[derive(Debug, Clone, Default)]
pub struct Debounce<T> {
    pending: Option<T>,
}

impl<T: Copy> Debounce<T> {
    /// Debounce with nothing pending.
    #[must_use]
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Replace the pending run handle, returning the one to cancel.
    pub fn replace(&mut self, handle: T) -> Option<T> {
        self.pending.replace(handle)
    }

    /// The pending run fired.
    pub fn fired(&mut self) {
        self.pending = None;
    }

    /// Whether a run is pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

struct ThrottleState {
    throttle: Throttle,
    trailing: Option<TimerId>,
}

/// Wrap `action` in a throttled event handler whose trailing timer is
/// tracked by `subs`.
pub fn throttled<H: Host>(
    subs: &Rc<Subscriptions<H>>,
    interval: Duration,
    action: impl Fn() + 'static,
) -> Handler<H::Node> {
    let weak: Weak<Subscriptions<H>> = Rc::downgrade(subs);
    let action: Rc<dyn Fn()> = Rc::new(action);
    let state = Rc::new(RefCell::new(ThrottleState {
        throttle: Throttle::new(interval),
        trailing: None,
    }));
    Rc::new(move |_event| {
        let Some(subs) = weak.upgrade() else { return };
        let now = subs.host().now();
        let decision = state.borrow().throttle.decide(now);
        match decision {
            ThrottleDecision::RunNow => {
                state.borrow_mut().throttle.mark_run(now);
                action();
            }
            ThrottleDecision::Defer(delay) => {
                if let Some(old) = state.borrow_mut().trailing.take() {
                    subs.cancel_timeout(old);
                }
                let action = Rc::clone(&action);
                let trailing_state = Rc::clone(&state);
                let host = Rc::clone(subs.host());
                let id = subs.timeout(delay, move || {
                    {
                        let mut s = trailing_state.borrow_mut();
                        s.trailing = None;
                        s.throttle.mark_run(host.now());
                    }
                    action();
                });
                state.borrow_mut().trailing = Some(id);
            }
        }
    })
}

/// Wrap `action` in a debounced event handler whose timer is tracked by
/// `subs`.
pub fn debounced<H: Host>(
    subs: &Rc<Subscriptions<H>>,
    delay: Duration,
    action: impl Fn() + 'static,
) -> Handler<H::Node> {
    let weak: Weak<Subscriptions<H>> = Rc::downgrade(subs);
    let action: Rc<dyn Fn()> = Rc::new(action);
    let state: Rc<RefCell<Debounce<TimerId>>> =
        Rc::new(RefCell::new(Debounce::new()));
    Rc::new(move |_event| {
        let Some(subs) = weak.upgrade() else { return };
        let action = Rc::clone(&action);
        let fired = Rc::clone(&state);
        let id = subs.timeout(delay, move || {
            fired.borrow_mut().fired();
            action();
        });
        let previous = state.borrow_mut().replace(id);
        if let Some(previous) = previous {
            subs.cancel_timeout(previous);
        }
    })
}

/// Run `action` every `interval` until `subs` is released or dropped.
pub fn every<H: Host>(
    subs: &Rc<Subscriptions<H>>,
    interval: Duration,
    action: impl Fn() + 'static,
) {
    arm(subs, interval, Rc::new(action));
}

fn arm<H: Host>(
    subs: &Rc<Subscriptions<H>>,
    interval: Duration,
    action: Rc<dyn Fn()>,
) {
    let weak = Rc::downgrade(subs);
    let _ = subs.timeout(interval, move || {
        action();
        if let Some(subs) = weak.upgrade() {
            arm(&subs, interval, action);
        }
    });
}
