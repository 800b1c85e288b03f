//! Stateless DOM and timing helpers shared by every manager.
//!
//! [`Subscriptions`] is the one stateful piece: each manager owns one and
//! routes every listener, timer, watcher and injected node through it, so
//! `destroy` can release exactly what `init` created.

pub mod device;
pub mod frame;
pub mod storage;
pub mod timing;
pub mod url;

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashSet;
use web_time::Duration;

use crate::host::{
    EventKind, EventTarget, Handler, Host, HostError, ListenerId, TimerId,
    WatcherId,
};

/// Resource bookkeeping for one manager.
pub struct Subscriptions<H: Host> {
    host: Rc<H>,
    listeners: RefCell<Vec<ListenerId>>,
    timers: Rc<RefCell<FxHashSet<TimerId>>>,
    watchers: RefCell<Vec<WatcherId>>,
    nodes: RefCell<Vec<H::Node>>,
}

impl<H: Host> Subscriptions<H> {
    /// Empty bookkeeping bound to `host`.
    pub fn new(host: Rc<H>) -> Self {
        Self {
            host,
            listeners: RefCell::new(Vec::new()),
            timers: Rc::new(RefCell::new(FxHashSet::default())),
            watchers: RefCell::new(Vec::new()),
            nodes: RefCell::new(Vec::new()),
        }
    }

    /// The host these resources live on.
    pub fn host(&self) -> &Rc<H> {
        &self.host
    }

    /// Register a listener that is removed on [`release`](Self::release).
    pub fn listen(
        &self,
        target: &EventTarget<H::Node>,
        kind: EventKind,
        handler: Handler<H::Node>,
    ) -> ListenerId {
        let id = self.host.listen(target, kind, handler);
        self.listeners.borrow_mut().push(id);
        id
    }

    /// Remove one listener early.
    pub fn unlisten(&self, id: ListenerId) {
        self.host.unlisten(id);
        self.listeners.borrow_mut().retain(|l| *l != id);
    }

    /// Schedule a one-shot timer that is cancelled on release if it has not
    /// fired yet.
    pub fn timeout(
        &self,
        delay: Duration,
        callback: impl FnOnce() + 'static,
    ) -> TimerId {
        let pending = Rc::clone(&self.timers);
        let own_id = Rc::new(RefCell::new(None::<TimerId>));
        let own_id_slot = Rc::clone(&own_id);
        let id = self.host.set_timeout(
            delay,
            Box::new(move || {
                if let Some(id) = own_id_slot.borrow_mut().take() {
                    let _ = pending.borrow_mut().remove(&id);
                }
                callback();
            }),
        );
        *own_id.borrow_mut() = Some(id);
        let _ = self.timers.borrow_mut().insert(id);
        id
    }

    /// Cancel one pending timer.
    pub fn cancel_timeout(&self, id: TimerId) {
        self.host.clear_timeout(id);
        let _ = self.timers.borrow_mut().remove(&id);
    }

    /// Track a watcher so release disconnects it.
    pub fn adopt_watcher(&self, id: WatcherId) {
        self.watchers.borrow_mut().push(id);
    }

    /// Disconnect one watcher early.
    pub fn drop_watcher(&self, id: WatcherId) {
        self.host.disconnect(id);
        self.watchers.borrow_mut().retain(|w| *w != id);
    }

    /// Create an element, append it to `parent` and track it for removal.
    pub fn inject(
        &self,
        parent: &H::Node,
        tag: &str,
        class: Option<&str>,
    ) -> Result<H::Node, HostError> {
        let node = self.host.create_element(tag)?;
        if let Some(class) = class {
            self.host.set_attribute(&node, "class", class);
        }
        self.host.append_child(parent, &node)?;
        self.nodes.borrow_mut().push(node.clone());
        Ok(node)
    }

    /// Remove an injected node now.
    pub fn eject(&self, node: &H::Node) {
        self.host.remove(node);
        self.nodes.borrow_mut().retain(|n| n != node);
    }

    /// Number of listeners currently registered through this bookkeeping.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Number of timers that have neither fired nor been cancelled.
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Remove every listener, cancel every pending timer, disconnect every
    /// watcher and remove every injected node.
    pub fn release(&self) {
        for id in self.listeners.borrow_mut().drain(..) {
            self.host.unlisten(id);
        }
        let timers: Vec<TimerId> = self.timers.borrow_mut().drain().collect();
        for id in timers {
            self.host.clear_timeout(id);
        }
        for id in self.watchers.borrow_mut().drain(..) {
            self.host.disconnect(id);
        }
        for node in self.nodes.borrow_mut().drain(..) {
            self.host.remove(&node);
        }
    }
}

/// Apply several inline style properties at once.
pub fn set_styles<H: Host>(host: &H, node: &H::Node, styles: &[(&str, &str)]) {
    for (property, value) in styles {
        host.set_style(node, property, value);
    }
}

/// Apply a style to every element matching `selector`.
pub fn style_all<H: Host>(host: &H, selector: &str, property: &str, value: &str) {
    for node in host.select_all(selector) {
        host.set_style(&node, property, value);
    }
}

/// Remove every element matching `selector`. Returns how many were removed.
pub fn remove_all<H: Host>(host: &H, selector: &str) -> usize {
    let nodes = host.select_all(selector);
    for node in &nodes {
        host.remove(node);
    }
    nodes.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    #[test]
    fn release_removes_everything_it_created() {
        let host = Rc::new(MemoryHost::new());
        let subs = Subscriptions::new(Rc::clone(&host));
        let body = host.body().unwrap();

        let _ = subs.listen(&EventTarget::Window, EventKind::Scroll, Rc::new(|_| {}));
        let _ = subs.timeout(Duration::from_secs(5), || {});
        let node = subs.inject(&body, "div", Some("loading-overlay")).unwrap();
        assert_eq!(host.listener_count(), 1);
        assert_eq!(host.pending_timers(), 1);

        subs.release();
        assert_eq!(host.listener_count(), 0);
        assert_eq!(host.pending_timers(), 0);
        assert!(!host.is_connected(&node));
    }

    #[test]
    fn fired_timers_are_forgotten() {
        let host = Rc::new(MemoryHost::new());
        let subs = Subscriptions::new(Rc::clone(&host));
        let _ = subs.timeout(Duration::from_millis(10), || {});
        assert_eq!(subs.pending_timers(), 1);
        host.advance(Duration::from_millis(10));
        assert_eq!(subs.pending_timers(), 0);
    }
}
