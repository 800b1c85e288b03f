//! Headless in-memory document with a manual clock.
//!
//! `MemoryHost` keeps an arena of element and text nodes, a timer queue, a
//! frame queue, intersection watchers and a listener table. Nothing runs on
//! its own: tests (or a headless pre-renderer) drive it explicitly with
//! [`advance`](MemoryHost::advance), [`run_frame`](MemoryHost::run_frame),
//! [`dispatch`](MemoryHost::dispatch) and
//! [`set_intersecting`](MemoryHost::set_intersecting).

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use web_time::Duration;

use super::selector::{SelectorList, Tree};
use super::{
    Capability, DomEvent, DrawOp, EventKind, EventTarget, FrameId, Handler,
    Host, HostError, Intersection, ListenerId, LoadTiming, MemoryUsage, Rect,
    TimerId, Viewport, WatchCallback, WatchOptions, WatcherId,
};

/// Simulated frame interval used by [`MemoryHost::run_frame`].
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "link", "meta"];

/// Handle to a node in a [`MemoryHost`] document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Default)]
struct Layout {
    top: f64,
    height: f64,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<usize>,
    children: Vec<usize>,
    style: Vec<(String, String)>,
    layout: Layout,
}

/// Arena document: node 0 is `<html>`, node 1 is `<body>`.
#[derive(Debug)]
struct Document {
    nodes: Vec<NodeData>,
}

const ROOT: usize = 0;
const BODY: usize = 1;

impl Tree for Document {
    fn parent_of(&self, id: usize) -> Option<usize> {
        self.nodes[id].parent
    }

    fn tag_of(&self, id: usize) -> &str {
        match &self.nodes[id].kind {
            NodeKind::Element { tag, .. } => tag,
            NodeKind::Text(_) => "#text",
        }
    }

    fn attr_of(&self, id: usize, name: &str) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            NodeKind::Text(_) => None,
        }
    }
}

impl Document {
    fn new() -> Self {
        let mut doc = Self { nodes: Vec::new() };
        let html = doc.alloc(NodeKind::Element {
            tag: "html".into(),
            attrs: Vec::new(),
        });
        let body = doc.alloc(NodeKind::Element {
            tag: "body".into(),
            attrs: Vec::new(),
        });
        doc.attach(html, body);
        doc
    }

    fn alloc(&mut self, kind: NodeKind) -> usize {
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
            style: Vec::new(),
            layout: Layout::default(),
        });
        self.nodes.len() - 1
    }

    fn detach(&mut self, id: usize) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&c| c != id);
        }
    }

    fn attach(&mut self, parent: usize, child: usize) {
        self.detach(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    fn is_element(&self, id: usize) -> bool {
        matches!(self.nodes[id].kind, NodeKind::Element { .. })
    }

    fn is_connected(&self, mut id: usize) -> bool {
        loop {
            if id == ROOT {
                return true;
            }
            match self.nodes[id].parent {
                Some(p) => id = p,
                None => return false,
            }
        }
    }

    /// Element descendants of `scope` in document (pre-)order.
    fn descendants(&self, scope: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> =
            self.nodes[scope].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if self.is_element(id) {
                out.push(id);
            }
            stack.extend(self.nodes[id].children.iter().rev());
        }
        out
    }

    fn attrs_mut(&mut self, id: usize) -> Option<&mut Vec<(String, String)>> {
        match &mut self.nodes[id].kind {
            NodeKind::Element { attrs, .. } => Some(attrs),
            NodeKind::Text(_) => None,
        }
    }

    fn set_attr(&mut self, id: usize, name: &str, value: &str) {
        if let Some(attrs) = self.attrs_mut(id) {
            match attrs.iter_mut().find(|(n, _)| n == name) {
                Some(slot) => value.clone_into(&mut slot.1),
                None => attrs.push((name.to_owned(), value.to_owned())),
            }
        }
    }

    fn remove_attr(&mut self, id: usize, name: &str) {
        if let Some(attrs) = self.attrs_mut(id) {
            attrs.retain(|(n, _)| n != name);
        }
    }

    fn clear_children(&mut self, id: usize) {
        for child in std::mem::take(&mut self.nodes[id].children) {
            self.nodes[child].parent = None;
        }
    }

    fn text_content(&self, id: usize) -> String {
        match &self.nodes[id].kind {
            NodeKind::Text(t) => t.clone(),
            NodeKind::Element { .. } => self.nodes[id]
                .children
                .iter()
                .map(|&c| self.text_content(c))
                .collect(),
        }
    }

    fn serialize_children(&self, id: usize, out: &mut String) {
        for &child in &self.nodes[id].children {
            match &self.nodes[child].kind {
                NodeKind::Text(t) => out.push_str(t),
                NodeKind::Element { tag, attrs } => {
                    out.push('<');
                    out.push_str(tag);
                    for (name, value) in attrs {
                        out.push_str(&format!(" {name}=\"{value}\""));
                    }
                    if VOID_TAGS.contains(&tag.as_str()) {
                        out.push_str(" />");
                    } else {
                        out.push('>');
                        self.serialize_children(child, out);
                        out.push_str(&format!("</{tag}>"));
                    }
                }
            }
        }
    }

    /// Parse `markup` and append the resulting nodes under `parent`.
    fn parse_into(&mut self, parent: usize, markup: &str) {
        let mut stack = vec![parent];
        let mut rest = markup;
        while !rest.is_empty() {
            let Some(lt) = rest.find('<') else {
                self.push_text(*stack.last().unwrap_or(&parent), rest);
                break;
            };
            if lt > 0 {
                self.push_text(*stack.last().unwrap_or(&parent), &rest[..lt]);
            }
            rest = &rest[lt..];
            if let Some(comment) = rest.strip_prefix("<!--") {
                rest = comment.find("-->").map_or("", |end| &comment[end + 3..]);
                continue;
            }
            let Some(gt) = rest.find('>') else { break };
            let tag_src = &rest[1..gt];
            rest = &rest[gt + 1..];

            if let Some(closing) = tag_src.strip_prefix('/') {
                let name = closing.trim().to_ascii_lowercase();
                while stack.len() > 1 {
                    let top = stack.pop().unwrap_or(parent);
                    if self.tag_of(top) == name {
                        break;
                    }
                }
                continue;
            }

            let self_closing = tag_src.trim_end().ends_with('/');
            let tag_src = tag_src.trim_end().trim_end_matches('/');
            let (name, attrs) = parse_tag(tag_src);
            let void = self_closing || VOID_TAGS.contains(&name.as_str());
            let id = self.alloc(NodeKind::Element { tag: name, attrs });
            self.attach(*stack.last().unwrap_or(&parent), id);
            if !void {
                stack.push(id);
            }
        }
    }

    fn push_text(&mut self, parent: usize, text: &str) {
        if text.trim().is_empty() && text.contains('\n') {
            return;
        }
        let id = self.alloc(NodeKind::Text(text.to_owned()));
        self.attach(parent, id);
    }
}

/// Split `tag attr="v" flag` into a lower-case name and attributes.
fn parse_tag(src: &str) -> (String, Vec<(String, String)>) {
    let src = src.trim();
    let name_end = src.find(char::is_whitespace).unwrap_or(src.len());
    let name = src[..name_end].to_ascii_lowercase();
    let mut attrs = Vec::new();
    let mut rest = src[name_end..].trim_start();
    while !rest.is_empty() {
        let key_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let key = rest[..key_end].to_owned();
        rest = rest[key_end..].trim_start();
        let value = if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            let (value, remaining) = match after_eq.chars().next() {
                Some(q @ ('"' | '\'')) => {
                    let body = &after_eq[1..];
                    let end = body.find(q).unwrap_or(body.len());
                    (&body[..end], body.get(end + 1..).unwrap_or(""))
                }
                _ => {
                    let end = after_eq
                        .find(char::is_whitespace)
                        .unwrap_or(after_eq.len());
                    (&after_eq[..end], &after_eq[end..])
                }
            };
            rest = remaining.trim_start();
            value.to_owned()
        } else {
            String::new()
        };
        if !key.is_empty() {
            attrs.push((key, value));
        }
    }
    (name, attrs)
}

struct Listener {
    id: ListenerId,
    target: EventTarget<NodeId>,
    kind: EventKind,
    handler: Handler<NodeId>,
}

struct Watcher {
    callback: WatchCallback<NodeId>,
    options: WatchOptions,
    observed: Vec<NodeId>,
}

type TimerCallback = Box<dyn FnOnce()>;
type FrameCallback = Box<dyn FnOnce(f64)>;

/// Headless [`Host`] implementation.
pub struct MemoryHost {
    doc: RefCell<Document>,
    next_handle: Cell<u64>,
    clock: Cell<f64>,
    listeners: RefCell<Vec<Listener>>,
    /// Keyed by (due time in µs, handle) so equal deadlines fire in order.
    timers: RefCell<BTreeMap<(u64, TimerId), TimerCallback>>,
    frames: RefCell<Vec<(FrameId, FrameCallback)>>,
    watchers: RefCell<FxHashMap<WatcherId, Watcher>>,
    custom_events: RefCell<Vec<(String, serde_json::Value)>>,
    capabilities: RefCell<FxHashSet<Capability>>,
    media: RefCell<FxHashSet<String>>,
    broken_images: RefCell<FxHashSet<String>>,
    storage: RefCell<Option<FxHashMap<String, String>>>,
    root_props: RefCell<FxHashMap<String, String>>,
    painted: RefCell<FxHashMap<NodeId, Vec<DrawOp>>>,
    focused: Cell<Option<NodeId>>,
    scroll: Cell<f64>,
    viewport: Cell<Viewport>,
    loading: Cell<bool>,
    hidden: Cell<bool>,
    path: RefCell<String>,
    query: RefCell<String>,
    load_timing: Cell<Option<LoadTiming>>,
    memory: Cell<Option<MemoryUsage>>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// Empty document (`<html><body></body></html>`), 1280×800 viewport,
    /// intersection observers and custom properties available.
    #[must_use]
    pub fn new() -> Self {
        let capabilities: FxHashSet<Capability> = [
            Capability::IntersectionObserver,
            Capability::CustomProperties,
        ]
        .into_iter()
        .collect();
        Self {
            doc: RefCell::new(Document::new()),
            next_handle: Cell::new(1),
            clock: Cell::new(0.0),
            listeners: RefCell::new(Vec::new()),
            timers: RefCell::new(BTreeMap::new()),
            frames: RefCell::new(Vec::new()),
            watchers: RefCell::new(FxHashMap::default()),
            custom_events: RefCell::new(Vec::new()),
            capabilities: RefCell::new(capabilities),
            media: RefCell::new(FxHashSet::default()),
            broken_images: RefCell::new(FxHashSet::default()),
            storage: RefCell::new(Some(FxHashMap::default())),
            root_props: RefCell::new(FxHashMap::default()),
            painted: RefCell::new(FxHashMap::default()),
            focused: Cell::new(None),
            scroll: Cell::new(0.0),
            viewport: Cell::new(Viewport {
                width: 1280.0,
                height: 800.0,
            }),
            loading: Cell::new(false),
            hidden: Cell::new(false),
            path: RefCell::new("/".into()),
            query: RefCell::new(String::new()),
            load_timing: Cell::new(None),
            memory: Cell::new(None),
        }
    }

    /// Document whose body contains `markup`.
    #[must_use]
    pub fn from_html(markup: &str) -> Self {
        let host = Self::new();
        host.doc.borrow_mut().parse_into(BODY, markup);
        host
    }

    fn next_handle(&self) -> u64 {
        let id = self.next_handle.get();
        self.next_handle.set(id + 1);
        id
    }

    // -- Fixture setup ----------------------------------------------------

    /// Set `offsetTop` / `offsetHeight` of a node.
    pub fn set_layout(&self, node: NodeId, top: f64, height: f64) {
        self.doc.borrow_mut().nodes[node.0].layout = Layout { top, height };
    }

    /// Set the viewport size (does not dispatch `resize`).
    pub fn set_viewport(&self, width: f64, height: f64) {
        self.viewport.set(Viewport { width, height });
    }

    /// Enable or disable an optional capability.
    pub fn set_capability(&self, capability: Capability, present: bool) {
        let mut caps = self.capabilities.borrow_mut();
        if present {
            let _ = caps.insert(capability);
        } else {
            let _ = caps.remove(&capability);
        }
    }

    /// Make `matchMedia(query)` match (or stop matching).
    pub fn set_media(&self, query: &str, matches: bool) {
        let mut media = self.media.borrow_mut();
        if matches {
            let _ = media.insert(query.to_owned());
        } else {
            let _ = media.remove(query);
        }
    }

    /// Make image loads of `src` fail.
    pub fn break_image(&self, src: &str) {
        let _ = self.broken_images.borrow_mut().insert(src.to_owned());
    }

    /// Make `localStorage` throw on every access.
    pub fn disable_storage(&self) {
        *self.storage.borrow_mut() = None;
    }

    /// Set `document.readyState` loading flag.
    pub fn set_loading(&self, loading: bool) {
        self.loading.set(loading);
    }

    /// Set `location.pathname` and `location.search`.
    pub fn set_location(&self, path: &str, query: &str) {
        path.clone_into(&mut self.path.borrow_mut());
        query.clone_into(&mut self.query.borrow_mut());
    }

    /// Provide navigation timing.
    pub fn set_load_timing(&self, timing: LoadTiming) {
        self.load_timing.set(Some(timing));
    }

    /// Provide heap usage (also enables [`Capability::MemoryInfo`]).
    pub fn set_memory_usage(&self, usage: MemoryUsage) {
        self.memory.set(Some(usage));
        self.set_capability(Capability::MemoryInfo, true);
    }

    // -- Inspection -------------------------------------------------------

    /// Current clock in milliseconds.
    #[must_use]
    pub fn clock(&self) -> f64 {
        self.clock.get()
    }

    /// Serialized children of `node`.
    #[must_use]
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.doc.borrow().serialize_children(node.0, &mut out);
        out
    }

    /// Concatenated text of `node` and its descendants.
    #[must_use]
    pub fn text_content(&self, node: NodeId) -> String {
        self.doc.borrow().text_content(node.0)
    }

    /// Inline style value.
    #[must_use]
    pub fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.doc.borrow().nodes[node.0]
            .style
            .iter()
            .find(|(p, _)| p == property)
            .map(|(_, v)| v.clone())
    }

    /// Custom property set on the document element.
    #[must_use]
    pub fn root_property(&self, name: &str) -> Option<String> {
        self.root_props.borrow().get(name).cloned()
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Number of pending timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Number of pending frame callbacks.
    #[must_use]
    pub fn pending_frames(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Number of live intersection watchers.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.watchers.borrow().len()
    }

    /// Number of elements `watcher` currently observes.
    #[must_use]
    pub fn observed_count(&self, watcher: WatcherId) -> usize {
        self.watchers
            .borrow()
            .get(&watcher)
            .map_or(0, |w| w.observed.len())
    }

    /// Options a watcher was created with.
    #[must_use]
    pub fn watcher_options(&self, watcher: WatcherId) -> Option<WatchOptions> {
        self.watchers.borrow().get(&watcher).map(|w| w.options.clone())
    }

    /// Custom events dispatched so far.
    #[must_use]
    pub fn custom_events(&self) -> Vec<(String, serde_json::Value)> {
        self.custom_events.borrow().clone()
    }

    /// Last drawing commands painted onto `canvas`.
    #[must_use]
    pub fn painted(&self, canvas: NodeId) -> Vec<DrawOp> {
        self.painted.borrow().get(&canvas).cloned().unwrap_or_default()
    }

    /// Raw storage value, bypassing the availability switch.
    #[must_use]
    pub fn stored(&self, key: &str) -> Option<String> {
        self.storage.borrow().as_ref().and_then(|s| s.get(key).cloned())
    }

    // -- Driving ----------------------------------------------------------

    /// Move the clock forward by `by`, firing due timers in deadline order
    /// (including timers scheduled by the callbacks themselves).
    pub fn advance(&self, by: Duration) {
        let target = self.clock.get() + by.as_secs_f64() * 1000.0;
        loop {
            let due = {
                let mut timers = self.timers.borrow_mut();
                match timers.first_key_value() {
                    Some((&(at, _), _)) if micros_to_ms(at) <= target => {
                        timers.pop_first().map(|((at, _), cb)| (at, cb))
                    }
                    _ => None,
                }
            };
            let Some((at, callback)) = due else { break };
            self.clock.set(self.clock.get().max(micros_to_ms(at)));
            callback();
        }
        self.clock.set(target);
    }

    /// Advance one [`FRAME_INTERVAL`] and run every frame callback that was
    /// pending before this call. Returns how many ran.
    pub fn run_frame(&self) -> usize {
        self.advance(FRAME_INTERVAL);
        let batch = std::mem::take(&mut *self.frames.borrow_mut());
        let now = self.clock.get();
        let count = batch.len();
        for (_, callback) in batch {
            callback(now);
        }
        count
    }

    /// Run `n` frames.
    pub fn run_frames(&self, n: usize) {
        for _ in 0..n {
            let _ = self.run_frame();
        }
    }

    /// Dispatch `event` at `target`. Node targets bubble through their
    /// ancestors, then the document and the window.
    pub fn dispatch(
        &self,
        target: &EventTarget<NodeId>,
        event: DomEvent<NodeId>,
    ) -> DomEvent<NodeId> {
        let mut path = Vec::new();
        match target {
            EventTarget::Node(node) => {
                let doc = self.doc.borrow();
                let mut cur = Some(node.0);
                while let Some(id) = cur {
                    path.push(EventTarget::Node(NodeId(id)));
                    cur = doc.nodes[id].parent;
                }
                path.push(EventTarget::Document);
                path.push(EventTarget::Window);
            }
            EventTarget::Document => {
                path.push(EventTarget::Document);
                path.push(EventTarget::Window);
            }
            EventTarget::Window => path.push(EventTarget::Window),
        }
        for hop in &path {
            let handlers: Vec<Handler<NodeId>> = self
                .listeners
                .borrow()
                .iter()
                .filter(|l| l.kind == event.kind && &l.target == hop)
                .map(|l| Rc::clone(&l.handler))
                .collect();
            for handler in handlers {
                handler(&event);
            }
        }
        event
    }

    /// Click on `node`.
    pub fn click(&self, node: NodeId) -> DomEvent<NodeId> {
        let event = DomEvent::new(EventKind::Click).with_target(node);
        self.dispatch(&EventTarget::Node(node), event)
    }

    /// Key press, targeted at the focused element (or the document).
    pub fn press_key(&self, key: &str, alt: bool, shift: bool) -> DomEvent<NodeId> {
        let event = DomEvent::new(EventKind::KeyDown).with_key(key, alt, shift);
        match self.focused.get().filter(|n| self.is_connected(n)) {
            Some(node) => self.dispatch(
                &EventTarget::Node(node),
                event.with_target(node),
            ),
            None => self.dispatch(&EventTarget::Document, event),
        }
    }

    /// Set the scroll position and dispatch `scroll` on the window.
    pub fn scroll_window_to(&self, y: f64) {
        self.scroll.set(y.max(0.0));
        let _ = self.dispatch(
            &EventTarget::Window,
            DomEvent::new(EventKind::Scroll),
        );
    }

    /// Resize the viewport and dispatch `resize` on the window.
    pub fn resize_window(&self, width: f64, height: f64) {
        self.set_viewport(width, height);
        let _ = self.dispatch(
            &EventTarget::Window,
            DomEvent::new(EventKind::Resize),
        );
    }

    /// Dispatch `mousemove` on the document at page position `(x, y)`.
    pub fn move_pointer(&self, x: f32, y: f32) {
        let _ = self.dispatch(
            &EventTarget::Document,
            DomEvent::new(EventKind::MouseMove).with_pointer(x, y),
        );
    }

    /// Flip `document.hidden` and dispatch `visibilitychange`.
    pub fn set_hidden(&self, hidden: bool) {
        self.hidden.set(hidden);
        let _ = self.dispatch(
            &EventTarget::Document,
            DomEvent::new(EventKind::VisibilityChange),
        );
    }

    /// Finish loading: clear the loading flag and dispatch
    /// `DOMContentLoaded` then `load`.
    pub fn finish_loading(&self) {
        self.loading.set(false);
        let _ = self.dispatch(
            &EventTarget::Document,
            DomEvent::new(EventKind::DomContentLoaded),
        );
        let _ = self.dispatch(&EventTarget::Window, DomEvent::new(EventKind::Load));
    }

    /// Report an intersection change for `node` to every watcher observing
    /// it.
    pub fn set_intersecting(&self, node: NodeId, intersecting: bool) {
        let interested: Vec<(WatcherId, WatchCallback<NodeId>)> = self
            .watchers
            .borrow()
            .iter()
            .filter(|(_, w)| w.observed.contains(&node))
            .map(|(id, w)| (*id, Rc::clone(&w.callback)))
            .collect();
        let entries = [Intersection {
            target: node,
            is_intersecting: intersecting,
        }];
        for (id, callback) in interested {
            callback(id, &entries);
        }
    }
}

fn ms_to_micros(ms: f64) -> u64 {
    (ms.max(0.0) * 1000.0).round() as u64
}

fn micros_to_ms(us: u64) -> f64 {
    us as f64 / 1000.0
}

impl Host for MemoryHost {
    type Node = NodeId;

    fn select(&self, selector: &str) -> Option<NodeId> {
        self.select_all(selector).into_iter().next()
    }

    fn select_all(&self, selector: &str) -> Vec<NodeId> {
        let list = SelectorList::parse(selector);
        let doc = self.doc.borrow();
        doc.descendants(ROOT)
            .into_iter()
            .filter(|&id| list.matches(&*doc, id))
            .map(NodeId)
            .collect()
    }

    fn select_within(&self, scope: &NodeId, selector: &str) -> Vec<NodeId> {
        let list = SelectorList::parse(selector);
        let doc = self.doc.borrow();
        doc.descendants(scope.0)
            .into_iter()
            .filter(|&id| list.matches(&*doc, id))
            .map(NodeId)
            .collect()
    }

    fn closest(&self, node: &NodeId, selector: &str) -> Option<NodeId> {
        let list = SelectorList::parse(selector);
        let doc = self.doc.borrow();
        let mut cur = Some(node.0);
        while let Some(id) = cur {
            if doc.is_element(id) && list.matches(&*doc, id) {
                return Some(NodeId(id));
            }
            cur = doc.nodes[id].parent;
        }
        None
    }

    fn body(&self) -> Option<NodeId> {
        Some(NodeId(BODY))
    }

    fn tag_name(&self, node: &NodeId) -> String {
        self.doc.borrow().tag_of(node.0).to_ascii_uppercase()
    }

    fn create_element(&self, tag: &str) -> Result<NodeId, HostError> {
        if tag.is_empty() || !tag.chars().all(char::is_alphanumeric) {
            return Err(HostError::new(format!("invalid tag name '{tag}'")));
        }
        let id = self.doc.borrow_mut().alloc(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        });
        Ok(NodeId(id))
    }

    fn append_child(&self, parent: &NodeId, child: &NodeId) -> Result<(), HostError> {
        let mut doc = self.doc.borrow_mut();
        if !doc.is_element(parent.0) {
            return Err(HostError::new("cannot append to a text node"));
        }
        doc.attach(parent.0, child.0);
        Ok(())
    }

    fn remove(&self, node: &NodeId) {
        self.doc.borrow_mut().detach(node.0);
    }

    fn is_connected(&self, node: &NodeId) -> bool {
        self.doc.borrow().is_connected(node.0)
    }

    fn text(&self, node: &NodeId) -> String {
        self.doc.borrow().text_content(node.0)
    }

    fn set_text(&self, node: &NodeId, text: &str) {
        let mut doc = self.doc.borrow_mut();
        doc.clear_children(node.0);
        if !text.is_empty() {
            let id = doc.alloc(NodeKind::Text(text.to_owned()));
            doc.attach(node.0, id);
        }
    }

    fn set_inner_html(&self, node: &NodeId, html: &str) {
        let mut doc = self.doc.borrow_mut();
        doc.clear_children(node.0);
        doc.parse_into(node.0, html);
    }

    fn add_class(&self, node: &NodeId, class: &str) {
        if self.has_class(node, class) {
            return;
        }
        let mut doc = self.doc.borrow_mut();
        let joined = match doc.attr_of(node.0, "class") {
            Some(existing) if !existing.trim().is_empty() => {
                format!("{} {class}", existing.trim())
            }
            _ => class.to_owned(),
        };
        doc.set_attr(node.0, "class", &joined);
    }

    fn remove_class(&self, node: &NodeId, class: &str) {
        let mut doc = self.doc.borrow_mut();
        if let Some(existing) = doc.attr_of(node.0, "class") {
            let kept: Vec<&str> =
                existing.split_whitespace().filter(|c| *c != class).collect();
            let joined = kept.join(" ");
            doc.set_attr(node.0, "class", &joined);
        }
    }

    fn has_class(&self, node: &NodeId, class: &str) -> bool {
        self.doc
            .borrow()
            .attr_of(node.0, "class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.doc.borrow().attr_of(node.0, name).map(str::to_owned)
    }

    fn set_attribute(&self, node: &NodeId, name: &str, value: &str) {
        self.doc.borrow_mut().set_attr(node.0, name, value);
    }

    fn remove_attribute(&self, node: &NodeId, name: &str) {
        self.doc.borrow_mut().remove_attr(node.0, name);
    }

    fn set_style(&self, node: &NodeId, property: &str, value: &str) {
        let mut doc = self.doc.borrow_mut();
        let style = &mut doc.nodes[node.0].style;
        style.retain(|(p, _)| p != property);
        if !value.is_empty() {
            style.push((property.to_owned(), value.to_owned()));
        }
    }

    fn set_root_property(&self, name: &str, value: &str) {
        let _ = self
            .root_props
            .borrow_mut()
            .insert(name.to_owned(), value.to_owned());
    }

    fn offset_top(&self, node: &NodeId) -> f64 {
        self.doc.borrow().nodes[node.0].layout.top
    }

    fn offset_height(&self, node: &NodeId) -> f64 {
        self.doc.borrow().nodes[node.0].layout.height
    }

    fn client_rect(&self, node: &NodeId) -> Rect {
        let layout = self.doc.borrow().nodes[node.0].layout.clone();
        Rect {
            x: 0.0,
            y: layout.top - self.scroll.get(),
            width: self.viewport.get().width,
            height: layout.height,
        }
    }

    fn scroll_y(&self) -> f64 {
        self.scroll.get()
    }

    fn document_height(&self) -> f64 {
        let doc = self.doc.borrow();
        let content = doc
            .nodes
            .iter()
            .map(|n| n.layout.top + n.layout.height)
            .fold(0.0, f64::max);
        content.max(self.viewport.get().height)
    }

    fn viewport(&self) -> Viewport {
        self.viewport.get()
    }

    fn scroll_to(&self, top: f64, _smooth: bool) {
        let max = (self.document_height() - self.viewport.get().height).max(0.0);
        self.scroll.set(top.clamp(0.0, max));
    }

    fn focus(&self, node: &NodeId) {
        self.focused.set(Some(*node));
    }

    fn active_element(&self) -> Option<NodeId> {
        self.focused.get()
    }

    fn activate(&self, node: &NodeId) {
        let _ = self.click(*node);
    }

    fn is_loading(&self) -> bool {
        self.loading.get()
    }

    fn is_hidden(&self) -> bool {
        self.hidden.get()
    }

    fn location_path(&self) -> String {
        self.path.borrow().clone()
    }

    fn location_query(&self) -> String {
        self.query.borrow().clone()
    }

    fn matches_media(&self, query: &str) -> bool {
        self.media.borrow().contains(query)
    }

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities.borrow().contains(&capability)
    }

    fn listen(
        &self,
        target: &EventTarget<NodeId>,
        kind: EventKind,
        handler: Handler<NodeId>,
    ) -> ListenerId {
        let id = ListenerId(self.next_handle());
        self.listeners.borrow_mut().push(Listener {
            id,
            target: target.clone(),
            kind,
            handler,
        });
        id
    }

    fn unlisten(&self, id: ListenerId) {
        self.listeners.borrow_mut().retain(|l| l.id != id);
    }

    fn dispatch_custom(&self, name: &str, detail: &serde_json::Value) {
        self.custom_events
            .borrow_mut()
            .push((name.to_owned(), detail.clone()));
    }

    fn now(&self) -> f64 {
        self.clock.get()
    }

    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        let id = TimerId(self.next_handle());
        let due = ms_to_micros(self.clock.get() + delay.as_secs_f64() * 1000.0);
        let _ = self.timers.borrow_mut().insert((due, id), callback);
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        self.timers.borrow_mut().retain(|(_, t), _| *t != id);
    }

    fn request_frame(&self, callback: Box<dyn FnOnce(f64)>) -> FrameId {
        let id = FrameId(self.next_handle());
        self.frames.borrow_mut().push((id, callback));
        id
    }

    fn cancel_frame(&self, id: FrameId) {
        self.frames.borrow_mut().retain(|(f, _)| *f != id);
    }

    fn watch(
        &self,
        options: &WatchOptions,
        callback: WatchCallback<NodeId>,
    ) -> Result<WatcherId, HostError> {
        if !self.supports(Capability::IntersectionObserver) {
            return Err(HostError::new("IntersectionObserver is not available"));
        }
        let id = WatcherId(self.next_handle());
        let _ = self.watchers.borrow_mut().insert(
            id,
            Watcher {
                callback,
                options: options.clone(),
                observed: Vec::new(),
            },
        );
        Ok(id)
    }

    fn observe(&self, watcher: WatcherId, node: &NodeId) {
        if let Some(w) = self.watchers.borrow_mut().get_mut(&watcher) {
            if !w.observed.contains(node) {
                w.observed.push(*node);
            }
        }
    }

    fn unobserve(&self, watcher: WatcherId, node: &NodeId) {
        if let Some(w) = self.watchers.borrow_mut().get_mut(&watcher) {
            w.observed.retain(|n| n != node);
        }
    }

    fn disconnect(&self, watcher: WatcherId) {
        let _ = self.watchers.borrow_mut().remove(&watcher);
    }

    fn preload_image(&self, src: &str, done: Box<dyn FnOnce(bool)>) {
        let ok = !self.broken_images.borrow().contains(src);
        let _ = self.set_timeout(Duration::ZERO, Box::new(move || done(ok)));
    }

    fn resize_canvas(&self, canvas: &NodeId, width: u32, height: u32) {
        let mut doc = self.doc.borrow_mut();
        doc.set_attr(canvas.0, "width", &width.to_string());
        doc.set_attr(canvas.0, "height", &height.to_string());
    }

    fn paint(&self, canvas: &NodeId, ops: &[DrawOp]) -> Result<(), HostError> {
        if self.doc.borrow().tag_of(canvas.0) != "canvas" {
            return Err(HostError::new("paint target is not a canvas"));
        }
        let _ = self.painted.borrow_mut().insert(*canvas, ops.to_vec());
        Ok(())
    }

    fn load_timing(&self) -> Option<LoadTiming> {
        self.load_timing.get()
    }

    fn memory_usage(&self) -> Option<MemoryUsage> {
        self.memory.get()
    }

    fn storage_get(&self, key: &str) -> Result<Option<String>, HostError> {
        self.storage
            .borrow()
            .as_ref()
            .map(|s| s.get(key).cloned())
            .ok_or_else(|| HostError::new("storage unavailable"))
    }

    fn storage_set(&self, key: &str, value: &str) -> Result<(), HostError> {
        let mut storage = self.storage.borrow_mut();
        let s = storage
            .as_mut()
            .ok_or_else(|| HostError::new("storage unavailable"))?;
        let _ = s.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn storage_remove(&self, key: &str) -> Result<(), HostError> {
        let mut storage = self.storage.borrow_mut();
        let s = storage
            .as_mut()
            .ok_or_else(|| HostError::new("storage unavailable"))?;
        let _ = s.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_markup_and_selects_in_document_order() {
        let host = MemoryHost::from_html(
            r##"<header><nav><a href="#about">About</a></nav></header>
               <main><section id="about"><img data-src="/a.png"></section>
               <section id="work"></section></main>"##,
        );
        let sections = host.select_all("main section");
        assert_eq!(sections.len(), 2);
        assert_eq!(host.attribute(&sections[1], "id").as_deref(), Some("work"));
        assert!(host.select("img[data-src]").is_some());
        assert_eq!(host.text_content(host.select("a").unwrap()), "About");
    }

    #[test]
    fn serializes_inner_html_canonically() {
        let host = MemoryHost::from_html("<h1></h1>");
        let h1 = host.select("h1").unwrap();
        host.set_inner_html(&h1, "into<br />Digital <span class=\"highlight\">X</span>");
        assert_eq!(
            host.inner_html(h1),
            "into<br />Digital <span class=\"highlight\">X</span>"
        );
        assert_eq!(host.select_within(&h1, ".highlight").len(), 1);
    }

    #[test]
    fn timers_fire_in_deadline_order() {
        let host = MemoryHost::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (delay, tag) in [(30, "b"), (10, "a"), (50, "c")] {
            let log = Rc::clone(&log);
            let _ = host.set_timeout(
                Duration::from_millis(delay),
                Box::new(move || log.borrow_mut().push(tag)),
            );
        }
        host.advance(Duration::from_millis(40));
        assert_eq!(*log.borrow(), vec!["a", "b"]);
        assert_eq!(host.pending_timers(), 1);
    }

    #[test]
    fn clicks_bubble_to_ancestors_and_document() {
        let host = MemoryHost::from_html("<div id=\"outer\"><a id=\"inner\"></a></div>");
        let outer = host.select("#outer").unwrap();
        let inner = host.select("#inner").unwrap();
        let hits = Rc::new(Cell::new(0));
        for target in [EventTarget::Node(outer), EventTarget::Document] {
            let hits = Rc::clone(&hits);
            let _ = host.listen(
                &target,
                EventKind::Click,
                Rc::new(move |_| hits.set(hits.get() + 1)),
            );
        }
        let _ = host.click(inner);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn removed_nodes_are_disconnected() {
        let host = MemoryHost::from_html("<div class=\"x\"></div>");
        let div = host.select(".x").unwrap();
        host.remove(&div);
        assert!(!host.is_connected(&div));
        assert!(host.select(".x").is_none());
    }
}
