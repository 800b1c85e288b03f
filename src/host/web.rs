//! Browser host on top of `web-sys`.
//!
//! Every JS callback is a `Closure` owned by one of the registries below.
//! A closure is never dropped while it may be on the stack: removed
//! closures are parked in `retired` and freed at the start of the next
//! timer or frame callback, which the browser never nests inside another
//! callback.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::f64::consts::TAU;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use wasm_bindgen::prelude::*;
use web_sys::{
    AddEventListenerOptions, CanvasRenderingContext2d, CustomEvent,
    CustomEventInit, Document, Element, ErrorEvent,
    Event, HtmlCanvasElement, HtmlElement, HtmlImageElement,
    IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit,
    KeyboardEvent, MouseEvent, PerformanceNavigationTiming,
    PromiseRejectionEvent, ScrollBehavior, ScrollToOptions, Storage, Window,
};

use web_time::Duration;

use super::{
    Capability, DomEvent, DrawOp, EventKind, EventTarget, FrameId, Handler,
    Host, HostError, Intersection, ListenerId, LoadTiming, MemoryUsage, Rect,
    TimerId, Viewport, WatchCallback, WatchOptions, WatcherId,
};

type Retired = Rc<RefCell<Vec<Box<dyn Any>>>>;
type OneShot = Closure<dyn FnMut(JsValue)>;

fn js_error(value: &JsValue) -> HostError {
    HostError::new(value.as_string().unwrap_or_else(|| format!("{value:?}")))
}

struct Listener {
    target: web_sys::EventTarget,
    kind: EventKind,
    closure: Closure<dyn FnMut(Event)>,
}

struct Watcher {
    observer: IntersectionObserver,
    _closure: Closure<dyn FnMut(js_sys::Array, IntersectionObserver)>,
}

/// Pending one-shot callbacks (timers or animation frames) keyed by our
/// handle, with the browser's handle alongside.
#[derive(Default)]
struct OneShots {
    live: RefCell<FxHashMap<u64, (i32, OneShot)>>,
}

impl OneShots {
    fn arm(
        self: &Rc<Self>,
        key: u64,
        retired: &Retired,
        callback: Box<dyn FnOnce(JsValue)>,
        schedule: impl FnOnce(&js_sys::Function) -> Result<i32, JsValue>,
    ) {
        let shots = Rc::downgrade(self);
        let retired = Rc::clone(retired);
        let mut callback = Some(callback);
        let closure = OneShot::new(move |arg: JsValue| {
            retired.borrow_mut().clear();
            let own = shots.upgrade().and_then(|s| s.live.borrow_mut().remove(&key));
            if let Some(callback) = callback.take() {
                callback(arg);
            }
            if let Some((_, own)) = own {
                retired.borrow_mut().push(Box::new(own));
            }
        });
        match schedule(closure.as_ref().unchecked_ref()) {
            Ok(handle) => {
                let _ = self.live.borrow_mut().insert(key, (handle, closure));
            }
            Err(e) => log::warn!("Failed to schedule callback: {}", js_error(&e)),
        }
    }

    fn cancel(&self, key: u64) -> Option<(i32, OneShot)> {
        self.live.borrow_mut().remove(&key)
    }
}

/// [`Host`] backed by the real `window` and `document`.
pub struct WebHost {
    window: Window,
    document: Document,
    next_handle: Cell<u64>,
    listeners: RefCell<FxHashMap<ListenerId, Listener>>,
    timers: Rc<OneShots>,
    frames: Rc<OneShots>,
    watchers: RefCell<FxHashMap<WatcherId, Watcher>>,
    retired: Retired,
}

impl WebHost {
    /// Host for the current browsing context.
    pub fn new() -> Result<Self, HostError> {
        let window = web_sys::window().ok_or_else(|| HostError::new("no global window"))?;
        let document = window
            .document()
            .ok_or_else(|| HostError::new("window has no document"))?;
        Ok(Self {
            window,
            document,
            next_handle: Cell::new(1),
            listeners: RefCell::new(FxHashMap::default()),
            timers: Rc::new(OneShots::default()),
            frames: Rc::new(OneShots::default()),
            watchers: RefCell::new(FxHashMap::default()),
            retired: Rc::new(RefCell::new(Vec::new())),
        })
    }

    /// The global window.
    pub fn window(&self) -> &Window {
        &self.window
    }

    fn next_handle(&self) -> u64 {
        let id = self.next_handle.get();
        self.next_handle.set(id + 1);
        id
    }

    fn js_target(&self, target: &EventTarget<Element>) -> web_sys::EventTarget {
        match target {
            EventTarget::Window => self.window.clone().into(),
            EventTarget::Document => self.document.clone().into(),
            EventTarget::Node(node) => node.clone().into(),
        }
    }

    fn storage(&self) -> Result<Storage, HostError> {
        self.window
            .local_storage()
            .map_err(|e| js_error(&e))?
            .ok_or_else(|| HostError::new("storage unavailable"))
    }

    fn root_style(&self) -> Option<web_sys::CssStyleDeclaration> {
        self.document
            .document_element()
            .and_then(|e| e.dyn_into::<HtmlElement>().ok())
            .map(|e| e.style())
    }

    fn navigation_timing(&self) -> Option<PerformanceNavigationTiming> {
        let performance = self.window.performance()?;
        performance
            .get_entries_by_type("navigation")
            .get(0)
            .dyn_into::<PerformanceNavigationTiming>()
            .ok()
    }

    fn paint_time(&self, name: &str) -> Option<f64> {
        let performance = self.window.performance()?;
        performance
            .get_entries_by_name(name)
            .get(0)
            .dyn_into::<web_sys::PerformanceEntry>()
            .ok()
            .map(|e| e.start_time())
    }
}

fn to_dom_event(kind: EventKind, event: &Event) -> DomEvent<Element> {
    let mut dom = DomEvent::new(kind);
    dom.target = event.target().and_then(|t| t.dyn_into::<Element>().ok());
    if let Some(key) = event.dyn_ref::<KeyboardEvent>() {
        dom = dom.with_key(&key.key(), key.alt_key(), key.shift_key());
    }
    if let Some(mouse) = event.dyn_ref::<MouseEvent>() {
        dom = dom.with_pointer(mouse.page_x() as f32, mouse.page_y() as f32);
    }
    if let Some(error) = event.dyn_ref::<ErrorEvent>() {
        dom = dom.with_message(&error.message());
    }
    if let Some(rejection) = event.dyn_ref::<PromiseRejectionEvent>() {
        let reason = rejection.reason();
        let text = reason.as_string().unwrap_or_else(|| format!("{reason:?}"));
        dom = dom.with_message(&text);
    }
    dom
}

fn draw(ctx: &CanvasRenderingContext2d, op: &DrawOp) -> Result<(), JsValue> {
    match op {
        DrawOp::Clear { width, height } => {
            ctx.clear_rect(0.0, 0.0, f64::from(*width), f64::from(*height));
        }
        DrawOp::Circle { center, radius, color } => {
            ctx.begin_path();
            ctx.arc(
                f64::from(center.x),
                f64::from(center.y),
                f64::from(*radius),
                0.0,
                TAU,
            )?;
            ctx.set_fill_style_str(&color.hex());
            ctx.fill();
        }
        DrawOp::Line { from, to, color, alpha, width } => {
            ctx.begin_path();
            ctx.move_to(f64::from(from.x), f64::from(from.y));
            ctx.line_to(f64::from(to.x), f64::from(to.y));
            ctx.set_stroke_style_str(&color.rgba(*alpha));
            ctx.set_line_width(f64::from(*width));
            ctx.stroke();
        }
    }
    Ok(())
}

fn reflect_f64(object: &JsValue, key: &str) -> f64 {
    js_sys::Reflect::get(object, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0)
}

impl Host for WebHost {
    type Node = Element;

    fn select(&self, selector: &str) -> Option<Element> {
        self.document.query_selector(selector).ok().flatten()
    }

    fn select_all(&self, selector: &str) -> Vec<Element> {
        let Ok(list) = self.document.query_selector_all(selector) else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.get(i))
            .filter_map(|n| n.dyn_into::<Element>().ok())
            .collect()
    }

    fn select_within(&self, scope: &Element, selector: &str) -> Vec<Element> {
        let Ok(list) = scope.query_selector_all(selector) else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.get(i))
            .filter_map(|n| n.dyn_into::<Element>().ok())
            .collect()
    }

    fn closest(&self, node: &Element, selector: &str) -> Option<Element> {
        node.closest(selector).ok().flatten()
    }

    fn body(&self) -> Option<Element> {
        self.document.body().map(Into::into)
    }

    fn tag_name(&self, node: &Element) -> String {
        node.tag_name().to_ascii_uppercase()
    }

    fn create_element(&self, tag: &str) -> Result<Element, HostError> {
        self.document.create_element(tag).map_err(|e| js_error(&e))
    }

    fn append_child(&self, parent: &Element, child: &Element) -> Result<(), HostError> {
        parent
            .append_child(child)
            .map(|_| ())
            .map_err(|e| js_error(&e))
    }

    fn remove(&self, node: &Element) {
        node.remove();
    }

    fn is_connected(&self, node: &Element) -> bool {
        node.is_connected()
    }

    fn text(&self, node: &Element) -> String {
        node.text_content().unwrap_or_default()
    }

    fn set_text(&self, node: &Element, text: &str) {
        node.set_text_content(Some(text));
    }

    fn set_inner_html(&self, node: &Element, html: &str) {
        node.set_inner_html(html);
    }

    fn add_class(&self, node: &Element, class: &str) {
        let _ = node.class_list().add_1(class);
    }

    fn remove_class(&self, node: &Element, class: &str) {
        let _ = node.class_list().remove_1(class);
    }

    fn has_class(&self, node: &Element, class: &str) -> bool {
        node.class_list().contains(class)
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn set_attribute(&self, node: &Element, name: &str, value: &str) {
        if let Err(e) = node.set_attribute(name, value) {
            log::debug!("set_attribute({name}) failed: {}", js_error(&e));
        }
    }

    fn remove_attribute(&self, node: &Element, name: &str) {
        let _ = node.remove_attribute(name);
    }

    fn set_style(&self, node: &Element, property: &str, value: &str) {
        let Some(element) = node.dyn_ref::<HtmlElement>() else { return };
        let style = element.style();
        if value.is_empty() {
            let _ = style.remove_property(property);
        } else {
            let _ = style.set_property(property, value);
        }
    }

    fn set_root_property(&self, name: &str, value: &str) {
        if let Some(style) = self.root_style() {
            let _ = style.set_property(name, value);
        }
    }

    fn offset_top(&self, node: &Element) -> f64 {
        node.dyn_ref::<HtmlElement>()
            .map_or(0.0, |e| f64::from(e.offset_top()))
    }

    fn offset_height(&self, node: &Element) -> f64 {
        node.dyn_ref::<HtmlElement>()
            .map_or(0.0, |e| f64::from(e.offset_height()))
    }

    fn client_rect(&self, node: &Element) -> Rect {
        let rect = node.get_bounding_client_rect();
        Rect {
            x: rect.x(),
            y: rect.y(),
            width: rect.width(),
            height: rect.height(),
        }
    }

    fn scroll_y(&self) -> f64 {
        self.window.scroll_y().unwrap_or(0.0)
    }

    fn document_height(&self) -> f64 {
        self.document
            .document_element()
            .map_or(0.0, |e| f64::from(e.scroll_height()))
    }

    fn viewport(&self) -> Viewport {
        let read = |v: Result<JsValue, JsValue>| v.ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
        Viewport {
            width: read(self.window.inner_width()),
            height: read(self.window.inner_height()),
        }
    }

    fn scroll_to(&self, top: f64, smooth: bool) {
        let options = ScrollToOptions::new();
        options.set_top(top);
        options.set_behavior(if smooth {
            ScrollBehavior::Smooth
        } else {
            ScrollBehavior::Auto
        });
        self.window.scroll_to_with_scroll_to_options(&options);
    }

    fn focus(&self, node: &Element) {
        if let Some(element) = node.dyn_ref::<HtmlElement>() {
            let _ = element.focus();
        }
    }

    fn active_element(&self) -> Option<Element> {
        self.document.active_element()
    }

    fn activate(&self, node: &Element) {
        if let Some(element) = node.dyn_ref::<HtmlElement>() {
            element.click();
        }
    }

    fn is_loading(&self) -> bool {
        self.document.ready_state() == "loading"
    }

    fn is_hidden(&self) -> bool {
        self.document.hidden()
    }

    fn location_path(&self) -> String {
        self.window.location().pathname().unwrap_or_default()
    }

    fn location_query(&self) -> String {
        self.window.location().search().unwrap_or_default()
    }

    fn matches_media(&self, query: &str) -> bool {
        self.window
            .match_media(query)
            .ok()
            .flatten()
            .is_some_and(|m| m.matches())
    }

    fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::IntersectionObserver => {
                js_sys::Reflect::has(&self.window, &JsValue::from_str("IntersectionObserver"))
                    .unwrap_or(false)
            }
            Capability::CustomProperties => {
                web_sys::css::supports_with_value("color", "var(--folio-supports)")
                    .unwrap_or(false)
            }
            Capability::MemoryInfo => self.window.performance().is_some_and(|p| {
                js_sys::Reflect::get(&p, &JsValue::from_str("memory"))
                    .is_ok_and(|m| m.is_object())
            }),
        }
    }

    fn listen(
        &self,
        target: &EventTarget<Element>,
        kind: EventKind,
        handler: Handler<Element>,
    ) -> ListenerId {
        let id = ListenerId(self.next_handle());
        let closure = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let dom = to_dom_event(kind, &event);
            handler(&dom);
            if dom.default_prevented() {
                event.prevent_default();
            }
        });
        let js_target = self.js_target(target);
        let options = AddEventListenerOptions::new();
        options.set_passive(kind.is_passive());
        if let Err(e) = js_target.add_event_listener_with_callback_and_add_event_listener_options(
            kind.as_str(),
            closure.as_ref().unchecked_ref(),
            &options,
        ) {
            log::warn!("Failed to listen for {}: {}", kind.as_str(), js_error(&e));
        }
        let _ = self.listeners.borrow_mut().insert(
            id,
            Listener {
                target: js_target,
                kind,
                closure,
            },
        );
        id
    }

    fn unlisten(&self, id: ListenerId) {
        let Some(listener) = self.listeners.borrow_mut().remove(&id) else {
            return;
        };
        let _ = listener.target.remove_event_listener_with_callback(
            listener.kind.as_str(),
            listener.closure.as_ref().unchecked_ref(),
        );
        self.retired.borrow_mut().push(Box::new(listener.closure));
    }

    fn dispatch_custom(&self, name: &str, detail: &serde_json::Value) {
        let init = CustomEventInit::new();
        if let Ok(detail) = js_sys::JSON::parse(&detail.to_string()) {
            init.set_detail(&detail);
        }
        match CustomEvent::new_with_event_init_dict(name, &init) {
            Ok(event) => {
                let _ = self.document.dispatch_event(&event);
            }
            Err(e) => log::warn!("Failed to create {name} event: {}", js_error(&e)),
        }
    }

    fn now(&self) -> f64 {
        self.window.performance().map_or(0.0, |p| p.now())
    }

    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        let id = self.next_handle();
        let window = self.window.clone();
        let ms = delay.as_millis().min(i32::MAX as u128) as i32;
        self.timers.arm(
            id,
            &self.retired,
            Box::new(move |_| callback()),
            move |f| window.set_timeout_with_callback_and_timeout_and_arguments_0(f, ms),
        );
        TimerId(id)
    }

    fn clear_timeout(&self, id: TimerId) {
        if let Some((handle, closure)) = self.timers.cancel(id.0) {
            self.window.clear_timeout_with_handle(handle);
            self.retired.borrow_mut().push(Box::new(closure));
        }
    }

    fn request_frame(&self, callback: Box<dyn FnOnce(f64)>) -> FrameId {
        let id = self.next_handle();
        let window = self.window.clone();
        self.frames.arm(
            id,
            &self.retired,
            Box::new(move |ts| callback(ts.as_f64().unwrap_or(0.0))),
            move |f| window.request_animation_frame(f),
        );
        FrameId(id)
    }

    fn cancel_frame(&self, id: FrameId) {
        if let Some((handle, closure)) = self.frames.cancel(id.0) {
            let _ = self.window.cancel_animation_frame(handle);
            self.retired.borrow_mut().push(Box::new(closure));
        }
    }

    fn watch(
        &self,
        options: &WatchOptions,
        callback: WatchCallback<Element>,
    ) -> Result<WatcherId, HostError> {
        if !self.supports(Capability::IntersectionObserver) {
            return Err(HostError::new("IntersectionObserver is not available"));
        }
        let id = WatcherId(self.next_handle());
        let closure = Closure::<dyn FnMut(js_sys::Array, IntersectionObserver)>::new(
            move |entries: js_sys::Array, _observer: IntersectionObserver| {
                let entries: Vec<Intersection<Element>> = entries
                    .iter()
                    .filter_map(|e| e.dyn_into::<IntersectionObserverEntry>().ok())
                    .map(|e| Intersection {
                        target: e.target(),
                        is_intersecting: e.is_intersecting(),
                    })
                    .collect();
                callback(id, &entries);
            },
        );
        let init = IntersectionObserverInit::new();
        init.set_threshold(&JsValue::from_f64(options.threshold));
        init.set_root_margin(&options.root_margin);
        let observer = IntersectionObserver::new_with_options(
            closure.as_ref().unchecked_ref(),
            &init,
        )
        .map_err(|e| js_error(&e))?;
        let _ = self.watchers.borrow_mut().insert(
            id,
            Watcher {
                observer,
                _closure: closure,
            },
        );
        Ok(id)
    }

    fn observe(&self, watcher: WatcherId, node: &Element) {
        if let Some(w) = self.watchers.borrow().get(&watcher) {
            w.observer.observe(node);
        }
    }

    fn unobserve(&self, watcher: WatcherId, node: &Element) {
        if let Some(w) = self.watchers.borrow().get(&watcher) {
            w.observer.unobserve(node);
        }
    }

    fn disconnect(&self, watcher: WatcherId) {
        if let Some(w) = self.watchers.borrow_mut().remove(&watcher) {
            w.observer.disconnect();
            self.retired.borrow_mut().push(Box::new(w));
        }
    }

    fn preload_image(&self, src: &str, done: Box<dyn FnOnce(bool)>) {
        let preload = match HtmlImageElement::new() {
            Ok(preload) => preload,
            Err(e) => {
                log::warn!("Image preloading unavailable: {}", js_error(&e));
                let _ = self.set_timeout(Duration::ZERO, Box::new(move || done(false)));
                return;
            }
        };
        let done = Rc::new(RefCell::new(Some(done)));
        let settle = |ok: bool| {
            let done = Rc::clone(&done);
            Closure::<dyn FnMut()>::new(move || {
                if let Some(done) = done.borrow_mut().take() {
                    done(ok);
                }
            })
        };
        let on_load = settle(true);
        let on_error = settle(false);
        preload.set_onload(Some(on_load.as_ref().unchecked_ref()));
        preload.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        preload.set_src(src);
        // One pair per lazy image; released with the page.
        on_load.forget();
        on_error.forget();
    }

    fn resize_canvas(&self, canvas: &Element, width: u32, height: u32) {
        if let Some(canvas) = canvas.dyn_ref::<HtmlCanvasElement>() {
            canvas.set_width(width);
            canvas.set_height(height);
        }
    }

    fn paint(&self, canvas: &Element, ops: &[DrawOp]) -> Result<(), HostError> {
        let canvas = canvas
            .dyn_ref::<HtmlCanvasElement>()
            .ok_or_else(|| HostError::new("paint target is not a canvas"))?;
        let ctx = canvas
            .get_context("2d")
            .map_err(|e| js_error(&e))?
            .ok_or_else(|| HostError::new("2d context unavailable"))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| HostError::new("unexpected context type"))?;
        for op in ops {
            draw(&ctx, op).map_err(|e| js_error(&e))?;
        }
        Ok(())
    }

    fn load_timing(&self) -> Option<LoadTiming> {
        let nav = self.navigation_timing()?;
        if nav.load_event_end() <= 0.0 {
            return None;
        }
        Some(LoadTiming {
            load_time: nav.load_event_end() - nav.load_event_start(),
            dom_content_loaded: nav.dom_content_loaded_event_end()
                - nav.dom_content_loaded_event_start(),
            total_load_time: nav.load_event_end(),
            first_paint: self.paint_time("first-paint"),
            first_contentful_paint: self.paint_time("first-contentful-paint"),
        })
    }

    fn memory_usage(&self) -> Option<MemoryUsage> {
        let performance = self.window.performance()?;
        let memory = js_sys::Reflect::get(&performance, &JsValue::from_str("memory")).ok()?;
        if !memory.is_object() {
            return None;
        }
        Some(MemoryUsage {
            used: reflect_f64(&memory, "usedJSHeapSize"),
            total: reflect_f64(&memory, "totalJSHeapSize"),
            limit: reflect_f64(&memory, "jsHeapSizeLimit"),
        })
    }

    fn storage_get(&self, key: &str) -> Result<Option<String>, HostError> {
        self.storage()?.get_item(key).map_err(|e| js_error(&e))
    }

    fn storage_set(&self, key: &str, value: &str) -> Result<(), HostError> {
        self.storage()?.set_item(key, value).map_err(|e| js_error(&e))
    }

    fn storage_remove(&self, key: &str) -> Result<(), HostError> {
        self.storage()?.remove_item(key).map_err(|e| js_error(&e))
    }
}
