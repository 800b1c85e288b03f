//! Platform seam between the managers and the document they drive.
//!
//! Every manager talks to the page exclusively through the [`Host`] trait:
//! element lookup, class/style mutation, listeners, timers, animation
//! frames, viewport-intersection watchers and canvas painting. Two
//! implementations exist:
//!
//! - [`MemoryHost`]: a headless arena document with a manual clock. All
//!   tests run against it.
//! - `WebHost` (feature `web`): the browser, via `web-sys`.
//!
//! Apart from [`Host::activate`], hosts never invoke a callback
//! synchronously from inside one of their own methods. Callbacks run from
//! the event loop (or, for [`MemoryHost`], from its explicit driver
//! methods), so managers may freely call back into the host while handling
//! an event.

pub mod memory;
pub(crate) mod selector;
#[cfg(feature = "web")]
pub mod web;

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use glam::Vec2;
pub use memory::MemoryHost;
use serde::Serialize;
use web_time::Duration;

/// Error raised by a host operation (DOM exception, missing API, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError(pub String);

impl HostError {
    /// Error with the given message.
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for HostError {}

macro_rules! handle_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
    };
}

handle_id!(
    /// Handle of a registered event listener.
    ListenerId
);
handle_id!(
    /// Handle of a pending one-shot timer.
    TimerId
);
handle_id!(
    /// Handle of a pending animation-frame callback.
    FrameId
);
handle_id!(
    /// Handle of a viewport-intersection watcher.
    WatcherId
);

/// Where a listener is attached.
#[derive(Debug, Clone, PartialEq)]
pub enum EventTarget<N> {
    /// The global window.
    Window,
    /// The document object.
    Document,
    /// A specific element.
    Node(N),
}

/// DOM event types the managers subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `click`
    Click,
    /// `keydown`
    KeyDown,
    /// `scroll`
    Scroll,
    /// `resize`
    Resize,
    /// `mousemove`
    MouseMove,
    /// `mouseenter`
    MouseEnter,
    /// `mouseleave`
    MouseLeave,
    /// `visibilitychange`
    VisibilityChange,
    /// `beforeunload`
    BeforeUnload,
    /// `error`
    Error,
    /// `unhandledrejection`
    UnhandledRejection,
    /// `DOMContentLoaded`
    DomContentLoaded,
    /// `load`
    Load,
}

impl EventKind {
    /// The DOM event type string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::KeyDown => "keydown",
            Self::Scroll => "scroll",
            Self::Resize => "resize",
            Self::MouseMove => "mousemove",
            Self::MouseEnter => "mouseenter",
            Self::MouseLeave => "mouseleave",
            Self::VisibilityChange => "visibilitychange",
            Self::BeforeUnload => "beforeunload",
            Self::Error => "error",
            Self::UnhandledRejection => "unhandledrejection",
            Self::DomContentLoaded => "DOMContentLoaded",
            Self::Load => "load",
        }
    }

    /// Whether the listener should be registered as passive.
    #[must_use]
    pub const fn is_passive(self) -> bool {
        matches!(self, Self::Scroll | Self::Resize | Self::MouseMove)
    }
}

/// Platform-agnostic view of a dispatched DOM event.
#[derive(Debug, Clone)]
pub struct DomEvent<N> {
    /// Event type.
    pub kind: EventKind,
    /// Element the event originated from, if any.
    pub target: Option<N>,
    /// `KeyboardEvent.key` for key events.
    pub key: Option<String>,
    /// Whether Alt was held.
    pub alt_key: bool,
    /// Whether Shift was held.
    pub shift_key: bool,
    /// Pointer position in page coordinates for mouse events.
    pub pointer: Option<Vec2>,
    /// Error message / rejection reason for error events.
    pub message: Option<String>,
    default_prevented: Cell<bool>,
}

impl<N> DomEvent<N> {
    /// Bare event of the given kind.
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            target: None,
            key: None,
            alt_key: false,
            shift_key: false,
            pointer: None,
            message: None,
            default_prevented: Cell::new(false),
        }
    }

    /// Set the originating element.
    #[must_use]
    pub fn with_target(mut self, target: N) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the key and modifier state.
    #[must_use]
    pub fn with_key(mut self, key: &str, alt: bool, shift: bool) -> Self {
        self.key = Some(key.to_owned());
        self.alt_key = alt;
        self.shift_key = shift;
        self
    }

    /// Set the pointer position.
    #[must_use]
    pub fn with_pointer(mut self, x: f32, y: f32) -> Self {
        self.pointer = Some(Vec2::new(x, y));
        self
    }

    /// Set the error message.
    #[must_use]
    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_owned());
        self
    }

    /// Suppress the browser's default action.
    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    /// Whether a handler called [`prevent_default`](Self::prevent_default).
    #[must_use]
    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    /// Whether the event's key equals `key`.
    #[must_use]
    pub fn is_key(&self, key: &str) -> bool {
        self.key.as_deref() == Some(key)
    }
}

/// Event listener callback.
pub type Handler<N> = Rc<dyn Fn(&DomEvent<N>)>;

/// Intersection watcher callback; receives its own watcher handle so it can
/// unobserve targets it is done with.
pub type WatchCallback<N> = Rc<dyn Fn(WatcherId, &[Intersection<N>])>;

/// One intersection change reported to a watcher.
#[derive(Debug, Clone, PartialEq)]
pub struct Intersection<N> {
    /// The watched element.
    pub target: N,
    /// Whether it now intersects the (margin-adjusted) viewport.
    pub is_intersecting: bool,
}

/// Options for a viewport-intersection watcher.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchOptions {
    /// Visible fraction that triggers the callback.
    pub threshold: f64,
    /// CSS margin applied to the root viewport.
    pub root_margin: String,
}

impl WatchOptions {
    /// Options with the given threshold and root margin.
    #[must_use]
    pub fn new(threshold: f64, root_margin: &str) -> Self {
        Self {
            threshold,
            root_margin: root_margin.to_owned(),
        }
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self::new(0.1, "0px")
    }
}

/// Optional browser capabilities with a documented fallback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `IntersectionObserver`.
    IntersectionObserver,
    /// CSS custom properties (`CSS.supports('color', 'var(--x)')`).
    CustomProperties,
    /// `performance.memory`.
    MemoryInfo,
}

/// Viewport size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// `innerWidth`
    pub width: f64,
    /// `innerHeight`
    pub height: f64,
}

/// Element rectangle relative to the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Rect {
    /// Center point.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.x + self.width / 2.0) as f32,
            (self.y + self.height / 2.0) as f32,
        )
    }
}

/// Navigation timing of the current page load, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTiming {
    /// `loadEventEnd - loadEventStart`
    pub load_time: f64,
    /// `domContentLoadedEventEnd - domContentLoadedEventStart`
    pub dom_content_loaded: f64,
    /// `loadEventEnd` relative to navigation start.
    pub total_load_time: f64,
    /// `first-paint` start time.
    pub first_paint: Option<f64>,
    /// `first-contentful-paint` start time.
    pub first_contentful_paint: Option<f64>,
}

/// JS heap usage snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryUsage {
    /// `usedJSHeapSize`
    pub used: f64,
    /// `totalJSHeapSize`
    pub total: f64,
    /// `jsHeapSizeLimit`
    pub limit: f64,
}

impl MemoryUsage {
    /// Used heap as a percentage of the limit.
    #[must_use]
    pub fn usage_percent(&self) -> f64 {
        if self.limit <= 0.0 {
            0.0
        } else {
            self.used / self.limit * 100.0
        }
    }
}

/// 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// `#rrggbb`
    #[must_use]
    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    /// `rgba(r, g, b, a)`
    #[must_use]
    pub fn rgba(self, alpha: f32) -> String {
        format!("rgba({}, {}, {}, {alpha})", self.0, self.1, self.2)
    }
}

/// A single 2D canvas drawing command.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Clear the whole surface.
    Clear {
        /// Surface width.
        width: f32,
        /// Surface height.
        height: f32,
    },
    /// Filled circle.
    Circle {
        /// Center.
        center: Vec2,
        /// Radius.
        radius: f32,
        /// Fill color.
        color: Rgb,
    },
    /// Stroked line segment.
    Line {
        /// Start point.
        from: Vec2,
        /// End point.
        to: Vec2,
        /// Stroke color.
        color: Rgb,
        /// Stroke opacity.
        alpha: f32,
        /// Stroke width.
        width: f32,
    },
}

/// Everything the behavior layer needs from a document.
///
/// Node handles are cheap to clone and compare by identity. Operations on a
/// node that has been removed from the document are no-ops.
pub trait Host: 'static {
    /// Element handle.
    type Node: Clone + PartialEq + fmt::Debug + 'static;

    // -- Structure ---------------------------------------------------------

    /// First element matching `selector`.
    fn select(&self, selector: &str) -> Option<Self::Node>;
    /// All elements matching `selector`, in document order.
    fn select_all(&self, selector: &str) -> Vec<Self::Node>;
    /// Descendants of `scope` matching `selector`, in document order.
    fn select_within(&self, scope: &Self::Node, selector: &str)
        -> Vec<Self::Node>;
    /// Closest inclusive ancestor of `node` matching `selector`.
    fn closest(&self, node: &Self::Node, selector: &str) -> Option<Self::Node>;
    /// `document.body`.
    fn body(&self) -> Option<Self::Node>;
    /// Upper-case tag name.
    fn tag_name(&self, node: &Self::Node) -> String;
    /// Create a detached element.
    fn create_element(&self, tag: &str) -> Result<Self::Node, HostError>;
    /// Append `child` as the last child of `parent`.
    fn append_child(
        &self,
        parent: &Self::Node,
        child: &Self::Node,
    ) -> Result<(), HostError>;
    /// Detach `node` from its parent.
    fn remove(&self, node: &Self::Node);
    /// Whether `node` is attached to the document.
    fn is_connected(&self, node: &Self::Node) -> bool;
    /// `textContent`
    fn text(&self, node: &Self::Node) -> String;
    /// Replace children with a text node.
    fn set_text(&self, node: &Self::Node, text: &str);
    /// Replace children with parsed markup.
    fn set_inner_html(&self, node: &Self::Node, html: &str);

    // -- Classes, attributes, styles --------------------------------------

    /// Add a class.
    fn add_class(&self, node: &Self::Node, class: &str);
    /// Remove a class.
    fn remove_class(&self, node: &Self::Node, class: &str);
    /// Whether the class is present.
    fn has_class(&self, node: &Self::Node, class: &str) -> bool;
    /// Attribute value.
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
    /// Set an attribute.
    fn set_attribute(&self, node: &Self::Node, name: &str, value: &str);
    /// Remove an attribute.
    fn remove_attribute(&self, node: &Self::Node, name: &str);
    /// Set an inline style property (empty value removes it).
    fn set_style(&self, node: &Self::Node, property: &str, value: &str);
    /// Set a custom property on the document element.
    fn set_root_property(&self, name: &str, value: &str);

    // -- Layout and scrolling ---------------------------------------------

    /// `offsetTop`
    fn offset_top(&self, node: &Self::Node) -> f64;
    /// `offsetHeight`
    fn offset_height(&self, node: &Self::Node) -> f64;
    /// `getBoundingClientRect()`
    fn client_rect(&self, node: &Self::Node) -> Rect;
    /// `window.scrollY`
    fn scroll_y(&self) -> f64;
    /// `document.documentElement.scrollHeight`
    fn document_height(&self) -> f64;
    /// Viewport size.
    fn viewport(&self) -> Viewport;
    /// Scroll the window vertically.
    fn scroll_to(&self, top: f64, smooth: bool);

    // -- Focus ------------------------------------------------------------

    /// Move keyboard focus.
    fn focus(&self, node: &Self::Node);
    /// `document.activeElement`
    fn active_element(&self) -> Option<Self::Node>;
    /// `HTMLElement.click()`: dispatch a click at `node` synchronously.
    fn activate(&self, node: &Self::Node);

    // -- Document state ---------------------------------------------------

    /// Whether `document.readyState` is still `loading`.
    fn is_loading(&self) -> bool;
    /// Whether `document.hidden` is set.
    fn is_hidden(&self) -> bool;
    /// `location.pathname`
    fn location_path(&self) -> String;
    /// `location.search`, including the leading `?` if any.
    fn location_query(&self) -> String;
    /// `matchMedia(query).matches`
    fn matches_media(&self, query: &str) -> bool;
    /// Whether an optional capability is present.
    fn supports(&self, capability: Capability) -> bool;

    // -- Events -----------------------------------------------------------

    /// Register a listener.
    fn listen(
        &self,
        target: &EventTarget<Self::Node>,
        kind: EventKind,
        handler: Handler<Self::Node>,
    ) -> ListenerId;
    /// Remove a listener. Unknown handles are ignored.
    fn unlisten(&self, id: ListenerId);
    /// Dispatch a `CustomEvent` with a JSON detail on the document.
    fn dispatch_custom(&self, name: &str, detail: &serde_json::Value);

    // -- Timing -----------------------------------------------------------

    /// Monotonic milliseconds (`performance.now()`).
    fn now(&self) -> f64;
    /// Run `callback` once after `delay`.
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>)
        -> TimerId;
    /// Cancel a pending timer. Unknown handles are ignored.
    fn clear_timeout(&self, id: TimerId);
    /// Run `callback` before the next repaint with the frame timestamp.
    fn request_frame(&self, callback: Box<dyn FnOnce(f64)>) -> FrameId;
    /// Cancel a pending frame callback. Unknown handles are ignored.
    fn cancel_frame(&self, id: FrameId);

    // -- Intersection -----------------------------------------------------

    /// Create a viewport-intersection watcher.
    fn watch(
        &self,
        options: &WatchOptions,
        callback: WatchCallback<Self::Node>,
    ) -> Result<WatcherId, HostError>;
    /// Start watching `node`.
    fn observe(&self, watcher: WatcherId, node: &Self::Node);
    /// Stop watching `node`.
    fn unobserve(&self, watcher: WatcherId, node: &Self::Node);
    /// Stop watching everything and drop the watcher.
    fn disconnect(&self, watcher: WatcherId);

    // -- Media ------------------------------------------------------------

    /// Load `src` into a detached preload image; `done(true)` on success.
    fn preload_image(&self, src: &str, done: Box<dyn FnOnce(bool)>);
    /// Set a canvas' backing-store size.
    fn resize_canvas(&self, canvas: &Self::Node, width: u32, height: u32);
    /// Execute drawing commands on a canvas' 2D context.
    fn paint(&self, canvas: &Self::Node, ops: &[DrawOp])
        -> Result<(), HostError>;

    // -- Performance ------------------------------------------------------

    /// Navigation timing, once the load event has completed.
    fn load_timing(&self) -> Option<LoadTiming>;
    /// Heap usage, where the browser exposes it.
    fn memory_usage(&self) -> Option<MemoryUsage>;

    // -- Storage ----------------------------------------------------------

    /// `localStorage.getItem`
    fn storage_get(&self, key: &str) -> Result<Option<String>, HostError>;
    /// `localStorage.setItem`
    fn storage_set(&self, key: &str, value: &str) -> Result<(), HostError>;
    /// `localStorage.removeItem`
    fn storage_remove(&self, key: &str) -> Result<(), HostError>;
}
