use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Navigation", inline)]
#[serde(default)]
/// Drawer, anchor scrolling, header and back-to-top behavior.
pub struct NavigationOptions {
    /// Fixed header height subtracted from anchor targets.
    #[schemars(title = "Header Offset", range(min = 0.0, max = 300.0))]
    pub header_offset: f64,
    /// Scroll position past which the header gets `scrolled`.
    #[schemars(title = "Header Scrolled Threshold", range(min = 0.0, max = 500.0))]
    pub header_threshold: f64,
    /// Throttle of the header scroll handler.
    #[schemars(skip)]
    pub header_throttle_ms: u64,
    /// Throttle of the back-to-top visibility handler.
    #[schemars(skip)]
    pub back_to_top_throttle_ms: u64,
    /// How long body scroll stays locked during a smooth scroll.
    #[schemars(title = "Scroll Lock (ms)", range(min = 0, max = 3000))]
    pub scroll_lock_ms: u64,
    /// How long a scroll target keeps its temporary `tabindex`.
    #[schemars(skip)]
    pub focus_tabindex_ms: u64,
    /// Delay before the first drawer link receives focus.
    #[schemars(skip)]
    pub drawer_focus_delay_ms: u64,
    /// Lifetime of a screen-reader announcement node.
    #[schemars(skip)]
    pub announcement_ms: u64,
    /// Inject a reading-progress bar under the header.
    #[schemars(title = "Scroll Progress Bar")]
    pub scroll_progress: bool,
    /// Alt+key section shortcuts (key → section id).
    #[schemars(skip)]
    pub shortcuts: BTreeMap<String, String>,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        let shortcuts = [
            ("h", "hero"),
            ("a", "about"),
            ("p", "projects"),
            ("c", "contact"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
        Self {
            header_offset: 80.0,
            header_threshold: 50.0,
            header_throttle_ms: 10,
            back_to_top_throttle_ms: 100,
            scroll_lock_ms: 1000,
            focus_tabindex_ms: 1000,
            drawer_focus_delay_ms: 100,
            announcement_ms: 1000,
            scroll_progress: false,
            shortcuts,
        }
    }
}

impl NavigationOptions {
    /// Section id bound to an Alt+`key` shortcut.
    #[must_use]
    pub fn shortcut(&self, key: &str) -> Option<&str> {
        self.shortcuts
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }
}
