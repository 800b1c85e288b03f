use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::host::WatchOptions;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Observation", inline)]
#[serde(default)]
/// Viewport watchers and the active-section rule.
pub struct ObservationOptions {
    /// Visible fraction that reveals a section.
    #[schemars(title = "Reveal Threshold", range(min = 0.0, max = 1.0))]
    pub reveal_threshold: f64,
    /// Root margin of the section reveal watcher.
    #[schemars(skip)]
    pub reveal_margin: String,
    /// Visible fraction that reveals a card.
    #[schemars(title = "Content Threshold", range(min = 0.0, max = 1.0))]
    pub content_threshold: f64,
    /// Visible fraction that starts a lazy image load.
    #[schemars(skip)]
    pub lazy_threshold: f64,
    /// Root margin of the lazy image watcher.
    #[schemars(skip)]
    pub lazy_margin: String,
    /// Image shown when a lazy source fails to load.
    #[schemars(title = "Placeholder Image")]
    pub placeholder: String,
    /// Fade applied while a lazy source is swapped.
    #[schemars(skip)]
    pub lazy_fade_ms: u64,
    /// Header offset added to `scrollY` for the active-section reference position.
    #[schemars(skip)]
    pub active_offset: f64,
    /// How far above a section's top the reference position still counts as inside it.
    #[schemars(skip)]
    pub active_lead: f64,
    /// Below this scroll position the first section is the fallback.
    #[schemars(skip)]
    pub active_top_zone: f64,
    /// Throttle of the active-link handler.
    #[schemars(skip)]
    pub active_throttle_ms: u64,
}

impl Default for ObservationOptions {
    fn default() -> Self {
        Self {
            reveal_threshold: 0.1,
            reveal_margin: "0px 0px -50px 0px".into(),
            content_threshold: 0.2,
            lazy_threshold: 0.1,
            lazy_margin: "50px 0px".into(),
            placeholder: "/img/placeholder.jpg".into(),
            lazy_fade_ms: 150,
            active_offset: 100.0,
            active_lead: 150.0,
            active_top_zone: 50.0,
            active_throttle_ms: 16,
        }
    }
}

impl ObservationOptions {
    /// Watch options for section reveal.
    #[must_use]
    pub fn reveal_watch(&self) -> WatchOptions {
        WatchOptions::new(self.reveal_threshold, &self.reveal_margin)
    }

    /// Watch options for card reveal.
    #[must_use]
    pub fn content_watch(&self) -> WatchOptions {
        WatchOptions::new(self.content_threshold, &self.reveal_margin)
    }

    /// Watch options for lazy images.
    #[must_use]
    pub fn lazy_watch(&self) -> WatchOptions {
        WatchOptions::new(self.lazy_threshold, &self.lazy_margin)
    }
}
