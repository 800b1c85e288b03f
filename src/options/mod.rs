//! Centralized behavior options with TOML override support.
//!
//! Every tunable timing, threshold and effect toggle lives here. A page can
//! override any subset by embedding a
//! `<script type="application/toml" id="folio-options">` block; all
//! sub-structs use `#[serde(default)]` so partial documents work.

mod animation;
mod lifecycle;
mod navigation;
mod observation;
mod performance;

use std::path::Path;

pub use animation::{
    AnimationOptions, CursorOptions, NodeGraphOptions, TypewriterOptions,
};
pub use lifecycle::LifecycleOptions;
pub use navigation::NavigationOptions;
pub use observation::ObservationOptions;
pub use performance::PerformanceOptions;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::FolioError;
use crate::host::Host;

/// Id of the inline options element.
pub const OPTIONS_ELEMENT_ID: &str = "folio-options";

/// Top-level options container.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema,
)]
#[serde(default)]
pub struct Options {
    /// Startup ordering and global handler timings.
    pub lifecycle: LifecycleOptions,
    /// Drawer, smooth-scroll, header and back-to-top behavior.
    pub navigation: NavigationOptions,
    /// Reveal, active-link and lazy-image watchers.
    pub observation: ObservationOptions,
    /// Continuous and entrance effects.
    pub animation: AnimationOptions,
    /// Monitoring thresholds and mitigations.
    pub performance: PerformanceOptions,
}

impl Options {
    /// Generate JSON Schema describing the options document.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Options)
    }

    /// Parse a TOML document. Missing fields use defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, FolioError> {
        toml::from_str(content)
            .map_err(|e| FolioError::OptionsParse(e.to_string()))
    }

    /// Serialize to pretty TOML.
    pub fn to_toml_string(&self) -> Result<String, FolioError> {
        toml::to_string_pretty(self)
            .map_err(|e| FolioError::OptionsParse(e.to_string()))
    }

    /// Load options from a TOML file.
    pub fn load(path: &Path) -> Result<Self, FolioError> {
        let content = std::fs::read_to_string(path).map_err(FolioError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Save options to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), FolioError> {
        let content = self.to_toml_string()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(FolioError::Io)?;
        }
        std::fs::write(path, content).map_err(FolioError::Io)
    }

    /// Read overrides from the page's inline options element, falling back
    /// to defaults when it is absent or malformed.
    pub fn from_document<H: Host>(host: &H) -> Self {
        let selector = format!("#{OPTIONS_ELEMENT_ID}");
        let Some(node) = host.select(&selector) else {
            return Self::default();
        };
        match Self::from_toml_str(&host.text(&node)) {
            Ok(options) => {
                log::debug!("Loaded inline options");
                options
            }
            Err(e) => {
                log::warn!("Ignoring inline options: {e}");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    #[test]
    fn default_round_trips_through_toml() {
        let opts = Options::default();
        let toml_str = opts.to_toml_string().unwrap();
        let parsed = Options::from_toml_str(&toml_str).unwrap();
        assert_eq!(opts, parsed);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r"
[animation.cursor]
smoothing = 4.0

[navigation]
scroll_progress = true
";
        let opts = Options::from_toml_str(toml_str).unwrap();
        assert_eq!(opts.animation.cursor.smoothing, 4.0);
        assert!(opts.navigation.scroll_progress);
        assert_eq!(opts.animation.typewriter.char_delay_ms, 80);
        assert_eq!(opts.observation.placeholder, "/img/placeholder.jpg");
        assert_eq!(opts.lifecycle.resize_debounce_ms, 250);
    }

    #[test]
    fn malformed_toml_is_an_options_error() {
        let err = Options::from_toml_str("[navigation\nheader_offset = ").unwrap_err();
        assert!(matches!(err, FolioError::OptionsParse(_)));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets").join("calm.toml");
        let mut opts = Options::default();
        opts.animation.parallax_factor = -0.05;
        opts.save(&path).unwrap();
        assert_eq!(Options::load(&path).unwrap(), opts);
    }

    #[test]
    fn reads_inline_options_element() {
        let host = MemoryHost::from_html(
            "<script type=\"application/toml\" id=\"folio-options\">\
             [animation.node_graph]\nenabled = false\n</script>",
        );
        let opts = Options::from_document(&host);
        assert!(!opts.animation.node_graph.enabled);

        let empty = MemoryHost::new();
        assert_eq!(Options::from_document(&empty), Options::default());
    }

    #[test]
    fn schema_lists_every_section() {
        let schema = serde_json::to_value(Options::json_schema()).unwrap();
        let props = schema["properties"].as_object().unwrap();
        for section in
            ["lifecycle", "navigation", "observation", "animation", "performance"]
        {
            assert!(props.contains_key(section), "missing {section}");
        }
    }
}
