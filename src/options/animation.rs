use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Animation", inline)]
#[serde(default)]
/// Continuous and entrance effects.
pub struct AnimationOptions {
    /// Hero offset per scrolled pixel.
    #[schemars(title = "Parallax Factor", range(min = -1.0, max = 0.0), extend("step" = 0.01))]
    pub parallax_factor: f64,
    /// How long the loading overlay stays before fading.
    #[schemars(title = "Overlay Duration (ms)", range(min = 0, max = 5000))]
    pub overlay_ms: u64,
    /// Overlay fade-out duration.
    #[schemars(skip)]
    pub overlay_fade_ms: u64,
    /// Delay between successive section `loaded` marks.
    #[schemars(skip)]
    pub section_stagger_ms: u64,
    /// Hero heading typewriter.
    pub typewriter: TypewriterOptions,
    /// Node-graph background canvas.
    pub node_graph: NodeGraphOptions,
    /// Cursor follower.
    pub cursor: CursorOptions,
}

impl Default for AnimationOptions {
    fn default() -> Self {
        Self {
            parallax_factor: -0.15,
            overlay_ms: 1000,
            overlay_fade_ms: 500,
            section_stagger_ms: 100,
            typewriter: TypewriterOptions::default(),
            node_graph: NodeGraphOptions::default(),
            cursor: CursorOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Typewriter", inline)]
#[serde(default)]
/// Hero heading typewriter settings.
pub struct TypewriterOptions {
    /// Run the effect at all.
    #[schemars(title = "Enabled")]
    pub enabled: bool,
    /// Full heading text.
    #[schemars(title = "Text")]
    pub text: String,
    /// Words wrapped in `span.highlight` once fully typed.
    #[schemars(title = "Highlighted Words")]
    pub highlights: Vec<String>,
    /// Word followed by a line break.
    #[schemars(skip)]
    pub break_after: String,
    /// Delay between characters.
    #[schemars(title = "Character Delay (ms)", range(min = 10, max = 500))]
    pub char_delay_ms: u64,
    /// Delay before the first character.
    #[schemars(skip)]
    pub start_delay_ms: u64,
}

impl Default for TypewriterOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            text: "Transforming Visions into Intuitive Digital Realities".into(),
            highlights: ["Visions", "Intuitive", "Digital", "Realities"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            break_after: "into".into(),
            char_delay_ms: 80,
            start_delay_ms: 800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Node Graph", inline)]
#[serde(default)]
/// Node-graph background settings.
pub struct NodeGraphOptions {
    /// Run the effect at all.
    #[schemars(title = "Enabled")]
    pub enabled: bool,
    /// Particles on viewports up to 768 px wide.
    #[schemars(title = "Mobile Particles", range(min = 0, max = 200))]
    pub mobile_particles: usize,
    /// Particles on wider viewports.
    #[schemars(title = "Desktop Particles", range(min = 0, max = 400))]
    pub desktop_particles: usize,
    /// Pairs closer than this are connected.
    #[schemars(title = "Link Distance", range(min = 10.0, max = 400.0))]
    pub max_distance: f32,
    /// Velocity components are drawn from `[-speed / 2, speed / 2)`.
    #[schemars(skip)]
    pub speed: f32,
    /// Node and link color as `#rrggbb`.
    #[schemars(title = "Color")]
    pub color: String,
}

impl Default for NodeGraphOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            mobile_particles: 25,
            desktop_particles: 50,
            max_distance: 120.0,
            speed: 0.5,
            color: "#fff3a0".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Cursor", inline)]
#[serde(default)]
/// Cursor follower settings.
pub struct CursorOptions {
    /// Run the effect at all.
    #[schemars(title = "Enabled")]
    pub enabled: bool,
    /// Outer marker closes `1 / smoothing` of the gap per frame.
    #[schemars(title = "Smoothing", range(min = 1.0, max = 30.0), extend("step" = 0.5))]
    pub smoothing: f32,
    /// Pull the outer marker toward hovered links and buttons.
    #[schemars(title = "Magnetic Hover")]
    pub magnetic: bool,
    /// Fraction of the way from pointer to element center the target moves
    /// while hovering.
    #[schemars(skip)]
    pub magnetic_strength: f32,
}

impl Default for CursorOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            smoothing: 8.0,
            magnetic: true,
            magnetic_strength: 0.3,
        }
    }
}
