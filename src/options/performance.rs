use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Performance", inline)]
#[serde(default)]
/// Monitoring thresholds and mitigation switches.
pub struct PerformanceOptions {
    /// Frames per second below which animations are stripped.
    #[schemars(title = "Low FPS Threshold", range(min = 1, max = 120))]
    pub low_fps: u32,
    /// Interval between heap checks.
    #[schemars(skip)]
    pub memory_interval_ms: u64,
    /// Heap usage percentage that triggers a warning.
    #[schemars(title = "Memory Warning (%)", range(min = 1.0, max = 100.0))]
    pub memory_warn_percent: f64,
    /// Total load time above which transitions are shortened.
    #[schemars(title = "Slow Load (ms)", range(min = 0.0, max = 10000.0))]
    pub slow_load_ms: f64,
    /// Load event duration above which images load lazily.
    #[schemars(skip)]
    pub lazy_load_ms: f64,
    /// Delay after `load` before timing is analyzed.
    #[schemars(skip)]
    pub analyze_delay_ms: u64,
    /// Remember a low-FPS degradation across visits.
    #[schemars(title = "Remember Degradation")]
    pub remember_degraded: bool,
}

impl Default for PerformanceOptions {
    fn default() -> Self {
        Self {
            low_fps: 30,
            memory_interval_ms: 10_000,
            memory_warn_percent: 80.0,
            slow_load_ms: 2000.0,
            lazy_load_ms: 1000.0,
            analyze_delay_ms: 100,
            remember_degraded: true,
        }
    }
}
