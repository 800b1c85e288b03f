use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Lifecycle", inline)]
#[serde(default)]
/// Startup ordering and coordinator-level handler timings.
pub struct LifecycleOptions {
    /// Delay between core-manager init and animation init.
    #[schemars(title = "Animation Init Delay (ms)", range(min = 0, max = 2000))]
    pub animation_delay_ms: u64,
    /// Quiet period before a resize is fanned out to the managers.
    #[schemars(title = "Resize Debounce (ms)", range(min = 0, max = 2000))]
    pub resize_debounce_ms: u64,
    /// Run the performance/accessibility manager.
    #[schemars(title = "Performance Monitoring")]
    pub monitor_performance: bool,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            animation_delay_ms: 100,
            resize_debounce_ms: 250,
            monitor_performance: true,
        }
    }
}
