//! Automation settings read by the engine at the start of every run.

use serde::{Deserialize, Serialize};

use crate::geometry::Region;

/// Timing and perception defaults shared by every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Confidence threshold used when a perception step sets none.
    pub default_confidence: f32,
    /// Post-step delay used when a step sets no `delay_after_ms`.
    pub default_delay_ms: u64,
    /// Symmetric jitter applied to post-step delays.
    pub random_delay_variation_ms: u64,
    /// Key bound to the emergency stop by the hosting application.
    pub emergency_stop_key: String,
    pub highlight_matches: bool,
    pub capture_region: Option<Region>,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            default_confidence: 0.9,
            default_delay_ms: 100,
            random_delay_variation_ms: 50,
            emergency_stop_key: "F12".to_string(),
            highlight_matches: true,
            capture_region: None,
        }
    }
}
