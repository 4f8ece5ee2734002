// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Viewer configuration, display settings and keyboard shortcuts

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunable constants of the viewer
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use ifc_lite_inspector::ViewerConfig;
///
/// let config = ViewerConfig::from_json(r#"{ "fov_degrees": 60.0 }"#).unwrap();
/// assert_eq!(config.fov_degrees, 60.0);
/// assert_eq!(config.animation_ms, 1000);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Vertical field of view of the perspective camera
    pub fov_degrees: f64,
    pub near: f64,
    pub far: f64,
    /// Half-height of the orthographic camera before any model is fitted
    pub ortho_size: f64,
    /// Multiplier on the fitted camera distance
    pub fit_padding: f64,
    /// Orthographic half-height as a multiple of the largest model dimension
    pub ortho_extent_factor: f64,
    /// Default camera transition length
    pub animation_ms: u64,
    /// Section plane offsets are clamped to `-range..=range`
    pub section_range: f64,
    pub retry: RetryPolicy,
    /// Tint blended into highlighted meshes
    pub highlight_color: [f32; 4],
    /// Blend factor of the highlight tint
    pub highlight_intensity: f32,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub settings: ViewerSettings,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            ortho_size: 10.0,
            fit_padding: 1.5,
            ortho_extent_factor: 1.2,
            animation_ms: 1000,
            section_range: 100.0,
            retry: RetryPolicy::default(),
            highlight_color: [0.0, 1.0, 0.0, 1.0],
            highlight_intensity: 0.3,
            viewport_width: 1280,
            viewport_height: 720,
            settings: ViewerSettings::default(),
        }
    }
}

impl ViewerConfig {
    /// Parse a (possibly partial) JSON configuration
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn animation_duration(&self) -> Duration {
        Duration::from_millis(self.animation_ms)
    }
}

/// Bounded exponential backoff for URL loads
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): `2^attempt * base`
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Display toggles owned by the viewer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    pub show_grid: bool,
    pub show_axes: bool,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            show_grid: true,
            show_axes: true,
        }
    }
}

/// Keyboard shortcut actions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shortcut {
    View3d,
    ViewPlan,
    ViewSection,
    ViewElevation,
    ResetView,
    ToggleGrid,
    ToggleAxes,
}

impl Shortcut {
    /// Map a key name as reported by the host
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "1" => Some(Shortcut::View3d),
            "2" => Some(Shortcut::ViewPlan),
            "3" => Some(Shortcut::ViewSection),
            "4" => Some(Shortcut::ViewElevation),
            "r" | "R" => Some(Shortcut::ResetView),
            "g" | "G" => Some(Shortcut::ToggleGrid),
            "a" | "A" => Some(Shortcut::ToggleAxes),
            _ => None,
        }
    }
}
