// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Camera and viewport state
//!
//! [`ViewportController`] owns a perspective and an orthographic
//! projection; exactly one is active. View modes other than
//! [`ViewMode::Free`] lock the camera to an axis-aligned orthographic view.
//!
//! World space is Z-up, as in IFC files:
//!
//! | Mode      | Camera looks along | Up |
//! |-----------|--------------------|----|
//! | Free      | (-1, -1, -1)       | +Z |
//! | Plan      | -Z                 | +Y |
//! | Section   | -X                 | +Z |
//! | Elevation | +Y                 | +Z |
//!
//! Transitions are time-based: [`ViewportController::tick`] takes the
//! current instant and derives progress from the elapsed time, so the
//! frame rate does not change the motion.

use crate::bounds::SceneBounds;
use crate::config::ViewerConfig;
use crate::ids::TimestampIds;
use crate::picking::{screen_to_ndc, Ray};
use nalgebra::{Matrix4, Point2, Point3, Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::{Duration, Instant};

/// Active projection type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionKind {
    Perspective,
    Orthographic,
}

/// Viewing mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Orbitable 3D view
    #[default]
    #[serde(rename = "3d")]
    Free,
    Plan,
    Section,
    Elevation,
}

impl ViewMode {
    /// Axis-locked, orthographic-only modes
    pub fn is_locked(&self) -> bool {
        !matches!(self, ViewMode::Free)
    }

    /// Unit vector from the target towards the camera
    pub fn eye_direction(&self) -> Vector3<f64> {
        match self {
            ViewMode::Free => Vector3::new(1.0, 1.0, 1.0).normalize(),
            ViewMode::Plan => Vector3::z(),
            ViewMode::Section => Vector3::x(),
            ViewMode::Elevation => -Vector3::y(),
        }
    }

    pub fn up(&self) -> Vector3<f64> {
        match self {
            ViewMode::Plan => Vector3::y(),
            _ => Vector3::z(),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "3d" | "free" => Some(ViewMode::Free),
            "plan" => Some(ViewMode::Plan),
            "section" => Some(ViewMode::Section),
            "elevation" => Some(ViewMode::Elevation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Free => "3d",
            ViewMode::Plan => "plan",
            ViewMode::Section => "section",
            ViewMode::Elevation => "elevation",
        }
    }
}

/// Eye position and orientation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub position: Point3<f64>,
    pub target: Point3<f64>,
    pub up: Vector3<f64>,
}

impl CameraPose {
    /// Orthonormal `(forward, right, up)` basis
    pub fn basis(&self) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        let forward = (self.target - self.position)
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(|| -Vector3::z());
        let right = forward
            .cross(&self.up)
            .try_normalize(1e-9)
            // Looking along `up`; any perpendicular will do
            .unwrap_or_else(|| forward.cross(&Vector3::y()).normalize());
        let up = right.cross(&forward);
        (forward, right, up)
    }
}

/// A camera projection
///
/// The viewport holds one of each and dispatches through this trait.
pub trait Projection: Debug + Send + Sync {
    fn kind(&self) -> ProjectionKind;

    /// Projection matrix for the renderer
    fn matrix(&self) -> Matrix4<f64>;

    fn set_aspect(&mut self, aspect: f64);

    /// Distance from the target that frames a model of extent `max_dim`
    fn fit_distance(&self, max_dim: f64, padding: f64) -> f64;

    /// Resize the view volume for a model of extent `max_dim`
    fn fit_extent(&mut self, _max_dim: f64) {}

    /// World-space ray through a point in normalized device coordinates
    fn ray(&self, ndc: Point2<f64>, pose: &CameraPose) -> Ray;
}

#[derive(Clone, Debug, PartialEq)]
pub struct PerspectiveProjection {
    /// Vertical field of view in degrees
    pub fov: f64,
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
}

impl PerspectiveProjection {
    fn half_fov_tan(&self) -> f64 {
        (self.fov.to_radians() / 2.0).tan()
    }
}

impl Projection for PerspectiveProjection {
    fn kind(&self) -> ProjectionKind {
        ProjectionKind::Perspective
    }

    fn matrix(&self) -> Matrix4<f64> {
        Matrix4::new_perspective(self.aspect, self.fov.to_radians(), self.near, self.far)
    }

    fn set_aspect(&mut self, aspect: f64) {
        self.aspect = aspect;
    }

    fn fit_distance(&self, max_dim: f64, padding: f64) -> f64 {
        (max_dim / 2.0) / self.half_fov_tan() * padding
    }

    fn ray(&self, ndc: Point2<f64>, pose: &CameraPose) -> Ray {
        let (forward, right, up) = pose.basis();
        let tan = self.half_fov_tan();
        let direction = forward + right * (ndc.x * tan * self.aspect) + up * (ndc.y * tan);
        Ray::new(pose.position, direction)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrthographicProjection {
    /// Half of the visible height, metres
    pub half_height: f64,
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
    /// Half-height as a multiple of the fitted model extent
    pub extent_factor: f64,
}

impl OrthographicProjection {
    pub fn half_width(&self) -> f64 {
        self.half_height * self.aspect
    }
}

impl Projection for OrthographicProjection {
    fn kind(&self) -> ProjectionKind {
        ProjectionKind::Orthographic
    }

    fn matrix(&self) -> Matrix4<f64> {
        let (hw, hh) = (self.half_width(), self.half_height);
        Matrix4::new_orthographic(-hw, hw, -hh, hh, self.near, self.far)
    }

    fn set_aspect(&mut self, aspect: f64) {
        self.aspect = aspect;
    }

    fn fit_distance(&self, max_dim: f64, padding: f64) -> f64 {
        max_dim * padding
    }

    fn fit_extent(&mut self, max_dim: f64) {
        self.half_height = max_dim * self.extent_factor;
    }

    fn ray(&self, ndc: Point2<f64>, pose: &CameraPose) -> Ray {
        let (forward, right, up) = pose.basis();
        let origin =
            pose.position + right * (ndc.x * self.half_width()) + up * (ndc.y * self.half_height);
        Ray::new(origin, forward)
    }
}

/// Serializable camera snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub projection: ProjectionKind,
    pub view_mode: ViewMode,
    pub position: Point3<f64>,
    pub target: Point3<f64>,
    pub up: Vector3<f64>,
    /// Orthographic half-height
    pub half_height: f64,
}

/// Named camera snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedView {
    pub id: String,
    pub name: String,
    pub camera: CameraState,
}

/// In-flight camera transition
#[derive(Clone, Debug)]
struct CameraAnimation {
    from_position: Point3<f64>,
    from_target: Point3<f64>,
    to_position: Point3<f64>,
    to_target: Point3<f64>,
    /// Applied when the transition lands
    to_up: Option<Vector3<f64>>,
    start: Instant,
    duration: Duration,
}

/// Cubic ease-in-out on `0..=1`
pub fn ease_in_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Camera controller of one viewport
#[derive(Debug)]
pub struct ViewportController {
    perspective: PerspectiveProjection,
    orthographic: OrthographicProjection,
    active: ProjectionKind,
    view_mode: ViewMode,
    pose: CameraPose,
    rotation_enabled: bool,
    width: u32,
    height: u32,
    fit_padding: f64,
    default_duration: Duration,
    animation: Option<CameraAnimation>,
    bounds: Option<SceneBounds>,
    saved_views: Vec<SavedView>,
    ids: TimestampIds,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new(&ViewerConfig::default())
    }
}

impl ViewportController {
    pub fn new(config: &ViewerConfig) -> Self {
        let aspect = aspect_ratio(config.viewport_width, config.viewport_height);
        let mut controller = Self {
            perspective: PerspectiveProjection {
                fov: config.fov_degrees,
                aspect,
                near: config.near,
                far: config.far,
            },
            orthographic: OrthographicProjection {
                half_height: config.ortho_size,
                aspect,
                near: config.near,
                far: config.far,
                extent_factor: config.ortho_extent_factor,
            },
            active: ProjectionKind::Perspective,
            view_mode: ViewMode::Free,
            pose: CameraPose {
                position: Point3::new(10.0, 10.0, 10.0),
                target: Point3::origin(),
                up: Vector3::z(),
            },
            rotation_enabled: true,
            width: config.viewport_width.max(1),
            height: config.viewport_height.max(1),
            fit_padding: config.fit_padding,
            default_duration: config.animation_duration(),
            animation: None,
            bounds: None,
            saved_views: Vec::new(),
            ids: TimestampIds::default(),
        };
        controller.fit_to_bounds(&SceneBounds::default());
        controller.bounds = None;
        controller.orthographic.half_height = config.ortho_size;
        controller
    }

    // ------------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------------

    /// The active projection
    pub fn projection(&self) -> &dyn Projection {
        match self.active {
            ProjectionKind::Perspective => &self.perspective,
            ProjectionKind::Orthographic => &self.orthographic,
        }
    }

    pub fn projection_kind(&self) -> ProjectionKind {
        self.active
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn rotation_enabled(&self) -> bool {
        self.rotation_enabled
    }

    pub fn pose(&self) -> &CameraPose {
        &self.pose
    }

    pub fn position(&self) -> Point3<f64> {
        self.pose.position
    }

    pub fn target(&self) -> Point3<f64> {
        self.pose.target
    }

    /// Unit vector the camera looks along
    pub fn look_direction(&self) -> Vector3<f64> {
        self.pose.basis().0
    }

    pub fn orthographic(&self) -> &OrthographicProjection {
        &self.orthographic
    }

    pub fn perspective(&self) -> &PerspectiveProjection {
        &self.perspective
    }

    pub fn viewport_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn state(&self) -> CameraState {
        CameraState {
            projection: self.active,
            view_mode: self.view_mode,
            position: self.pose.position,
            target: self.pose.target,
            up: self.pose.up,
            half_height: self.orthographic.half_height,
        }
    }

    pub fn view_matrix(&self) -> Matrix4<f64> {
        Matrix4::look_at_rh(&self.pose.position, &self.pose.target, &self.pose.basis().2)
    }

    pub fn projection_matrix(&self) -> Matrix4<f64> {
        self.projection().matrix()
    }

    /// Pick ray through a pixel of the viewport
    pub fn ray_from_screen(&self, x: f64, y: f64) -> Option<Ray> {
        let ndc = screen_to_ndc(x, y, self.width as f64, self.height as f64)?;
        Some(self.projection().ray(ndc, &self.pose))
    }

    // ------------------------------------------------------------------------
    // Fitting
    // ------------------------------------------------------------------------

    /// Frame the whole model from the current view mode's direction
    ///
    /// Jumps without animating and cancels any transition. Calling it again
    /// with the same bounds gives the same camera.
    pub fn fit_to_bounds(&mut self, bounds: &SceneBounds) {
        let center = bounds.center();
        let max_dim = positive_extent(bounds.max_dim());

        self.orthographic.fit_extent(max_dim);
        let distance = self.projection().fit_distance(max_dim, self.fit_padding);

        self.animation = None;
        self.pose = CameraPose {
            position: center + self.view_mode.eye_direction() * distance,
            target: center,
            up: self.view_mode.up(),
        };
        self.bounds = Some(*bounds);
        log::debug!(
            "Fitted {:?} camera to {max_dim:.2} m model at distance {distance:.2}",
            self.active
        );
    }

    /// Bounds of the last fit
    pub fn scene_bounds(&self) -> Option<SceneBounds> {
        self.bounds
    }

    /// Switch view mode and re-frame the model
    ///
    /// Locked modes switch to the orthographic projection and disable
    /// rotation; `Free` goes back to perspective with rotation.
    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
        self.rotation_enabled = !mode.is_locked();
        self.active = if mode.is_locked() {
            ProjectionKind::Orthographic
        } else {
            ProjectionKind::Perspective
        };
        let bounds = self.bounds.unwrap_or_default();
        self.fit_to_bounds(&bounds);
        log::debug!("View mode: {}", mode.as_str());
    }

    /// Swap perspective and orthographic in free mode
    ///
    /// Returns false (and does nothing) in locked modes.
    pub fn toggle_projection(&mut self) -> bool {
        if self.view_mode.is_locked() {
            return false;
        }
        self.active = match self.active {
            ProjectionKind::Perspective => ProjectionKind::Orthographic,
            ProjectionKind::Orthographic => ProjectionKind::Perspective,
        };
        true
    }

    /// Back to the free perspective view of the whole model
    pub fn reset(&mut self) {
        self.set_view_mode(ViewMode::Free);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        let aspect = aspect_ratio(self.width, self.height);
        self.perspective.set_aspect(aspect);
        self.orthographic.set_aspect(aspect);
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    /// Orbit around the target; ignored when rotation is locked
    pub fn orbit(&mut self, azimuth: f64, elevation: f64) -> bool {
        if !self.rotation_enabled {
            return false;
        }
        self.animation = None;

        let offset = self.pose.position - self.pose.target;
        let (_, right, _) = self.pose.basis();
        let yaw = Rotation3::from_axis_angle(&Vector3::z_axis(), azimuth);
        let mut rotated = yaw * offset;

        // Stop short of the poles so `up` stays usable
        let pitch = Rotation3::from_axis_angle(&Unit::new_normalize(yaw * right), -elevation);
        let pitched = pitch * rotated;
        let cos_to_pole = pitched.normalize().dot(&Vector3::z()).abs();
        if cos_to_pole < 0.999 {
            rotated = pitched;
        }

        self.pose.position = self.pose.target + rotated;
        self.pose.up = Vector3::z();
        true
    }

    /// Move towards (`factor < 1`) or away from the target
    pub fn zoom(&mut self, factor: f64) {
        if factor <= 0.0 {
            return;
        }
        self.animation = None;
        match self.active {
            ProjectionKind::Perspective => {
                let offset = self.pose.position - self.pose.target;
                self.pose.position = self.pose.target + offset * factor;
            }
            ProjectionKind::Orthographic => self.orthographic.half_height *= factor,
        }
    }

    // ------------------------------------------------------------------------
    // Animation
    // ------------------------------------------------------------------------

    /// Start a transition to a new position and target
    ///
    /// Replaces any transition already running. `None` uses the
    /// configured default duration.
    pub fn animate_to(
        &mut self,
        position: Point3<f64>,
        target: Point3<f64>,
        duration: Option<Duration>,
        now: Instant,
    ) {
        self.animate_pose(position, target, None, duration, now);
    }

    fn animate_pose(
        &mut self,
        position: Point3<f64>,
        target: Point3<f64>,
        up: Option<Vector3<f64>>,
        duration: Option<Duration>,
        now: Instant,
    ) {
        let duration = duration.unwrap_or(self.default_duration);
        if duration.is_zero() {
            self.animation = None;
            self.pose.position = position;
            self.pose.target = target;
            if let Some(up) = up {
                self.pose.up = up;
            }
            return;
        }
        self.animation = Some(CameraAnimation {
            from_position: self.pose.position,
            from_target: self.pose.target,
            to_position: position,
            to_target: target,
            to_up: up,
            start: now,
            duration,
        });
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Stop the running transition where it is
    pub fn cancel_animation(&mut self) -> bool {
        self.animation.take().is_some()
    }

    /// Advance the transition to `now`; returns true if the camera moved
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(anim) = &self.animation else {
            return false;
        };

        let elapsed = now.saturating_duration_since(anim.start);
        let t = (elapsed.as_secs_f64() / anim.duration.as_secs_f64()).min(1.0);

        if t >= 1.0 {
            self.pose.position = anim.to_position;
            self.pose.target = anim.to_target;
            if let Some(up) = anim.to_up {
                self.pose.up = up;
            }
            self.animation = None;
        } else {
            let eased = ease_in_out_cubic(t);
            self.pose.position =
                anim.from_position + (anim.to_position - anim.from_position) * eased;
            self.pose.target = anim.from_target + (anim.to_target - anim.from_target) * eased;
        }
        true
    }

    /// Animate to frame a box, keeping the current view direction
    pub fn focus_on_bounds(&mut self, bounds: &SceneBounds, now: Instant) {
        let center = bounds.center();
        let max_dim = positive_extent(bounds.max_dim());
        let distance = self.projection().fit_distance(max_dim, self.fit_padding);
        let position = center - self.look_direction() * distance;
        self.animate_to(position, center, None, now);
    }

    /// Animate to look straight down on a floor
    ///
    /// The camera goes above the model centre at the floor's elevation, at
    /// 1.5 times the larger horizontal extent. Section and elevation views
    /// switch to plan first. Does nothing before a model has been fitted.
    pub fn focus_floor(&mut self, elevation: f64, now: Instant) -> bool {
        let Some(bounds) = self.bounds else {
            return false;
        };
        if self.view_mode.is_locked() && self.view_mode != ViewMode::Plan {
            self.view_mode = ViewMode::Plan;
            log::debug!("View mode: {}", ViewMode::Plan.as_str());
        }
        let mut center = bounds.center();
        center.z = elevation;
        let size = bounds.size();
        let distance = positive_extent(size.x.max(size.y)) * 1.5;

        let position = center + Vector3::z() * distance;
        self.animate_pose(position, center, Some(Vector3::y()), None, now);
        true
    }

    // ------------------------------------------------------------------------
    // Saved views
    // ------------------------------------------------------------------------

    pub fn save_view(&mut self, name: impl Into<String>) -> SavedView {
        let view = SavedView {
            id: self.ids.next("view"),
            name: name.into(),
            camera: self.state(),
        };
        self.saved_views.push(view.clone());
        view
    }

    pub fn saved_views(&self) -> &[SavedView] {
        &self.saved_views
    }

    pub fn remove_view(&mut self, id: &str) -> bool {
        let before = self.saved_views.len();
        self.saved_views.retain(|v| v.id != id);
        self.saved_views.len() != before
    }

    /// Restore a snapshot, switching projection first when it differs
    pub fn restore_view(&mut self, view: &SavedView) {
        let state = &view.camera;
        if state.projection != self.active {
            self.active = state.projection;
        }
        self.view_mode = state.view_mode;
        self.rotation_enabled = !state.view_mode.is_locked();
        self.animation = None;
        self.orthographic.half_height = state.half_height;
        self.pose = CameraPose {
            position: state.position,
            target: state.target,
            up: state.up,
        };
        log::debug!("Restored view '{}'", view.name);
    }
}

fn aspect_ratio(width: u32, height: u32) -> f64 {
    width.max(1) as f64 / height.max(1) as f64
}

/// Degenerate (flat or empty) models still get a usable distance
fn positive_extent(extent: f64) -> f64 {
    if extent.is_finite() && extent > f64::EPSILON {
        extent
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn model_bounds() -> SceneBounds {
        SceneBounds::new(Point3::new(0.0, 0.0, 0.0), Point3::new(20.0, 10.0, 6.0))
    }

    fn controller() -> ViewportController {
        let mut c = ViewportController::default();
        c.fit_to_bounds(&model_bounds());
        c
    }

    #[test]
    fn test_perspective_fit_distance() {
        let c = controller();
        let expected = 10.0 / (37.5f64.to_radians()).tan() * 1.5;
        assert_relative_eq!(
            (c.position() - c.target()).norm(),
            expected,
            epsilon = 1e-9
        );
        assert_relative_eq!(c.target(), Point3::new(10.0, 5.0, 3.0));
        let dir = c.look_direction();
        assert_relative_eq!(dir, -Vector3::new(1.0, 1.0, 1.0).normalize(), epsilon = 1e-12);
    }

    #[test]
    fn test_fit_is_idempotent() {
        let mut c = controller();
        let first = c.state();
        c.fit_to_bounds(&model_bounds());
        c.fit_to_bounds(&model_bounds());
        let again = c.state();
        assert_relative_eq!(first.position, again.position, epsilon = 1e-12);
        assert_relative_eq!(first.target, again.target, epsilon = 1e-12);
    }

    #[test]
    fn test_locked_modes_are_axis_aligned_orthographic() {
        let mut c = controller();
        let cases = [
            (ViewMode::Plan, -Vector3::z()),
            (ViewMode::Section, -Vector3::x()),
            (ViewMode::Elevation, Vector3::y()),
        ];
        for (mode, direction) in cases {
            c.set_view_mode(mode);
            assert_eq!(c.projection_kind(), ProjectionKind::Orthographic);
            assert!(!c.rotation_enabled());
            assert_eq!(c.look_direction(), direction, "{mode:?}");
            assert!(!c.toggle_projection());
            assert!(!c.orbit(0.3, 0.1));
        }

        c.set_view_mode(ViewMode::Free);
        assert_eq!(c.projection_kind(), ProjectionKind::Perspective);
        assert!(c.rotation_enabled());
        assert!(c.orbit(0.3, 0.1));
    }

    #[test]
    fn test_orthographic_extent() {
        let mut c = controller();
        c.resize(2000, 1000);
        c.set_view_mode(ViewMode::Plan);
        let ortho = c.orthographic();
        assert_relative_eq!(ortho.half_height, 24.0);
        assert_relative_eq!(ortho.half_width(), 48.0);
        assert_relative_eq!((c.position() - c.target()).norm(), 30.0);
    }

    #[test]
    fn test_toggle_projection_in_free_mode() {
        let mut c = controller();
        assert!(c.toggle_projection());
        assert_eq!(c.projection_kind(), ProjectionKind::Orthographic);
        assert_eq!(c.view_mode(), ViewMode::Free);
        assert!(c.toggle_projection());
        assert_eq!(c.projection_kind(), ProjectionKind::Perspective);
    }

    #[test]
    fn test_resize_keeps_camera() {
        let mut c = controller();
        let before = c.position();
        c.resize(800, 800);
        assert_eq!(c.position(), before);
        assert_relative_eq!(c.perspective().aspect, 1.0);
        assert_relative_eq!(c.orthographic().half_width(), c.orthographic().half_height);
        c.resize(0, 0);
        assert_eq!(c.viewport_size(), (1, 1));
    }

    #[test]
    fn test_animation_is_time_based() {
        let mut c = controller();
        let start = Instant::now();
        let from = c.position();
        let to = Point3::new(0.0, 0.0, 100.0);
        c.animate_to(to, Point3::origin(), Some(Duration::from_millis(1000)), start);

        // Halfway in time is halfway in space for a symmetric ease
        assert!(c.tick(start + Duration::from_millis(500)));
        let mid = from + (to - from) * 0.5;
        assert_relative_eq!(c.position(), mid, epsilon = 1e-9);

        // One late frame finishes the move regardless of tick count
        assert!(c.tick(start + Duration::from_millis(5000)));
        assert_eq!(c.position(), to);
        assert!(!c.is_animating());
        assert!(!c.tick(start + Duration::from_millis(6000)));
    }

    #[test]
    fn test_new_animation_cancels_previous() {
        let mut c = controller();
        let start = Instant::now();
        c.animate_to(Point3::new(50.0, 0.0, 0.0), Point3::origin(), None, start);
        c.tick(start + Duration::from_millis(250));
        let here = c.position();

        let second = Point3::new(0.0, 50.0, 0.0);
        c.animate_to(
            second,
            Point3::origin(),
            Some(Duration::from_millis(100)),
            start + Duration::from_millis(250),
        );
        // The new transition starts from where the old one stopped
        c.tick(start + Duration::from_millis(250));
        assert_relative_eq!(c.position(), here, epsilon = 1e-9);
        c.tick(start + Duration::from_millis(400));
        assert_eq!(c.position(), second);
        assert!(!c.is_animating());
    }

    #[test]
    fn test_easing_curve() {
        assert_eq!(ease_in_out_cubic(0.0), 0.0);
        assert_eq!(ease_in_out_cubic(1.0), 1.0);
        assert_relative_eq!(ease_in_out_cubic(0.5), 0.5);
        assert_relative_eq!(ease_in_out_cubic(0.25), 0.0625);
        assert!(ease_in_out_cubic(0.75) > 0.75);
    }

    #[test]
    fn test_save_and_restore_view() {
        let mut c = controller();
        c.set_view_mode(ViewMode::Plan);
        let plan = c.save_view("Plan overview");
        assert!(plan.id.starts_with("view-"));

        c.set_view_mode(ViewMode::Free);
        c.orbit(1.0, 0.2);
        assert_eq!(c.projection_kind(), ProjectionKind::Perspective);

        c.restore_view(&plan);
        assert_eq!(c.projection_kind(), ProjectionKind::Orthographic);
        assert_eq!(c.view_mode(), ViewMode::Plan);
        assert!(!c.rotation_enabled());
        assert_eq!(c.state(), plan.camera);

        assert_eq!(c.saved_views().len(), 1);
        assert!(c.remove_view(&plan.id));
        assert!(c.saved_views().is_empty());
    }

    #[test]
    fn test_saved_view_serializes() {
        let mut c = controller();
        let view = c.save_view("Home");
        let json = serde_json::to_string(&view).unwrap();
        assert!(json.contains(r#""view_mode":"3d""#));
        let back: SavedView = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, view.id);
        assert_eq!(back.camera.view_mode, ViewMode::Free);
        assert_eq!(back.camera.projection, ProjectionKind::Perspective);
        assert_relative_eq!(back.camera.position, view.camera.position, epsilon = 1e-9);
    }

    #[test]
    fn test_focus_floor_looks_down() {
        let mut c = controller();
        let start = Instant::now();
        assert!(c.focus_floor(3.5, start));
        c.tick(start + Duration::from_secs(2));
        assert_relative_eq!(c.target(), Point3::new(10.0, 5.0, 3.5));
        assert_relative_eq!(c.position(), Point3::new(10.0, 5.0, 3.5 + 30.0));
        assert_eq!(c.look_direction(), -Vector3::z());

        let mut fresh = ViewportController::default();
        assert!(!fresh.focus_floor(0.0, start));
    }

    #[test]
    fn test_focus_floor_from_section_switches_to_plan() {
        let mut c = controller();
        c.set_view_mode(ViewMode::Section);
        let start = Instant::now();
        assert!(c.focus_floor(0.0, start));
        assert_eq!(c.view_mode(), ViewMode::Plan);
        assert_eq!(c.projection_kind(), ProjectionKind::Orthographic);
        assert!(!c.rotation_enabled());

        c.tick(start + Duration::from_millis(1));
        assert_eq!(c.pose().up, Vector3::z());
        c.tick(start + Duration::from_secs(2));
        assert_eq!(c.pose().up, Vector3::y());
        assert_eq!(c.look_direction(), -Vector3::z());
    }

    #[test]
    fn test_configured_ortho_size_before_fit() {
        let config = ViewerConfig {
            ortho_size: 7.0,
            ..ViewerConfig::default()
        };
        let c = ViewportController::new(&config);
        assert_relative_eq!(c.orthographic().half_height, 7.0);
    }

    #[test]
    fn test_focus_on_bounds_keeps_direction() {
        let mut c = controller();
        let dir = c.look_direction();
        let start = Instant::now();
        let part = SceneBounds::new(Point3::new(1.0, 1.0, 0.0), Point3::new(3.0, 3.0, 2.0));
        c.focus_on_bounds(&part, start);
        c.tick(start + Duration::from_secs(1));
        assert_relative_eq!(c.target(), Point3::new(2.0, 2.0, 1.0), epsilon = 1e-9);
        assert_relative_eq!(c.look_direction(), dir, epsilon = 1e-9);
    }

    #[test]
    fn test_center_ray_hits_target() {
        let mut c = controller();
        let ray = c.ray_from_screen(640.0, 360.0).unwrap();
        assert_relative_eq!(ray.direction.normalize(), c.look_direction(), epsilon = 1e-9);

        c.set_view_mode(ViewMode::Plan);
        let ray = c.ray_from_screen(1280.0, 0.0).unwrap();
        // Top-right corner of the plan view: +x right, +y up
        assert!(ray.origin.x > c.target().x);
        assert!(ray.origin.y > c.target().y);
        assert_eq!(ray.direction, -Vector3::z());
    }
}
