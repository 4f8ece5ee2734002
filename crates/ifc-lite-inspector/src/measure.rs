// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Point-to-point distance measurement

use nalgebra::{Point3, Vector3};
use serde::Serialize;

/// Label height above the segment midpoint, metres
const LABEL_LIFT: f64 = 0.5;

/// Format a distance for display, e.g. `"5.00 m"`
pub fn format_distance(meters: f64) -> String {
    format!("{meters:.2} m")
}

/// A completed measurement
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Measurement {
    pub id: String,
    pub start: Point3<f64>,
    pub end: Point3<f64>,
    /// Euclidean distance, metres
    pub distance: f64,
    pub label: String,
    /// Where the label is anchored in world space
    pub label_position: Point3<f64>,
}

impl Measurement {
    fn new(id: String, start: Point3<f64>, end: Point3<f64>) -> Self {
        let distance = nalgebra::distance(&start, &end);
        Self {
            id,
            start,
            end,
            distance,
            label: format_distance(distance),
            label_position: nalgebra::center(&start, &end) + Vector3::z() * LABEL_LIFT,
        }
    }
}

/// Rubber-band line from the pending start point to the cursor
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeasurementPreview {
    pub start: Point3<f64>,
    pub end: Point3<f64>,
    pub distance: f64,
}

/// Measurement mode and the list of completed measurements
///
/// In measure mode every two clicked points make one measurement. The mode
/// stays on after a measurement completes.
#[derive(Debug, Default)]
pub struct MeasurementService {
    active: bool,
    pending: Option<Point3<f64>>,
    preview: Option<MeasurementPreview>,
    measurements: Vec<Measurement>,
    next_id: u64,
}

impl MeasurementService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn enter_mode(&mut self) {
        self.active = true;
    }

    /// Leave measure mode, dropping a half-placed measurement
    pub fn exit_mode(&mut self) {
        self.active = false;
        self.pending = None;
        self.preview = None;
    }

    pub fn pending_start(&self) -> Option<Point3<f64>> {
        self.pending
    }

    pub fn preview(&self) -> Option<&MeasurementPreview> {
        self.preview.as_ref()
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Place a point; returns true when it completed a measurement
    ///
    /// Ignored outside measure mode.
    pub fn add_point(&mut self, point: Point3<f64>) -> bool {
        if !self.active {
            return false;
        }
        let Some(start) = self.pending.take() else {
            self.pending = Some(point);
            return false;
        };

        self.next_id += 1;
        let measurement = Measurement::new(format!("measurement-{}", self.next_id), start, point);
        log::debug!("Measured {} ({})", measurement.label, measurement.id);
        self.measurements.push(measurement);
        self.preview = None;
        true
    }

    /// Follow the cursor while a start point is pending
    pub fn update_preview(&mut self, cursor: Point3<f64>) -> Option<&MeasurementPreview> {
        let start = self.pending?;
        self.preview = Some(MeasurementPreview {
            start,
            end: cursor,
            distance: nalgebra::distance(&start, &cursor),
        });
        self.preview.as_ref()
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.measurements.len();
        self.measurements.retain(|m| m.id != id);
        self.measurements.len() != before
    }

    pub fn clear_all(&mut self) {
        self.measurements.clear();
        self.pending = None;
        self.preview = None;
    }

    /// Release everything and leave measure mode
    pub fn dispose(&mut self) {
        self.clear_all();
        self.active = false;
    }
}
