// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Events emitted to the host

use crate::ids::ObjectId;
use crate::measure::Measurement;
use crate::picking::PropertyEntry;
use serde::Serialize;
use std::sync::Arc;

/// Load pipeline stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum LoadStage {
    Fetching,
    Parsing,
    Opening,
    LoadingGeometry,
    BuildingTree,
    Finalizing,
    Completed,
}

impl LoadStage {
    /// Label shown by the host's progress UI
    pub fn label(&self) -> &'static str {
        match self {
            LoadStage::Fetching => "Fetching IFC file",
            LoadStage::Parsing => "Parsing IFC file",
            LoadStage::Opening => "Opening model",
            LoadStage::LoadingGeometry => "Loading geometry",
            LoadStage::BuildingTree => "Building object tree",
            LoadStage::Finalizing => "Finalizing view",
            LoadStage::Completed => "Completed",
        }
    }

    /// Overall percentage at which the stage begins
    pub fn percent(&self) -> f32 {
        match self {
            LoadStage::Fetching => 10.0,
            LoadStage::Parsing => 30.0,
            LoadStage::Opening => 50.0,
            LoadStage::LoadingGeometry => 60.0,
            LoadStage::BuildingTree => 80.0,
            LoadStage::Finalizing => 90.0,
            LoadStage::Completed => 100.0,
        }
    }
}

/// One progress report
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoadProgress {
    pub stage: LoadStage,
    pub percent: f32,
    pub message: String,
    /// Geometry records extracted so far
    pub geometry_count: Option<usize>,
    /// Size of the fetched file, when the fetcher knows it
    pub content_length: Option<u64>,
}

impl LoadProgress {
    /// Report the start of a stage
    pub fn stage(stage: LoadStage) -> Self {
        Self {
            stage,
            percent: stage.percent(),
            message: stage.label().to_string(),
            geometry_count: None,
            content_length: None,
        }
    }

    pub fn with_percent(mut self, percent: f32) -> Self {
        self.percent = percent.clamp(0.0, 100.0);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_geometry_count(mut self, count: usize) -> Self {
        self.geometry_count = Some(count);
        self
    }

    pub fn with_content_length(mut self, length: Option<u64>) -> Self {
        self.content_length = length;
        self
    }
}

/// Callback receiving load progress; may be called from a worker thread
pub type ProgressSink = Arc<dyn Fn(&LoadProgress) + Send + Sync>;

/// Event delivered to the host
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewerEvent {
    Progress(LoadProgress),
    SelectionChanged {
        object_id: Option<ObjectId>,
        properties: Vec<PropertyEntry>,
    },
    MeasurementsChanged {
        measurements: Vec<Measurement>,
    },
    ModelLoaded {
        geometry_count: usize,
        floor_count: usize,
    },
    ModelClosed,
}

/// Callback receiving viewer events
pub type EventSink = Box<dyn FnMut(&ViewerEvent) + Send>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_percentages_increase() {
        let stages = [
            LoadStage::Fetching,
            LoadStage::Parsing,
            LoadStage::Opening,
            LoadStage::LoadingGeometry,
            LoadStage::BuildingTree,
            LoadStage::Finalizing,
            LoadStage::Completed,
        ];
        assert!(stages.windows(2).all(|w| w[0].percent() < w[1].percent()));
    }

    #[test]
    fn test_progress_builder() {
        let progress = LoadProgress::stage(LoadStage::LoadingGeometry)
            .with_geometry_count(12)
            .with_percent(140.0);
        assert_eq!(progress.message, "Loading geometry");
        assert_eq!(progress.geometry_count, Some(12));
        assert_eq!(progress.percent, 100.0);
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = ViewerEvent::ModelLoaded {
            geometry_count: 3,
            floor_count: 1,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"model_loaded""#));
    }
}
