//! Marker Input Contract
//!
//! The vision pipeline reports fiducial-marker detections once per
//! camera frame, either as a set of observations or as an explicit
//! "no markers" signal. This crate defines that frame contract and a
//! small consumer-side tracker that keeps the last known pose per
//! marker id across frames.

use std::collections::HashMap;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error(
        "marker frame sequences have mismatched lengths: \
         {translations} translations, {rotations} rotations, {ids} ids"
    )]
    LengthMismatch {
        translations: usize,
        rotations: usize,
        ids: usize,
    },
}

/// One detected marker: its id and its pose in camera space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerObservation {
    pub id: i32,
    pub translation: Vec3,
    pub rotation: Quat,
}

/// Everything one camera frame has to say about markers.
///
/// `NoMarkers` is an explicit signal, not an empty detection list:
/// consumers treat it as "nothing visible right now" while keeping
/// whatever poses they already hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarkerFrame {
    NoMarkers,
    Detections(Vec<MarkerObservation>),
}

impl MarkerFrame {
    /// Assemble a frame from the parallel sequences the detector
    /// produces. All three sequences must have the same length; empty
    /// sequences make a `Detections` frame with no observations, which
    /// is distinct from [`MarkerFrame::NoMarkers`].
    pub fn from_sequences(
        translations: &[Vec3],
        rotations: &[Quat],
        ids: &[i32],
    ) -> Result<Self, FrameError> {
        if translations.len() != rotations.len() || translations.len() != ids.len() {
            return Err(FrameError::LengthMismatch {
                translations: translations.len(),
                rotations: rotations.len(),
                ids: ids.len(),
            });
        }
        let observations = ids
            .iter()
            .zip(translations)
            .zip(rotations)
            .map(|((&id, &translation), &rotation)| MarkerObservation {
                id,
                translation,
                rotation,
            })
            .collect();
        Ok(MarkerFrame::Detections(observations))
    }
}

/// A marker pose a tracker holds between frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerPose {
    pub translation: Vec3,
    pub rotation: Quat,
}

/// Consumer-side view of the marker stream.
///
/// Ingests frames and answers "where was marker N last seen" and
/// "which markers are visible right now". Detection gaps (shaky
/// lighting, occlusion by the hand) keep the stale pose available so
/// anchored content does not vanish for a frame.
#[derive(Debug, Default)]
pub struct MarkerTracker {
    poses: HashMap<i32, MarkerPose>,
    visible: Vec<i32>,
}

impl MarkerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one frame into the tracker.
    pub fn ingest(&mut self, frame: &MarkerFrame) {
        self.visible.clear();
        match frame {
            MarkerFrame::NoMarkers => {
                tracing::debug!("frame without markers");
            }
            MarkerFrame::Detections(observations) => {
                for observation in observations {
                    self.poses.insert(
                        observation.id,
                        MarkerPose {
                            translation: observation.translation,
                            rotation: observation.rotation,
                        },
                    );
                    self.visible.push(observation.id);
                }
            }
        }
    }

    /// Last known pose of `id`, from this frame or any earlier one.
    pub fn pose(&self, id: i32) -> Option<MarkerPose> {
        self.poses.get(&id).copied()
    }

    /// Ids detected in the most recently ingested frame.
    pub fn visible_ids(&self) -> &[i32] {
        &self.visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(entries: &[(i32, Vec3)]) -> MarkerFrame {
        MarkerFrame::Detections(
            entries
                .iter()
                .map(|&(id, translation)| MarkerObservation {
                    id,
                    translation,
                    rotation: Quat::IDENTITY,
                })
                .collect(),
        )
    }

    #[test]
    fn test_from_sequences() {
        let frame = MarkerFrame::from_sequences(
            &[Vec3::X, Vec3::Y],
            &[Quat::IDENTITY, Quat::IDENTITY],
            &[3, 7],
        )
        .unwrap();
        let MarkerFrame::Detections(observations) = frame else {
            panic!("expected detections");
        };
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].id, 3);
        assert_eq!(observations[1].translation, Vec3::Y);
    }

    #[test]
    fn test_from_sequences_rejects_length_mismatch() {
        let result = MarkerFrame::from_sequences(&[Vec3::X], &[], &[3]);
        assert!(matches!(result, Err(FrameError::LengthMismatch { .. })));
    }

    #[test]
    fn test_tracker_updates_and_lists_visible() {
        let mut tracker = MarkerTracker::new();
        tracker.ingest(&frame(&[(1, Vec3::X), (2, Vec3::Y)]));
        assert_eq!(tracker.visible_ids(), [1, 2]);
        assert_eq!(tracker.pose(1).unwrap().translation, Vec3::X);
        assert!(tracker.pose(9).is_none());

        tracker.ingest(&frame(&[(1, Vec3::Z)]));
        assert_eq!(tracker.visible_ids(), [1]);
        assert_eq!(tracker.pose(1).unwrap().translation, Vec3::Z);
    }

    #[test]
    fn test_no_markers_keeps_last_known_poses() {
        let mut tracker = MarkerTracker::new();
        tracker.ingest(&frame(&[(5, Vec3::X)]));
        tracker.ingest(&MarkerFrame::NoMarkers);

        assert!(tracker.visible_ids().is_empty());
        assert_eq!(tracker.pose(5).unwrap().translation, Vec3::X);
    }

    #[test]
    fn test_empty_detections_differ_from_no_markers() {
        let mut tracker = MarkerTracker::new();
        tracker.ingest(&frame(&[(5, Vec3::X)]));
        tracker.ingest(&frame(&[]));

        // An empty detection set still means "we looked and saw
        // nothing"; the stale pose stays queryable either way.
        assert!(tracker.visible_ids().is_empty());
        assert_eq!(tracker.pose(5).unwrap().translation, Vec3::X);
    }
}
