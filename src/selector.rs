//! Target selection among candidate detections

use crate::frame::BoundingBox;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// Policy used to pick the tracked box from a detection set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    /// Largest `width * height`, the closest face to the camera.
    /// Ties go to the box the detector reported first.
    #[default]
    LargestArea,

    /// Whatever the detector reported first
    FirstDetected,
}

impl SelectionStrategy {
    /// Picks one box, or `None` for an empty candidate set.
    ///
    /// Scans the slice in place: no allocation, no reordering.
    pub fn select(self, candidates: &[BoundingBox]) -> Option<BoundingBox> {
        match self {
            SelectionStrategy::LargestArea => candidates
                .iter()
                .copied()
                // min_by_key keeps the first of equal keys
                .min_by_key(|candidate| Reverse(candidate.area())),
            SelectionStrategy::FirstDetected => candidates.first().copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SelectionStrategy::LargestArea)]
    #[case(SelectionStrategy::FirstDetected)]
    fn test_empty_set_has_no_target(#[case] strategy: SelectionStrategy) {
        assert_eq!(strategy.select(&[]), None);
    }

    #[test]
    fn test_largest_area_wins() {
        let boxes = [
            BoundingBox::new(0, 0, 10, 10),
            BoundingBox::new(50, 50, 30, 40),
            BoundingBox::new(100, 100, 20, 20),
        ];

        let target = SelectionStrategy::LargestArea.select(&boxes);
        assert_eq!(target, Some(BoundingBox::new(50, 50, 30, 40)));
    }

    #[test]
    fn test_ties_resolve_to_first_encountered() {
        let boxes = [
            BoundingBox::new(0, 0, 5, 5),
            BoundingBox::new(10, 10, 20, 30),
            BoundingBox::new(80, 80, 30, 20),
            BoundingBox::new(150, 150, 25, 24),
        ];

        let target = SelectionStrategy::LargestArea.select(&boxes);
        assert_eq!(target, Some(BoundingBox::new(10, 10, 20, 30)));
    }

    #[test]
    fn test_first_detected_ignores_area() {
        let boxes = [
            BoundingBox::new(0, 0, 5, 5),
            BoundingBox::new(10, 10, 100, 100),
        ];

        let target = SelectionStrategy::FirstDetected.select(&boxes);
        assert_eq!(target, Some(BoundingBox::new(0, 0, 5, 5)));
    }

    #[test]
    fn test_strategy_from_toml_name() {
        #[derive(Deserialize)]
        struct Wrapper {
            strategy: SelectionStrategy,
        }

        let parsed: Wrapper = toml::from_str(r#"strategy = "first-detected""#).unwrap();
        assert_eq!(parsed.strategy, SelectionStrategy::FirstDetected);
    }
}
