//! SSD anchor centers for the 192×192 palm detector.

use std::sync::LazyLock;

use super::super::common::PALM_INPUT_SIZE;

const STRIDES: [u32; 4] = [8, 16, 16, 16];
const ANCHORS_PER_LAYER: usize = 2;
const ANCHOR_OFFSET: f32 = 0.5;

pub const NUM_ANCHORS: usize = 2016;

pub static ANCHORS: LazyLock<Vec<[f32; 2]>> = LazyLock::new(generate_anchors);

/// Consecutive layers sharing a stride are merged into one grid, so every
/// cell emits `ANCHORS_PER_LAYER` anchors per merged layer.
pub fn generate_anchors() -> Vec<[f32; 2]> {
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    let mut layer = 0;

    while layer < STRIDES.len() {
        let stride = STRIDES[layer];
        let same_stride = STRIDES[layer..]
            .iter()
            .take_while(|&&s| s == stride)
            .count();
        let per_cell = same_stride * ANCHORS_PER_LAYER;
        let grid = PALM_INPUT_SIZE.div_ceil(stride);

        for y in 0..grid {
            for x in 0..grid {
                let cx = (x as f32 + ANCHOR_OFFSET) / grid as f32;
                let cy = (y as f32 + ANCHOR_OFFSET) / grid as f32;
                anchors.extend(std::iter::repeat_n([cx, cy], per_cell));
            }
        }

        layer += same_stride;
    }

    anchors
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn anchor_count_matches_detector_output() {
        assert_eq!(ANCHORS.len(), NUM_ANCHORS);
    }

    #[test]
    fn anchors_are_cell_centers() {
        let first = ANCHORS[0];
        assert_relative_eq!(first[0], 0.5 / 24.0);
        assert_relative_eq!(first[1], 0.5 / 24.0);
        assert_eq!(ANCHORS[1], first);

        // First anchor of the coarse 12×12 grid.
        let coarse = ANCHORS[24 * 24 * 2];
        assert_relative_eq!(coarse[0], 0.5 / 12.0);
        assert_eq!(ANCHORS[24 * 24 * 2 + 5], coarse);

        let last = ANCHORS[NUM_ANCHORS - 1];
        assert_relative_eq!(last[0], 11.5 / 12.0);
        assert_relative_eq!(last[1], 11.5 / 12.0);
    }
}
