//! Anatomical layout of the 21-point hand skeleton.

use crate::types::HandSkeleton;

pub const NUM_LANDMARKS: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

pub const TIP_INDICES: [usize; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

/// Bones drawn by the overlay.
pub const HAND_CONNECTIONS: &[(usize, usize)] = &[
    (WRIST, THUMB_CMC),
    (THUMB_CMC, THUMB_MCP),
    (THUMB_MCP, THUMB_IP),
    (THUMB_IP, THUMB_TIP),
    (WRIST, INDEX_MCP),
    (INDEX_MCP, INDEX_PIP),
    (INDEX_PIP, INDEX_DIP),
    (INDEX_DIP, INDEX_TIP),
    (WRIST, MIDDLE_MCP),
    (MIDDLE_MCP, MIDDLE_PIP),
    (MIDDLE_PIP, MIDDLE_DIP),
    (MIDDLE_DIP, MIDDLE_TIP),
    (WRIST, RING_MCP),
    (RING_MCP, RING_PIP),
    (RING_PIP, RING_DIP),
    (RING_DIP, RING_TIP),
    (WRIST, PINKY_MCP),
    (PINKY_MCP, PINKY_PIP),
    (PINKY_PIP, PINKY_DIP),
    (PINKY_DIP, PINKY_TIP),
    (INDEX_MCP, MIDDLE_MCP),
    (MIDDLE_MCP, RING_MCP),
    (RING_MCP, PINKY_MCP),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    /// Joint indices from base to tip.
    pub fn joints(&self) -> [usize; 4] {
        match self {
            Finger::Thumb => [THUMB_CMC, THUMB_MCP, THUMB_IP, THUMB_TIP],
            Finger::Index => [INDEX_MCP, INDEX_PIP, INDEX_DIP, INDEX_TIP],
            Finger::Middle => [MIDDLE_MCP, MIDDLE_PIP, MIDDLE_DIP, MIDDLE_TIP],
            Finger::Ring => [RING_MCP, RING_PIP, RING_DIP, RING_TIP],
            Finger::Pinky => [PINKY_MCP, PINKY_PIP, PINKY_DIP, PINKY_TIP],
        }
    }

    pub fn base(&self) -> usize {
        self.joints()[0]
    }

    pub fn tip(&self) -> usize {
        self.joints()[3]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Finger::Thumb => "thumb",
            Finger::Index => "index",
            Finger::Middle => "middle",
            Finger::Ring => "ring",
            Finger::Pinky => "pinky",
        }
    }
}

/// Planar distances between the landmarks that matter most for gestures.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyDistances {
    pub thumb_index: f32,
    pub thumb_middle: f32,
    pub index_middle: f32,
    pub thumb_wrist: f32,
    pub index_wrist: f32,
}

impl KeyDistances {
    pub fn measure(skeleton: &HandSkeleton) -> Option<Self> {
        let [thumb, index, middle, _, _] = skeleton.fingertips()?;
        let wrist = skeleton.landmarks()[WRIST];

        Some(Self {
            thumb_index: thumb.distance_2d(&index),
            thumb_middle: thumb.distance_2d(&middle),
            index_middle: index.distance_2d(&middle),
            thumb_wrist: thumb.distance_2d(&wrist),
            index_wrist: index.distance_2d(&wrist),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Landmark;
    use approx::assert_relative_eq;

    #[test]
    fn finger_groups_cover_every_non_wrist_point() {
        let mut seen: Vec<usize> = Finger::ALL.iter().flat_map(|f| f.joints()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (1..NUM_LANDMARKS).collect::<Vec<_>>());
        assert!(Finger::ALL.iter().all(|f| f.tip() == f.joints()[3]));
    }

    #[test]
    fn key_distances_use_the_image_plane() {
        let mut points = vec![Landmark::default(); NUM_LANDMARKS];
        points[THUMB_TIP] = Landmark::new(0.3, 0.4, -0.5);
        points[INDEX_TIP] = Landmark::new(0.0, 0.0, 0.5);
        let distances = KeyDistances::measure(&HandSkeleton::new(points)).unwrap();

        assert_relative_eq!(distances.thumb_index, 0.5, epsilon = 1e-6);
        assert_relative_eq!(distances.thumb_wrist, 0.5, epsilon = 1e-6);
        assert_relative_eq!(distances.index_wrist, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn key_distances_skip_partial_hands() {
        let skeleton = HandSkeleton::new(vec![Landmark::default(); 5]);
        assert!(KeyDistances::measure(&skeleton).is_none());
    }
}
