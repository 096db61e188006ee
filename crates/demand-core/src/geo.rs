use serde::{Deserialize, Serialize};

/// Axis-aligned longitude/latitude rectangle, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

/// New York City service area used to discard implausible coordinates.
pub const NYC_BOUNDS: BoundingBox = BoundingBox {
    min_lon: -74.3,
    max_lon: -73.7,
    min_lat: 40.5,
    max_lat: 41.0,
};

impl BoundingBox {
    /// `true` when the point lies inside the box or on its edge.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        (self.min_lon..=self.max_lon).contains(&lon) && (self.min_lat..=self.max_lat).contains(&lat)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        NYC_BOUNDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_interior_point() {
        assert!(NYC_BOUNDS.contains(-73.98, 40.75));
    }

    #[test]
    fn test_edges_are_inclusive() {
        assert!(NYC_BOUNDS.contains(-74.3, 40.5));
        assert!(NYC_BOUNDS.contains(-73.7, 41.0));
    }

    #[test]
    fn test_just_outside_each_edge() {
        assert!(!NYC_BOUNDS.contains(-73.98, 40.49999));
        assert!(!NYC_BOUNDS.contains(-73.98, 41.00001));
        assert!(!NYC_BOUNDS.contains(-74.30001, 40.75));
        assert!(!NYC_BOUNDS.contains(-73.69999, 40.75));
    }

    #[test]
    fn test_nan_is_outside() {
        assert!(!NYC_BOUNDS.contains(f64::NAN, 40.75));
        assert!(!NYC_BOUNDS.contains(-73.98, f64::NAN));
    }
}
