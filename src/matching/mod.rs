pub mod normalize;
pub mod score;

pub use normalize::{normalize, normalize_points, BoundingBox, NormalizedKeypointSet};
pub use score::{Scorer, D_MAX};
