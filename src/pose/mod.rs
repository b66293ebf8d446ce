#[cfg(feature = "desktop")]
pub mod detector;
pub mod keypoint;
#[cfg(feature = "desktop")]
pub mod preprocess;
pub mod source;
pub mod template;

#[cfg(feature = "desktop")]
pub use detector::{HandDetector, OnnxHandBackend};
pub use keypoint::{HandLandmark, KeypointSet, Point2D, Point3D};
#[cfg(feature = "desktop")]
pub use preprocess::{preprocess_for_hand_landmarks, LetterboxInfo, HAND_INPUT_SIZE};
pub use source::{PoseBackend, PoseEstimator};
pub use template::{load_template, save_template};
