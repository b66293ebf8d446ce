pub mod skeleton;
#[cfg(feature = "desktop")]
pub mod window;

pub use skeleton::{band_color, phase_color, HAND_CONNECTIONS};
#[cfg(feature = "desktop")]
pub use window::MinifbRenderer;
