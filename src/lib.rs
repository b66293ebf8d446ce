pub mod camera;
pub mod config;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod logging;
pub mod matching;
pub mod pose;
pub mod render;
pub mod scheduler;
pub mod session;

#[cfg(test)]
mod testing;

pub use engine::{EngineHandle, GestureEngine};
pub use error::{EngineError, TransientEstimationError};
