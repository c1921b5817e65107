//! Shape detection: thresholding and contour extraction over RGB frames.
//!
//! Detectors yield zero or more outlines per frame. Outline order is the
//! detector's own (raster order for the built-in backends); no identity is
//! carried between frames.

mod backend;
pub mod backends;
mod outline;

pub use backend::ShapeDetector;
pub use backends::{ScriptedDetector, TapeDetector, TapeDetectorParams};
pub use outline::{BoundingBox, Outline, Point};
