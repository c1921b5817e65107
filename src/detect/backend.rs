use anyhow::Result;

use super::outline::Outline;

/// Shape detector backend.
///
/// Implementations treat the pixel slice as read-only and must not retain it
/// beyond the `detect` call.
pub trait ShapeDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Extract outlines from one RGB24 frame.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Outline>>;
}
