//! Captured frames and the geometry they were configured with.
//!
//! - `Frame`: one RGB24 image handed from a frame source to the detector.
//! - `FrameGeometry`: configured width/height/fps of a camera stream.
//!
//! Frames are consumed by exactly one processing cycle and dropped; nothing
//! downstream retains pixel data.

use anyhow::{anyhow, Result};

/// Configured capture geometry of one camera.
///
/// Recorded once at camera start and passed explicitly to the geometry
/// computation; it is never updated from the negotiated device mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl FrameGeometry {
    /// Validate a configured geometry.
    ///
    /// Width must be at least 2 because the drive input divides by `width / 2`.
    pub fn new(width: u32, height: u32, fps: u32) -> Result<Self> {
        if width < 2 {
            return Err(anyhow!("frame width must be at least 2 (got {})", width));
        }
        if height == 0 {
            return Err(anyhow!("frame height must be greater than zero"));
        }
        if fps == 0 {
            return Err(anyhow!("fps must be greater than zero"));
        }
        Ok(Self { width, height, fps })
    }
}

/// Number of bytes in a `width` x `height` RGB24 buffer.
pub fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions {}x{} overflow", width, height))
}

/// One captured RGB24 frame.
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonic per-source frame counter, starting at 1.
    pub sequence: u64,
}

impl Frame {
    /// Build a frame, checking that the buffer matches the dimensions.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
            sequence,
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_rejects_degenerate_width() {
        assert!(FrameGeometry::new(1, 240, 30).is_err());
        assert!(FrameGeometry::new(2, 240, 30).is_ok());
    }

    #[test]
    fn geometry_rejects_zero_height_and_fps() {
        assert!(FrameGeometry::new(320, 0, 30).is_err());
        assert!(FrameGeometry::new(320, 240, 0).is_err());
    }

    #[test]
    fn frame_validates_buffer_length() {
        assert!(Frame::new(vec![0u8; 12], 2, 2, 1).is_ok());
        let err = Frame::new(vec![0u8; 11], 2, 2, 1).unwrap_err();
        assert!(err.to_string().contains("expected 12 RGB bytes"));
    }

    #[test]
    fn rgb_len_checks_overflow() {
        assert_eq!(rgb_len(320, 240).unwrap(), 230_400);
        assert!(rgb_len(u32::MAX, u32::MAX).is_err());
    }

    #[test]
    fn debug_output_omits_pixels() {
        let frame = Frame::new(vec![7u8; 12], 2, 2, 3).unwrap();
        let text = format!("{frame:?}");
        assert!(text.contains("sequence: 3"));
        assert!(text.contains("bytes: 12"));
    }
}
