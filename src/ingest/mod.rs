//! Frame sources.
//!
//! - `stub://<name>` paths: synthetic tape-target scene (testing, bench runs)
//! - Device paths (e.g. `/dev/video0`): V4L2 capture (feature: ingest-v4l2)
//!
//! All sources produce RGB24 `Frame`s. A source blocks in `next_frame` until
//! the next frame is available; `Ok(None)` means the stream has ended, which
//! only finite sources (synthetic with a frame limit) ever report.

#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};

use crate::frame::Frame;

pub use synthetic::{synthetic_target_boxes, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

/// Pixel format requested from a capture device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PixelFormat {
    #[default]
    Rgb24,
    Yuyv,
    Mjpeg,
}

impl PixelFormat {
    /// Parse the `pixel format` config value. Absent means RGB24.
    pub fn parse(value: Option<&str>) -> Result<Self> {
        let Some(value) = value else {
            return Ok(PixelFormat::Rgb24);
        };
        match value.to_ascii_uppercase().as_str() {
            "RGB" | "RGB24" | "RGB3" => Ok(PixelFormat::Rgb24),
            "YUYV" => Ok(PixelFormat::Yuyv),
            "MJPEG" | "MJPG" => Ok(PixelFormat::Mjpeg),
            other => Err(anyhow!("unsupported pixel format '{}'", other)),
        }
    }

    pub fn fourcc(&self) -> &'static [u8; 4] {
        match self {
            PixelFormat::Rgb24 => b"RGB3",
            PixelFormat::Yuyv => b"YUYV",
            PixelFormat::Mjpeg => b"MJPG",
        }
    }
}

/// Named integer device control (e.g. `contrast = 50`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceControl {
    pub name: String,
    pub value: i64,
}

/// Capture settings handed to a frame source.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// Device path or `stub://` name.
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    /// `pixel format` as configured. Only device sources interpret it.
    pub pixel_format: Option<String>,
    /// Brightness percentage, 0..=100.
    pub brightness: Option<u32>,
    pub controls: Vec<DeviceControl>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 320,
            height: 240,
            target_fps: 30,
            pixel_format: None,
            brightness: None,
            controls: Vec::new(),
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub device: String,
}

/// A stream of captured frames.
pub trait FrameSource: Send {
    /// Open the stream and apply capture settings.
    fn connect(&mut self) -> Result<()>;

    /// Block until the next frame. `Ok(None)` ends the stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Build the frame source for a device path.
pub fn open_source(config: CaptureConfig) -> Result<Box<dyn FrameSource>> {
    if config.device.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(config)));
    }
    if config.device.contains("://") {
        return Err(anyhow!(
            "unsupported camera path '{}' (expected a device node or stub://)",
            config.device
        ));
    }
    #[cfg(feature = "ingest-v4l2")]
    {
        Ok(Box::new(V4l2Source::new(config)?))
    }
    #[cfg(not(feature = "ingest-v4l2"))]
    {
        Err(anyhow!(
            "camera device '{}' requires the ingest-v4l2 feature",
            config.device
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_format_parses_common_names() {
        assert_eq!(PixelFormat::parse(None).unwrap(), PixelFormat::Rgb24);
        assert_eq!(PixelFormat::parse(Some("mjpeg")).unwrap(), PixelFormat::Mjpeg);
        assert_eq!(PixelFormat::parse(Some("YUYV")).unwrap(), PixelFormat::Yuyv);
        assert!(PixelFormat::parse(Some("H264")).is_err());
    }

    #[test]
    fn open_source_rejects_url_schemes() {
        let config = CaptureConfig {
            device: "rtsp://camera".to_string(),
            ..CaptureConfig::default()
        };
        assert!(open_source(config).is_err());
    }

    #[test]
    fn open_source_accepts_stub_paths() {
        let config = CaptureConfig {
            device: "stub://front".to_string(),
            ..CaptureConfig::default()
        };
        let source = open_source(config).unwrap();
        assert_eq!(source.stats().device, "stub://front");
    }
}
