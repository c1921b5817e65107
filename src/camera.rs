//! Camera bring-up.
//!
//! Turns configured `CameraSettings` into connected frame sources. Each
//! started stream carries the configured `FrameGeometry`, which the
//! processing loop passes to the geometry computation.

use anyhow::{Context, Result};
use serde_json::Value;

use crate::config::CameraSettings;
use crate::frame::FrameGeometry;
use crate::ingest::{open_source, CaptureConfig, DeviceControl, FrameSource};

/// A started camera stream.
pub struct CameraStream {
    pub name: String,
    pub geometry: FrameGeometry,
    source: Box<dyn FrameSource>,
}

impl CameraStream {
    /// Wrap an already connected source.
    pub fn new(name: impl Into<String>, geometry: FrameGeometry, source: Box<dyn FrameSource>) -> Self {
        Self {
            name: name.into(),
            geometry,
            source,
        }
    }

    pub fn source(&self) -> &dyn FrameSource {
        self.source.as_ref()
    }

    pub(crate) fn into_parts(self) -> (String, FrameGeometry, Box<dyn FrameSource>) {
        (self.name, self.geometry, self.source)
    }
}

/// Outcome of starting one configured camera.
pub struct StartedCamera {
    pub name: String,
    pub result: Result<CameraStream>,
}

pub struct CameraManager;

impl CameraManager {
    /// Start one camera: open its source by device path and apply settings.
    pub fn start(settings: &CameraSettings) -> Result<CameraStream> {
        log::info!("Starting camera '{}' on {}", settings.name, settings.path);
        let capture = capture_config(settings);
        let mut source = open_source(capture)
            .with_context(|| format!("camera '{}': open {}", settings.name, settings.path))?;
        source
            .connect()
            .with_context(|| format!("camera '{}': connect {}", settings.name, settings.path))?;
        log::info!(
            "camera '{}' configured for {}x{} @ {} fps",
            settings.name,
            settings.geometry.width,
            settings.geometry.height,
            settings.geometry.fps
        );
        Ok(CameraStream::new(
            settings.name.clone(),
            settings.geometry,
            source,
        ))
    }

    /// Start every camera in configuration order.
    ///
    /// A camera that fails to start is logged and yields no frames; the
    /// others are unaffected.
    pub fn start_all(cameras: &[CameraSettings]) -> Vec<StartedCamera> {
        cameras
            .iter()
            .map(|settings| {
                let result = Self::start(settings);
                if let Err(err) = &result {
                    log::error!("camera '{}' failed to start: {:#}", settings.name, err);
                }
                StartedCamera {
                    name: settings.name.clone(),
                    result,
                }
            })
            .collect()
    }
}

/// Every camera started for a run.
///
/// The first configured camera can be handed to the processing loop. The
/// others stay open, unanalysed, for as long as the set is alive.
pub struct CameraSet {
    primary: Option<StartedCamera>,
    standby: Vec<StartedCamera>,
}

impl CameraSet {
    pub fn new(started: Vec<StartedCamera>) -> Self {
        let mut started = started.into_iter();
        let primary = started.next();
        Self {
            primary,
            standby: started.collect(),
        }
    }

    /// Start every configured camera.
    pub fn start(cameras: &[CameraSettings]) -> Self {
        Self::new(CameraManager::start_all(cameras))
    }

    /// Take the first configured camera's stream, if it started.
    pub fn take_primary(&mut self) -> Option<CameraStream> {
        let first = self.primary.take()?;
        match first.result {
            Ok(stream) => Some(stream),
            Err(_) => {
                log::warn!("camera '{}' did not start, no vision processing", first.name);
                None
            }
        }
    }

    /// Cameras kept open besides the analysed one.
    pub fn standby(&self) -> impl Iterator<Item = &CameraStream> {
        self.standby.iter().filter_map(|c| c.result.as_ref().ok())
    }
}

/// Translate camera settings into capture settings for the frame source.
pub fn capture_config(settings: &CameraSettings) -> CaptureConfig {
    let brightness = match &settings.brightness {
        None => None,
        Some(value) => match value.as_u64() {
            Some(percent) => Some(percent.min(100) as u32),
            None => {
                log::warn!(
                    "camera '{}': ignoring non-numeric brightness {}",
                    settings.name,
                    value
                );
                None
            }
        },
    };

    let controls = settings
        .properties
        .as_ref()
        .map(|props| parse_controls(&settings.name, props))
        .unwrap_or_default();

    for (field, value) in [
        ("white balance", &settings.white_balance),
        ("exposure", &settings.exposure),
        ("stream", &settings.stream),
    ] {
        if let Some(value) = value {
            log::debug!(
                "camera '{}': {} {} forwarded without device mapping",
                settings.name,
                field,
                value
            );
        }
    }

    CaptureConfig {
        device: settings.path.clone(),
        width: settings.geometry.width,
        height: settings.geometry.height,
        target_fps: settings.geometry.fps,
        pixel_format: settings.pixel_format.clone(),
        brightness,
        controls,
    }
}

fn parse_controls(camera: &str, properties: &Value) -> Vec<DeviceControl> {
    let Some(entries) = properties.as_array() else {
        log::warn!("camera '{}': properties must be a list", camera);
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let name = entry.get("name").and_then(Value::as_str);
            let value = entry.get("value").and_then(|v| match v {
                Value::Bool(b) => Some(i64::from(*b)),
                other => other.as_i64(),
            });
            match (name, value) {
                (Some(name), Some(value)) => Some(DeviceControl {
                    name: name.to_string(),
                    value,
                }),
                _ => {
                    log::warn!("camera '{}': skipping property {}", camera, entry);
                    None
                }
            }
        })
        .collect()
}
