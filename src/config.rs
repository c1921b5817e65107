//! Device configuration file.
//!
//! JSON format:
//!
//! ```text
//! {
//!     "team": <team number>,
//!     "ntmode": <"client" or "server", "client" if unspecified>,
//!     "cameras": [
//!         {
//!             "name": <camera name>,
//!             "path": <device path, e.g. "/dev/video0" or "stub://front">,
//!             "width": <video mode width>,
//!             "height": <video mode height>,
//!             "fps": <video mode fps>,
//!             "pixel format": <"MJPEG", "YUYV", etc>,    // optional
//!             "brightness": <percentage brightness>,     // optional
//!             "white balance": <"auto", "hold", value>,  // optional
//!             "exposure": <"auto", "hold", value>,       // optional
//!             "properties": [{ "name": .., "value": .. }], // optional
//!             "stream": { "properties": [..] }           // optional
//!         }
//!     ]
//! }
//! ```

use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::frame::FrameGeometry;

pub const DEFAULT_CONFIG_PATH: &str = "/boot/frc.json";

#[derive(Debug, Deserialize, Default)]
struct VisionConfigFile {
    team: Option<Value>,
    ntmode: Option<Value>,
    cameras: Option<Value>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    name: Option<String>,
    path: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
    #[serde(rename = "pixel format")]
    pixel_format: Option<String>,
    brightness: Option<Value>,
    #[serde(rename = "white balance")]
    white_balance: Option<Value>,
    exposure: Option<Value>,
    properties: Option<Value>,
    stream: Option<Value>,
}

/// Telemetry role selected by `ntmode`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NtMode {
    #[default]
    Client,
    Server,
}

impl NtMode {
    /// Case-insensitive parse of `"client"` / `"server"`.
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("client") {
            Some(NtMode::Client)
        } else if value.eq_ignore_ascii_case("server") {
            Some(NtMode::Server)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub path: PathBuf,
    pub team: u32,
    pub ntmode: NtMode,
    pub cameras: Vec<CameraSettings>,
    /// Broker address override (`VISION_BROKER_ADDR`).
    pub broker_addr: Option<String>,
}

/// Settings for one configured camera. Immutable after load.
#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub name: String,
    pub path: String,
    pub geometry: FrameGeometry,
    pub pixel_format: Option<String>,
    pub brightness: Option<Value>,
    pub white_balance: Option<Value>,
    pub exposure: Option<Value>,
    pub properties: Option<Value>,
    pub stream: Option<Value>,
}

impl VisionConfig {
    /// Read, layer env overrides onto, and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let mut cfg = read_config(path)?;
        cfg.apply_env();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var("VISION_BROKER_ADDR") {
            if !addr.trim().is_empty() {
                self.broker_addr = Some(addr.trim().to_string());
            }
        }
    }
}

/// Parse a config file without environment overrides.
pub fn read_config(path: &Path) -> Result<VisionConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("could not open '{}': {}", path.display(), e))?;
    let top: Value = serde_json::from_str(&raw).map_err(|e| parse_error(path, e))?;
    if !top.is_object() {
        return Err(parse_error(path, "must be JSON object"));
    }
    let file: VisionConfigFile =
        serde_json::from_value(top).map_err(|e| parse_error(path, e))?;
    from_file(path, file)
}

fn from_file(path: &Path, file: VisionConfigFile) -> Result<VisionConfig> {
    let team = file
        .team
        .as_ref()
        .and_then(team_number)
        .ok_or_else(|| parse_error(path, "could not read team number"))?;

    let mut ntmode = NtMode::default();
    if let Some(value) = file.ntmode.as_ref() {
        let text = value
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string());
        match NtMode::parse(&text) {
            Some(mode) => ntmode = mode,
            None => log::warn!(
                "config error in '{}': could not understand ntmode value '{}'",
                path.display(),
                text
            ),
        }
    }

    let entries = file
        .cameras
        .ok_or_else(|| parse_error(path, "could not read cameras"))?;
    let entries = match entries {
        Value::Array(entries) => entries,
        _ => return Err(parse_error(path, "cameras must be a list")),
    };
    if entries.is_empty() {
        return Err(parse_error(path, "cameras must not be empty"));
    }
    let cameras = entries
        .into_iter()
        .map(|entry| read_camera_config(path, entry))
        .collect::<Result<Vec<_>>>()?;

    Ok(VisionConfig {
        path: path.to_path_buf(),
        team,
        ntmode,
        cameras,
        broker_addr: None,
    })
}

/// Team number as a JSON integer or a numeric string (`1234` or `"1234"`).
fn team_number(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|team| u32::try_from(team).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_camera_config(path: &Path, entry: Value) -> Result<CameraSettings> {
    if !entry.is_object() {
        return Err(parse_error(path, "camera entry must be JSON object"));
    }
    let file: CameraConfigFile =
        serde_json::from_value(entry).map_err(|e| parse_error(path, e))?;

    let name = file
        .name
        .ok_or_else(|| parse_error(path, "could not read camera name"))?;
    let width = file
        .width
        .ok_or_else(|| parse_error(path, format!("camera '{}': could not read width", name)))?;
    let height = file
        .height
        .ok_or_else(|| parse_error(path, format!("camera '{}': could not read height", name)))?;
    let fps = file
        .fps
        .ok_or_else(|| parse_error(path, format!("camera '{}': could not read fps", name)))?;
    let path_value = file
        .path
        .ok_or_else(|| parse_error(path, format!("camera '{}': could not read path", name)))?;
    let geometry = FrameGeometry::new(width, height, fps)
        .map_err(|e| parse_error(path, format!("camera '{}': {}", name, e)))?;

    Ok(CameraSettings {
        name,
        path: path_value,
        geometry,
        pixel_format: file.pixel_format,
        brightness: file.brightness,
        white_balance: file.white_balance,
        exposure: file.exposure,
        properties: file.properties,
        stream: file.stream,
    })
}

fn parse_error(path: &Path, detail: impl std::fmt::Display) -> anyhow::Error {
    anyhow!("config error in '{}': {}", path.display(), detail)
}
