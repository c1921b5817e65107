//! V4L2 frame source for local camera device nodes.
//!
//! Negotiates resolution, frame rate and pixel format, applies brightness and
//! named integer controls, and normalizes captured buffers to RGB24.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;
use std::time::{Duration, Instant};

use super::normalize::normalize_to_rgb;
use super::{CaptureConfig, DeviceControl, FrameSource, PixelFormat, SourceStats};
use crate::frame::Frame;

pub struct V4l2Source {
    config: CaptureConfig,
    state: Option<DeviceState>,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
    active_format: PixelFormat,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        if config.device.trim().is_empty() {
            return Err(anyhow!("v4l2 device path is empty"));
        }
        Ok(Self {
            active_width: config.width,
            active_height: config.height,
            active_format: PixelFormat::default(),
            config,
            state: None,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        })
    }

    fn apply_controls(&self, device: &v4l::Device) -> Result<()> {
        let descriptions = device
            .query_controls()
            .context("query v4l2 controls")?;

        let mut requested: Vec<DeviceControl> = self.config.controls.clone();
        if let Some(percent) = self.config.brightness {
            if let Some(desc) = descriptions
                .iter()
                .find(|d| d.name.eq_ignore_ascii_case("brightness"))
            {
                let span = desc.maximum - desc.minimum;
                let value = desc.minimum + span * i64::from(percent.min(100)) / 100;
                requested.push(DeviceControl {
                    name: desc.name.clone(),
                    value,
                });
            }
        }

        for control in requested {
            let Some(desc) = descriptions
                .iter()
                .find(|d| d.name.eq_ignore_ascii_case(&control.name))
            else {
                log::warn!(
                    "V4l2Source: {} has no control named '{}'",
                    self.config.device,
                    control.name
                );
                continue;
            };
            let value = v4l::control::Control {
                id: desc.id,
                value: v4l::control::Value::Integer(control.value),
            };
            if let Err(err) = device.set_control(value) {
                log::warn!(
                    "V4l2Source: failed to set {}={} on {}: {}",
                    control.name,
                    control.value,
                    self.config.device,
                    err
                );
            }
        }
        Ok(())
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

impl FrameSource for V4l2Source {
    fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let requested = PixelFormat::parse(self.config.pixel_format.as_deref())
            .with_context(|| format!("v4l2 device {}", self.config.device))?;
        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(requested.fourcc());

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        if format.fourcc != v4l::FourCC::new(requested.fourcc()) {
            return Err(anyhow!(
                "{} does not support pixel format {:?}",
                self.config.device,
                requested
            ));
        }

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Source: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.apply_controls(&device)?;

        self.active_width = format.width;
        self.active_height = format.height;
        self.active_format = requested;
        self.last_error = None;

        let state = DeviceStateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: connected to {} ({}x{} {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.active_format
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let (width, height, format) = (self.active_width, self.active_height, self.active_format);
        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let rgb = state
            .with_mut(|fields| -> Result<Vec<u8>> {
                let (buf, meta) = fields.stream.next().context("capture v4l2 frame")?;
                let used = (meta.bytesused as usize).min(buf.len());
                normalize_to_rgb(&buf[..used], width, height, format)
            })
            .map_err(|err| {
                self.last_error = Some(format!("{:#}", err));
                err
            })?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        self.last_error = None;

        Frame::new(rgb, self.active_width, self.active_height, self.frame_count).map(Some)
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
        }
    }
}
