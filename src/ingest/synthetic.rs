//! Synthetic frame source for `stub://` camera paths.
//!
//! Renders a dark scene with a pair of red tape strips either side of the
//! frame center. The pair drifts horizontally from frame to frame and is out
//! of view on every tenth frame, so both the found and not-found paths run.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

use super::{CaptureConfig, FrameSource, SourceStats};
use crate::detect::BoundingBox;
use crate::frame::{rgb_len, Frame};

const BACKGROUND: [u8; 3] = [20, 20, 20];
const TAPE: [u8; 3] = [220, 30, 30];

/// Boxes of the two tape strips in frame `sequence`, or `None` when the
/// target is out of view.
pub fn synthetic_target_boxes(width: u32, height: u32, sequence: u64) -> Option<[BoundingBox; 2]> {
    if sequence % 10 == 0 {
        return None;
    }
    let (w, h) = (width as i32, height as i32);
    let strip_w = (w / 16).max(2).min(w);
    let strip_h = (h / 4).max(2).min(h);
    let step = (w / 160).max(1);
    let drift = ((sequence % 20) as i32 - 10) * step;
    let y = (h - strip_h) / 2;
    let clamp_x = |x: i32| x.clamp(0, w - strip_w);

    let left = clamp_x(w / 2 - w / 8 - strip_w / 2 + drift);
    let right = clamp_x(w / 2 + w / 8 - strip_w / 2 + drift);
    Some([
        BoundingBox::new(left, y, strip_w, strip_h),
        BoundingBox::new(right, y, strip_w, strip_h),
    ])
}

pub struct SyntheticSource {
    config: CaptureConfig,
    frame_count: u64,
    frame_limit: Option<u64>,
    paced: bool,
    last_frame_at: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            frame_limit: None,
            paced: true,
            last_frame_at: None,
        }
    }

    /// End the stream after `limit` frames.
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    /// Produce frames as fast as they are requested instead of at `target_fps`.
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    fn pace(&mut self) {
        if !self.paced || self.config.target_fps == 0 {
            return;
        }
        let interval = Duration::from_secs(1) / self.config.target_fps;
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }

    /// Frame size in bytes; also rejects sizes the scene coordinates cannot hold.
    fn frame_len(&self) -> Result<usize> {
        let (width, height) = (self.config.width, self.config.height);
        if i32::try_from(width).is_err() || i32::try_from(height).is_err() {
            return Err(anyhow!("synthetic frame {}x{} is too large", width, height));
        }
        rgb_len(width, height)
    }

    fn render(&self, sequence: u64) -> Result<Vec<u8>> {
        let (w, h) = (self.config.width as i32, self.config.height as i32);
        let boxes = synthetic_target_boxes(self.config.width, self.config.height, sequence);
        let mut pixels = Vec::with_capacity(self.frame_len()?);
        for y in 0..h {
            for x in 0..w {
                let on_tape = boxes.iter().flatten().any(|b| {
                    x >= b.x && x < b.x + b.width && y >= b.y && y < b.y + b.height
                });
                pixels.extend_from_slice(if on_tape { &TAPE } else { &BACKGROUND });
            }
        }
        Ok(pixels)
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        self.frame_len()?;
        log::info!(
            "SyntheticSource: connected to {} ({}x{} @ {} fps)",
            self.config.device,
            self.config.width,
            self.config.height,
            self.config.target_fps
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self
            .frame_limit
            .is_some_and(|limit| self.frame_count >= limit)
        {
            return Ok(None);
        }
        self.pace();
        self.frame_count += 1;
        let pixels = self.render(self.frame_count)?;
        Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )
        .map(Some)
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
        }
    }
}
