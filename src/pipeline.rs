//! Processing loop.
//!
//! One dedicated worker thread per analysed camera. The worker alternates
//! between two states:
//!
//! - `Idle`: blocked on the frame source for the next frame
//! - `Publishing`: detect outlines, compute metrics, publish them
//!
//! There is no terminal state for a live camera. The worker only returns when
//! its source reports end of stream.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::camera::CameraStream;
use crate::detect::{BoundingBox, ShapeDetector};
use crate::frame::{Frame, FrameGeometry};
use crate::geometry::{compute, TargetMetrics};
use crate::ingest::FrameSource;
use crate::telemetry::{TelemetryBus, TelemetryPublisher};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(10);
/// Pause after a failed frame read so a dead device does not spin the worker.
pub const SOURCE_ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Publishing,
}

/// Counters kept by the worker.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub found: u64,
    pub not_found: u64,
    pub detector_errors: u64,
    pub source_errors: u64,
    pub publish_errors: u64,
}

pub struct ProcessingLoop<B: TelemetryBus> {
    camera: String,
    geometry: FrameGeometry,
    detector: Box<dyn ShapeDetector>,
    publisher: Arc<TelemetryPublisher<B>>,
    state: LoopState,
    stats: LoopStats,
}

impl<B: TelemetryBus + 'static> ProcessingLoop<B> {
    pub fn new(
        camera: impl Into<String>,
        geometry: FrameGeometry,
        detector: Box<dyn ShapeDetector>,
        publisher: Arc<TelemetryPublisher<B>>,
    ) -> Self {
        Self {
            camera: camera.into(),
            geometry,
            detector,
            publisher,
            state: LoopState::Idle,
            stats: LoopStats::default(),
        }
    }

    /// Start the worker thread for a camera stream.
    pub fn spawn(
        stream: CameraStream,
        detector: Box<dyn ShapeDetector>,
        publisher: Arc<TelemetryPublisher<B>>,
    ) -> Result<LoopHandle> {
        let (name, geometry, source) = stream.into_parts();
        let worker = Self::new(name.clone(), geometry, detector, publisher);
        let handle = std::thread::Builder::new()
            .name(format!("vision-{}", name))
            .spawn(move || worker.run(source))
            .context("spawn vision thread")?;
        log::info!("vision thread started for camera '{}'", name);
        Ok(LoopHandle { handle })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Pull frames until the source ends.
    pub fn run(mut self, mut source: Box<dyn FrameSource>) -> LoopStats {
        let mut last_health_log = Instant::now();
        let mut last_error_log: Option<Instant> = None;
        let mut suppressed_errors = 0u64;
        loop {
            self.transition(LoopState::Idle);
            match source.next_frame() {
                Ok(Some(frame)) => {
                    self.run_cycle(&frame);
                }
                Ok(None) => {
                    log::info!("camera '{}' stream ended", self.camera);
                    break;
                }
                Err(err) => {
                    self.stats.source_errors += 1;
                    if last_error_log.map_or(true, |at| at.elapsed() >= HEALTH_LOG_INTERVAL) {
                        log::warn!(
                            "camera '{}' frame error: {:#} ({} more since last report)",
                            self.camera,
                            err,
                            suppressed_errors
                        );
                        last_error_log = Some(Instant::now());
                        suppressed_errors = 0;
                    } else {
                        suppressed_errors += 1;
                    }
                    std::thread::sleep(SOURCE_ERROR_BACKOFF);
                }
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                let source_stats = source.stats();
                log::info!(
                    "vision health={} device={} frames={} found={} not_found={} source_errors={}",
                    source.is_healthy(),
                    source_stats.device,
                    self.stats.frames,
                    self.stats.found,
                    self.stats.not_found,
                    self.stats.source_errors
                );
                last_health_log = Instant::now();
            }
        }
        self.stats
    }

    /// One publishing pass for a frame: detect, compute, publish.
    pub fn run_cycle(&mut self, frame: &Frame) -> TargetMetrics {
        self.transition(LoopState::Publishing);
        self.stats.frames += 1;

        let boxes: Vec<BoundingBox> = match self
            .detector
            .detect(frame.pixels(), frame.width, frame.height)
        {
            Ok(outlines) => outlines.iter().map(|o| o.bounding_rect()).collect(),
            Err(err) => {
                self.stats.detector_errors += 1;
                log::warn!(
                    "detector '{}' failed on frame {}: {:#}",
                    self.detector.name(),
                    frame.sequence,
                    err
                );
                Vec::new()
            }
        };

        let metrics = compute(&boxes, self.geometry.width, self.geometry.height);
        if metrics.found {
            self.stats.found += 1;
        } else {
            self.stats.not_found += 1;
        }
        log::debug!(
            "frame {}: {} outlines, {}, displacement={}",
            frame.sequence,
            boxes.len(),
            metrics.status_text(),
            metrics.displacement
        );

        if let Err(err) = self.publisher.publish(&metrics) {
            self.stats.publish_errors += 1;
            log::warn!("telemetry publish failed: {:#}", err);
        }

        self.transition(LoopState::Idle);
        metrics
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            log::trace!("{:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

/// Handle to a running worker thread.
pub struct LoopHandle {
    handle: JoinHandle<LoopStats>,
}

impl LoopHandle {
    /// Wait for the worker to return. Live cameras never do.
    pub fn join(self) -> Result<LoopStats> {
        self.handle
            .join()
            .map_err(|_| anyhow!("vision thread panicked"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Outline, ScriptedDetector};
    use crate::telemetry::{MemoryBus, FOUND, STATUS_TABLE, TARGET_DISPLACEMENT, VIDEO_TABLE};

    fn pair(dx: i32) -> Vec<Outline> {
        vec![
            Outline::from_box(BoundingBox::new(100 + dx, 0, 40, 40)),
            Outline::from_box(BoundingBox::new(180 + dx, 0, 40, 40)),
        ]
    }

    fn blank_frame(seq: u64) -> Frame {
        Frame::new(vec![0u8; 320 * 240 * 3], 320, 240, seq).unwrap()
    }

    fn worker(script: Vec<Vec<Outline>>) -> ProcessingLoop<MemoryBus> {
        ProcessingLoop::new(
            "front",
            FrameGeometry::new(320, 240, 30).unwrap(),
            Box::new(ScriptedDetector::new(script)),
            Arc::new(TelemetryPublisher::new(MemoryBus::new())),
        )
    }

    #[test]
    fn cycle_publishes_found_then_not_found() {
        let mut worker = worker(vec![pair(10), pair(0)[..1].to_vec()]);

        let metrics = worker.run_cycle(&blank_frame(1));
        assert!(metrics.found);
        assert_eq!(metrics.displacement, 20);
        worker
            .publisher
            .read(|bus| {
                assert_eq!(bus.number(VIDEO_TABLE, TARGET_DISPLACEMENT), Some(20.0));
                assert_eq!(bus.string(STATUS_TABLE, FOUND), Some("Rect Found"));
            })
            .unwrap();

        let metrics = worker.run_cycle(&blank_frame(2));
        assert!(!metrics.found);
        worker
            .publisher
            .read(|bus| {
                assert_eq!(bus.number(VIDEO_TABLE, TARGET_DISPLACEMENT), Some(0.0));
                assert_eq!(bus.string(STATUS_TABLE, FOUND), Some("Not Found"));
            })
            .unwrap();

        assert_eq!(worker.stats().found, 1);
        assert_eq!(worker.stats().not_found, 1);
        assert_eq!(worker.state(), LoopState::Idle);
    }

    struct BrokenDetector;

    impl ShapeDetector for BrokenDetector {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn detect(&mut self, _: &[u8], _: u32, _: u32) -> Result<Vec<Outline>> {
            Err(anyhow!("threshold failed"))
        }
    }

    #[test]
    fn detector_errors_publish_not_found() {
        let publisher = Arc::new(TelemetryPublisher::new(MemoryBus::new()));
        let mut worker = ProcessingLoop::new(
            "front",
            FrameGeometry::new(320, 240, 30).unwrap(),
            Box::new(BrokenDetector),
            publisher.clone(),
        );
        let metrics = worker.run_cycle(&blank_frame(1));
        assert!(!metrics.found);
        assert_eq!(worker.stats().detector_errors, 1);
        let status = publisher
            .read(|bus| bus.string(STATUS_TABLE, FOUND).map(str::to_string))
            .unwrap();
        assert_eq!(status.as_deref(), Some("Not Found"));
    }

    /// Source that fails a fixed number of reads, then ends.
    struct UnpluggedSource {
        failures_left: u32,
    }

    impl FrameSource for UnpluggedSource {
        fn connect(&mut self) -> Result<()> {
            Ok(())
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.failures_left == 0 {
                return Ok(None);
            }
            self.failures_left -= 1;
            Err(anyhow!("device unplugged"))
        }

        fn is_healthy(&self) -> bool {
            false
        }

        fn stats(&self) -> crate::ingest::SourceStats {
            crate::ingest::SourceStats {
                frames_captured: 0,
                device: "/dev/video9".to_string(),
            }
        }
    }

    #[test]
    fn failing_source_backs_off_between_reads() {
        let started = Instant::now();
        let stats = worker(Vec::new()).run(Box::new(UnpluggedSource { failures_left: 4 }));
        assert_eq!(stats.source_errors, 4);
        assert_eq!(stats.frames, 0);
        assert!(started.elapsed() >= SOURCE_ERROR_BACKOFF * 4);
    }
}
