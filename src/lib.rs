//! Vision telemetry agent
//!
//! Runs on a coprocessor next to a robot controller. Reads a device config,
//! starts the configured cameras, finds a pair of retro-reflective tape
//! targets in each frame and publishes target metrics to a key/value
//! telemetry bus.
//!
//! # Module Structure
//!
//! - `config`: device configuration file (`/boot/frc.json`)
//! - `camera`: camera bring-up from configured settings
//! - `ingest`: frame sources (synthetic stub, V4L2)
//! - `frame`: frame and geometry types
//! - `detect`: outline detection
//! - `geometry`: target displacement and distance estimates
//! - `telemetry`: publication to the telemetry bus
//! - `pipeline`: the per-camera processing loop

pub mod camera;
pub mod config;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod pipeline;
pub mod telemetry;

pub use camera::{CameraManager, CameraSet, CameraStream, StartedCamera};
pub use config::{read_config, CameraSettings, NtMode, VisionConfig, DEFAULT_CONFIG_PATH};
pub use detect::{BoundingBox, Outline, ShapeDetector, TapeDetector};
pub use frame::{Frame, FrameGeometry};
pub use geometry::{compute, TargetMetrics};
pub use ingest::{open_source, FrameSource, SyntheticSource};
pub use pipeline::{LoopHandle, LoopStats, ProcessingLoop};
pub use telemetry::{MemoryBus, MqttBus, MqttBusOptions, TelemetryBus, TelemetryPublisher};
