//! Telemetry publication.
//!
//! Target metrics are written to a key/value bus read by the robot
//! controller. Channels live in two tables:
//!
//! | table          | key                      | value                     |
//! |----------------|--------------------------|---------------------------|
//! | videoInfo      | TargetDisplacement       | pixels, 0 if not found    |
//! | videoInfo      | Target Distance Width    | feet, -1 if not found     |
//! | videoInfo      | Input to the Drive       | steering scalar           |
//! | videoInfo      | Target Distance Height   | feet                      |
//! | videoInfo      | Avg. Distance            | feet                      |
//! | videoInfo      | Avg. Distance in cm      | centimetres               |
//! | SmartDashboard | Found                    | "Rect Found" / "Not Found"|
//!
//! Every write belonging to one metrics record happens under a single
//! publication lock, so cycles never interleave.

mod memory;
mod mqtt;

use anyhow::{anyhow, Result};
use std::sync::Mutex;

use crate::geometry::TargetMetrics;

pub use memory::{BusValue, MemoryBus};
pub use mqtt::{parse_broker_endpoint, team_broker_addr, BrokerEndpoint, MqttBus, MqttBusOptions};

pub const VIDEO_TABLE: &str = "videoInfo";
pub const STATUS_TABLE: &str = "SmartDashboard";

pub const TARGET_DISPLACEMENT: &str = "TargetDisplacement";
pub const TARGET_DISTANCE_WIDTH: &str = "Target Distance Width";
pub const DRIVE_INPUT: &str = "Input to the Drive";
pub const TARGET_DISTANCE_HEIGHT: &str = "Target Distance Height";
pub const AVG_DISTANCE: &str = "Avg. Distance";
pub const AVG_DISTANCE_CM: &str = "Avg. Distance in cm";
pub const FOUND: &str = "Found";

/// Key/value store the metrics are written to.
pub trait TelemetryBus: Send {
    fn put_number(&mut self, table: &str, key: &str, value: f64) -> Result<()>;

    fn put_string(&mut self, table: &str, key: &str, value: &str) -> Result<()>;
}

/// Writes metrics records to a bus under the publication lock.
pub struct TelemetryPublisher<B: TelemetryBus> {
    bus: Mutex<B>,
}

impl<B: TelemetryBus> TelemetryPublisher<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus: Mutex::new(bus),
        }
    }

    /// Write one metrics record while holding the publication lock.
    ///
    /// Every channel is attempted even when one write fails, and the status
    /// channel is written last. The first failure is returned afterwards.
    pub fn publish(&self, metrics: &TargetMetrics) -> Result<()> {
        let mut bus = self
            .bus
            .lock()
            .map_err(|_| anyhow!("publication lock poisoned"))?;

        let numbers = [
            (TARGET_DISPLACEMENT, metrics.displacement as f64),
            (TARGET_DISTANCE_WIDTH, metrics.distance_width),
            (DRIVE_INPUT, metrics.drive_input_x as f64),
            (TARGET_DISTANCE_HEIGHT, metrics.distance_height),
            (AVG_DISTANCE, metrics.distance_avg),
            (AVG_DISTANCE_CM, metrics.distance_avg_cm),
        ];
        let mut first_err = None;
        for (key, value) in numbers {
            if let Err(err) = bus.put_number(VIDEO_TABLE, key, value) {
                first_err.get_or_insert(err);
            }
        }
        if let Err(err) = bus.put_string(STATUS_TABLE, FOUND, metrics.status_text()) {
            first_err.get_or_insert(err);
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Run `f` against the bus while holding the publication lock.
    pub fn read<T>(&self, f: impl FnOnce(&B) -> T) -> Result<T> {
        let bus = self
            .bus
            .lock()
            .map_err(|_| anyhow!("publication lock poisoned"))?;
        Ok(f(&bus))
    }

    pub fn into_inner(self) -> Result<B> {
        self.bus
            .into_inner()
            .map_err(|_| anyhow!("publication lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use crate::geometry::compute;

    #[test]
    fn found_record_writes_every_channel() {
        let publisher = TelemetryPublisher::new(MemoryBus::new());
        let boxes = [
            BoundingBox::new(100, 0, 40, 40),
            BoundingBox::new(180, 0, 40, 40),
        ];
        let metrics = compute(&boxes, 320, 240);
        publisher.publish(&metrics).unwrap();

        publisher
            .read(|bus| {
                assert_eq!(bus.string(STATUS_TABLE, FOUND), Some("Rect Found"));
                assert_eq!(bus.number(VIDEO_TABLE, TARGET_DISPLACEMENT), Some(0.0));
                assert_eq!(bus.number(VIDEO_TABLE, DRIVE_INPUT), Some(39.0));
                assert_eq!(
                    bus.number(VIDEO_TABLE, TARGET_DISTANCE_WIDTH),
                    Some(metrics.distance_width)
                );
                assert_eq!(
                    bus.number(VIDEO_TABLE, AVG_DISTANCE_CM),
                    Some(metrics.distance_avg_cm)
                );
                assert_eq!(bus.len(), 7);
            })
            .unwrap();
    }

    #[test]
    fn not_found_record_uses_fallbacks() {
        let publisher = TelemetryPublisher::new(MemoryBus::new());
        publisher.publish(&compute(&[], 320, 240)).unwrap();

        let bus = publisher.into_inner().unwrap();
        assert_eq!(bus.string(STATUS_TABLE, FOUND), Some("Not Found"));
        assert_eq!(bus.number(VIDEO_TABLE, TARGET_DISPLACEMENT), Some(0.0));
        assert_eq!(bus.number(VIDEO_TABLE, TARGET_DISTANCE_WIDTH), Some(-1.0));
    }

    struct FailingBus;

    impl TelemetryBus for FailingBus {
        fn put_number(&mut self, _: &str, key: &str, _: f64) -> Result<()> {
            Err(anyhow!("bus rejected {}", key))
        }

        fn put_string(&mut self, _: &str, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
    }

    /// Memory bus that rejects writes to selected keys and records write order.
    struct FlakyBus {
        inner: MemoryBus,
        reject: Vec<&'static str>,
        order: Vec<String>,
    }

    impl FlakyBus {
        fn rejecting(reject: Vec<&'static str>) -> Self {
            Self {
                inner: MemoryBus::new(),
                reject,
                order: Vec::new(),
            }
        }
    }

    impl TelemetryBus for FlakyBus {
        fn put_number(&mut self, table: &str, key: &str, value: f64) -> Result<()> {
            self.order.push(key.to_string());
            if self.reject.iter().any(|r| *r == key) {
                return Err(anyhow!("queue full for {}", key));
            }
            self.inner.put_number(table, key, value)
        }

        fn put_string(&mut self, table: &str, key: &str, value: &str) -> Result<()> {
            self.order.push(key.to_string());
            if self.reject.iter().any(|r| *r == key) {
                return Err(anyhow!("queue full for {}", key));
            }
            self.inner.put_string(table, key, value)
        }
    }

    #[test]
    fn failed_write_does_not_skip_remaining_channels() {
        let publisher = TelemetryPublisher::new(FlakyBus::rejecting(Vec::new()));
        publisher.publish(&TargetMetrics::not_found()).unwrap();

        let boxes = [
            BoundingBox::new(110, 0, 40, 40),
            BoundingBox::new(190, 0, 40, 40),
        ];
        let found = compute(&boxes, 320, 240);
        let mut bus = publisher.into_inner().unwrap();
        bus.reject = vec![TARGET_DISTANCE_WIDTH];
        bus.order.clear();
        let publisher = TelemetryPublisher::new(bus);

        let err = publisher.publish(&found).unwrap_err();
        assert!(err.to_string().contains(TARGET_DISTANCE_WIDTH));

        let bus = publisher.into_inner().unwrap();
        assert_eq!(bus.order.len(), 7);
        assert_eq!(bus.order.last().map(String::as_str), Some(FOUND));
        assert_eq!(bus.inner.string(STATUS_TABLE, FOUND), Some("Rect Found"));
        assert_eq!(bus.inner.number(VIDEO_TABLE, TARGET_DISPLACEMENT), Some(20.0));
        assert_eq!(
            bus.inner.number(VIDEO_TABLE, TARGET_DISTANCE_HEIGHT),
            Some(found.distance_height)
        );
        assert_eq!(
            bus.inner.number(VIDEO_TABLE, AVG_DISTANCE_CM),
            Some(found.distance_avg_cm)
        );
    }

    #[test]
    fn bus_errors_propagate() {
        let publisher = TelemetryPublisher::new(FailingBus);
        let err = publisher.publish(&TargetMetrics::not_found()).unwrap_err();
        assert!(err.to_string().contains("TargetDisplacement"));
    }
}
