//! Target geometry from a detected tape pair.
//!
//! A target is reported only when the detector yields exactly two outlines.
//! Any other count is the normal "not found" state, never an error.
//!
//! Known defects, reproduced as published to the robot controller:
//! - The half field-of-view angle `68.5 / 2` is passed to `tan` as radians.
//! - The drive input is `r.width - (W / 2) / (W / 2)`, i.e. `r.width - 1`.
//! - The height term of the average distance uses `tan(68.5)` rather than
//!   `tan(68.5 / 2)`.

use crate::detect::BoundingBox;

/// Physical width of one tape strip, inches.
pub const TARGET_WIDTH_IN: f64 = 10.15;
/// Physical height of one tape strip, inches.
pub const TARGET_HEIGHT_IN: f64 = 5.5;
/// Camera field of view, degrees.
pub const FIELD_OF_VIEW: f64 = 68.5;
/// Feet to centimetres, as calibrated on the robot.
pub const FEET_TO_CM: f64 = 30.4;

pub const NOT_FOUND_DISTANCE: f64 = -1.0;

/// Metrics computed for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetMetrics {
    /// Summed horizontal offset of both boxes from frame center, pixels.
    pub displacement: i64,
    /// Feet.
    pub distance_width: f64,
    /// Feet.
    pub distance_height: f64,
    /// Feet.
    pub distance_avg: f64,
    pub distance_avg_cm: f64,
    pub drive_input_x: i64,
    pub found: bool,
}

impl TargetMetrics {
    /// Fallback record published when no target pair was detected.
    pub fn not_found() -> Self {
        Self {
            displacement: 0,
            distance_width: NOT_FOUND_DISTANCE,
            distance_height: NOT_FOUND_DISTANCE,
            distance_avg: NOT_FOUND_DISTANCE,
            distance_avg_cm: NOT_FOUND_DISTANCE,
            drive_input_x: 0,
            found: false,
        }
    }

    pub fn status_text(&self) -> &'static str {
        if self.found {
            "Rect Found"
        } else {
            "Not Found"
        }
    }
}

/// Compute target metrics from the detector's bounding boxes.
pub fn compute(outlines: &[BoundingBox], frame_width: u32, frame_height: u32) -> TargetMetrics {
    let [r, r2] = outlines else {
        return TargetMetrics::not_found();
    };

    let w = frame_width as i64;
    let h = frame_height as f64;
    let half_w = w / 2;

    let displacement =
        (r.x as i64 + r.width as i64 / 2 - half_w) + (r2.x as i64 + r2.width as i64 / 2 - half_w);
    let drive_input_x = r.width as i64 - half_w.checked_div(half_w).unwrap_or(0);

    let half_fov_tan = (FIELD_OF_VIEW / 2.0).tan();
    let full_fov_tan = FIELD_OF_VIEW.tan();
    let width_ft = TARGET_WIDTH_IN / 12.0;
    let height_ft = TARGET_HEIGHT_IN / 12.0;

    let distance_width = width_ft * w as f64 / (2.0 * r.width as f64 * half_fov_tan);
    let distance_height = height_ft * h / (2.0 * r.height as f64 * half_fov_tan);
    let distance_avg = (width_ft * w as f64 / (2.0 * r.width as f64 * half_fov_tan)
        + height_ft * h / (2.0 * r.height as f64 * full_fov_tan))
        / 2.0;
    let distance_avg_cm = distance_avg * FEET_TO_CM;

    TargetMetrics {
        displacement,
        distance_width,
        distance_height,
        distance_avg,
        distance_avg_cm,
        drive_input_x,
        found: true,
    }
}
