use anyhow::{anyhow, Result};

use crate::detect::backend::ShapeDetector;
use crate::detect::outline::{Outline, Point};

/// Threshold and filter settings for `TapeDetector`.
///
/// HSV ranges use the 8-bit convention: hue 0..180, saturation and value 0..255.
#[derive(Clone, Debug, PartialEq)]
pub struct TapeDetectorParams {
    pub hue: [f64; 2],
    pub saturation: [f64; 2],
    pub value: [f64; 2],
    /// Minimum pixel count of a connected component.
    pub min_area: usize,
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
}

impl Default for TapeDetectorParams {
    fn default() -> Self {
        Self {
            hue: [0.0, 20.0],
            saturation: [100.0, 255.0],
            value: [100.0, 255.0],
            min_area: 20,
            min_width: 2,
            max_width: 1000,
            min_height: 2,
            max_height: 1000,
        }
    }
}

/// Retro-reflective tape detector: HSV threshold, 4-connected components,
/// boundary outline per component, size filter.
#[derive(Default)]
pub struct TapeDetector {
    params: TapeDetectorParams,
}

impl TapeDetector {
    pub fn new(params: TapeDetectorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TapeDetectorParams {
        &self.params
    }

    fn threshold(&self, pixels: &[u8]) -> Vec<bool> {
        pixels
            .chunks_exact(3)
            .map(|px| {
                let (h, s, v) = rgb_to_hsv(px[0], px[1], px[2]);
                in_range(h, self.params.hue)
                    && in_range(s, self.params.saturation)
                    && in_range(v, self.params.value)
            })
            .collect()
    }

    fn keep(&self, area: usize, outline: &Outline) -> bool {
        let rect = outline.bounding_rect();
        let (w, h) = (rect.width as u32, rect.height as u32);
        area >= self.params.min_area
            && (self.params.min_width..=self.params.max_width).contains(&w)
            && (self.params.min_height..=self.params.max_height).contains(&h)
    }
}

impl ShapeDetector for TapeDetector {
    fn name(&self) -> &'static str {
        "tape"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Outline>> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected,
                pixels.len()
            ));
        }

        let mask = self.threshold(pixels);
        let components = extract_components(&mask, width as usize, height as usize);
        Ok(components
            .into_iter()
            .filter(|(area, outline)| self.keep(*area, outline))
            .map(|(_, outline)| outline)
            .collect())
    }
}

fn in_range(value: f64, range: [f64; 2]) -> bool {
    value >= range[0] && value <= range[1]
}

/// 8-bit HSV: hue halved into 0..180.
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = max - min;
    let s = if max > 0.0 { diff / max * 255.0 } else { 0.0 };
    let mut h = if diff == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / diff
    } else if max == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }
    (h / 2.0, s, max)
}

/// Connected components of `mask` in raster order of their first pixel.
/// Returns (pixel count, boundary outline) per component.
fn extract_components(mask: &[bool], width: usize, height: usize) -> Vec<(usize, Outline)> {
    let mut visited = vec![false; mask.len()];
    let mut components = Vec::new();
    let mut stack = Vec::new();

    for start in 0..mask.len() {
        if !mask[start] || visited[start] {
            continue;
        }
        visited[start] = true;
        stack.push(start);
        let mut area = 0usize;
        let mut boundary = Vec::new();

        while let Some(idx) = stack.pop() {
            area += 1;
            let x = idx % width;
            let y = idx / width;
            let mut on_edge = false;

            let neighbours = [
                (x > 0).then(|| idx - 1),
                (x + 1 < width).then(|| idx + 1),
                (y > 0).then(|| idx - width),
                (y + 1 < height).then(|| idx + width),
            ];
            for neighbour in neighbours {
                match neighbour {
                    Some(n) if mask[n] => {
                        if !visited[n] {
                            visited[n] = true;
                            stack.push(n);
                        }
                    }
                    _ => on_edge = true,
                }
            }
            if on_edge {
                boundary.push(Point::new(x as i32, y as i32));
            }
        }

        components.push((area, Outline::new(boundary)));
    }

    components
}
