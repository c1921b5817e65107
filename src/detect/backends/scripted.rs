use std::collections::VecDeque;

use anyhow::Result;

use crate::detect::backend::ShapeDetector;
use crate::detect::outline::Outline;

/// Detector that replays a queue of outline sets, one per frame.
///
/// Once the queue is exhausted every frame yields no outlines.
#[derive(Default)]
pub struct ScriptedDetector {
    script: VecDeque<Vec<Outline>>,
}

impl ScriptedDetector {
    pub fn new(script: impl IntoIterator<Item = Vec<Outline>>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl ShapeDetector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<Outline>> {
        Ok(self.script.pop_front().unwrap_or_default())
    }
}
