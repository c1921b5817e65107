pub mod scripted;
pub mod tape;

pub use scripted::ScriptedDetector;
pub use tape::{TapeDetector, TapeDetectorParams};
