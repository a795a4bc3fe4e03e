//! Chat agent: tool-use detection and exchange orchestration

mod detector;
mod orchestrator;

pub use detector::{ToolDetector, TriggerDetector, TriggerRule};
pub use orchestrator::{Delivery, NoDelivery, Orchestrator};
