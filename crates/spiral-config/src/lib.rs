//! Process-wide runtime configuration shared by the SpiralTorch bounding crates.

pub mod tracing;
