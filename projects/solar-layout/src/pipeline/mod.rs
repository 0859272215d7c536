// Rooftop layout pipeline stages

pub mod geometry;
pub mod mask;
pub mod obstacles;
pub mod orchestrator;
pub mod packing;
pub mod polygon;
pub mod render;
pub mod report;
pub mod scale;
pub mod search;
pub mod types;
