pub mod config;
pub mod error;
pub mod estimator;
pub mod pipeline;
pub mod run_artifacts;
pub mod run_context;

pub use config::{FillReference, LayoutParams, ObstacleMode, PanelSpec, PANEL_CATALOG};
pub use error::LayoutError;
pub use estimator::{FixedRoofArea, RoofAreaEstimator};
pub use pipeline::orchestrator::{layout_panels, layout_with_estimator};
pub use pipeline::types::{LayoutResult, LayoutStats, Orientation, PlacedPanel};
