use thiserror::Error;

/// Fatal conditions that stop a layout run. Everything else degrades
/// gracefully and surfaces as a warning in the result.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayoutError {
    #[error("no roof contour found in image")]
    NoRoofDetected,
    #[error("roof mask area is zero")]
    ZeroAreaMask,
    #[error("fill percentage {0} must be between 30 and 90")]
    InvalidFillPercentage(f64),
    #[error("unknown panel size {0:?}, expected one of tiny, small, medium, large")]
    UnknownPanelSize(String),
    #[error("invalid value for {name}: {value} (must be finite and >= 0)")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("roof area must be positive and finite, got {0}")]
    InvalidRoofArea(f64),
}
