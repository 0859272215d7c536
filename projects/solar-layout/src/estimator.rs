use crate::error::LayoutError;
use image::RgbImage;

/// Source of the real-world roof area the layout is calibrated against.
pub trait RoofAreaEstimator {
    fn roof_area_m2(&self, image: &RgbImage) -> Result<f64, LayoutError>;
}

/// Area known up front, e.g. from a survey or the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedRoofArea(pub f64);

impl RoofAreaEstimator for FixedRoofArea {
    fn roof_area_m2(&self, _image: &RgbImage) -> Result<f64, LayoutError> {
        if self.0.is_finite() && self.0 > 0.0 {
            Ok(self.0)
        } else {
            Err(LayoutError::InvalidRoofArea(self.0))
        }
    }
}
