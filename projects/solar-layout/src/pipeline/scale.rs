use crate::error::LayoutError;
use crate::pipeline::types::{RoofMask, ScaleFactor};

/// Metres per pixel such that the mask's pixel count maps onto `roof_area_m2`.
pub fn calibrate(roof_area_m2: f64, pixel_count: usize) -> Result<ScaleFactor, LayoutError> {
    if !roof_area_m2.is_finite() || roof_area_m2 <= 0.0 {
        return Err(LayoutError::InvalidRoofArea(roof_area_m2));
    }
    if pixel_count == 0 {
        return Err(LayoutError::ZeroAreaMask);
    }
    Ok(ScaleFactor {
        meters_per_pixel: (roof_area_m2 / pixel_count as f64).sqrt(),
    })
}

pub fn calibrate_mask(roof_area_m2: f64, mask: &RoofMask) -> Result<ScaleFactor, LayoutError> {
    calibrate(roof_area_m2, mask.pixel_count())
}
