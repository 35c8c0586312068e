//! Physical unit to pixel conversion.
//!
//! Token geometry is authored in physical units (a character token is
//! 1.75 inches across) and only becomes pixels once a DPI is chosen.

use serde::{Deserialize, Serialize};

use crate::error::MeasurementError;

/// Default print resolution.
pub const DEFAULT_DPI: f64 = 300.0;

/// A physical (or pixel) length unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementUnit {
    /// Inches.
    #[default]
    Inches,
    /// Millimetres.
    Millimeters,
    /// Centimetres.
    Centimeters,
    /// Typographic points (1/72 inch).
    Points,
    /// Device pixels; DPI-independent.
    Pixels,
}

impl MeasurementUnit {
    /// How many of this unit make up one inch, or `None` for pixels.
    fn per_inch(self) -> Option<f64> {
        match self {
            Self::Inches => Some(1.0),
            Self::Millimeters => Some(25.4),
            Self::Centimeters => Some(2.54),
            Self::Points => Some(72.0),
            Self::Pixels => None,
        }
    }
}

fn check(value: f64, dpi: f64) -> Result<(), MeasurementError> {
    if !value.is_finite() {
        return Err(MeasurementError::NonFiniteValue(value));
    }
    if !dpi.is_finite() || dpi <= 0.0 {
        return Err(MeasurementError::InvalidDpi(dpi));
    }
    Ok(())
}

/// Convert a length to pixels at the given DPI.
pub fn to_pixels(value: f64, unit: MeasurementUnit, dpi: f64) -> Result<f64, MeasurementError> {
    check(value, dpi)?;
    Ok(match unit.per_inch() {
        Some(per_inch) => value / per_inch * dpi,
        None => value,
    })
}

/// Convert a pixel length back to `unit` at the given DPI.
pub fn to_unit(px: f64, unit: MeasurementUnit, dpi: f64) -> Result<f64, MeasurementError> {
    check(px, dpi)?;
    Ok(match unit.per_inch() {
        Some(per_inch) => px / dpi * per_inch,
        None => px,
    })
}

/// A length paired with its unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub unit: MeasurementUnit,
}

impl Measurement {
    /// Create a measurement.
    pub const fn new(value: f64, unit: MeasurementUnit) -> Self {
        Self { value, unit }
    }

    /// A length in inches.
    pub const fn inches(value: f64) -> Self {
        Self::new(value, MeasurementUnit::Inches)
    }

    /// A length in millimetres.
    pub const fn millimeters(value: f64) -> Self {
        Self::new(value, MeasurementUnit::Millimeters)
    }

    /// Convert to pixels at `dpi`.
    pub fn to_pixels(self, dpi: f64) -> Result<f64, MeasurementError> {
        to_pixels(self.value, self.unit, dpi)
    }
}

/// Diameter of a circular token in whole pixels.
///
/// Always at least one pixel so a surface can be allocated.
pub fn token_diameter_px(diameter: Measurement, dpi: f64) -> Result<u32, MeasurementError> {
    let px = diameter.to_pixels(dpi)?;
    Ok(px.round().clamp(1.0, u32::MAX as f64) as u32)
}
