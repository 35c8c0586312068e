//! Declarative description of a token's background.
//!
//! These types deserialize directly from the settings the user edits
//! (camelCase keys, hex colors), so a style can be stored and reloaded
//! unchanged.

use serde::{Deserialize, Serialize};

use crate::image_buffer::ImageBlendMode;
use crate::measurement::MeasurementUnit;
use crate::types::Color;

/// Where the background's pixels come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Solid color or gradient.
    #[default]
    Styled,
    /// A resolved image, aspect-filled into the token.
    Image,
}

/// Fill used for styled backgrounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    #[default]
    Solid,
    Gradient,
}

/// Gradient geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientType {
    /// Along a line; `rotation` is the angle.
    #[default]
    Linear,
    /// Outward from the centre; `rotation` is ignored.
    Radial,
    /// Around the centre; `rotation` is the start angle.
    Conic,
}

/// Two-color gradient settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GradientSettings {
    #[serde(rename = "type")]
    pub gradient_type: GradientType,
    pub color_start: Color,
    pub color_end: Color,
    /// Degrees, clockwise from the positive x axis.
    pub rotation: f32,
}

impl Default for GradientSettings {
    fn default() -> Self {
        Self {
            gradient_type: GradientType::Linear,
            color_start: Color::from_rgba8(0x2B, 0x1D, 0x0E, 255),
            color_end: Color::from_rgba8(0x8A, 0x6A, 0x3C, 255),
            rotation: 0.0,
        }
    }
}

/// Tonal adjustments.
///
/// Brightness, contrast and saturation are percentages where 100 leaves
/// the image unchanged. Vibrance runs from -100 to 100, 0 is neutral.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LightSettings {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub vibrance: f32,
}

impl LightSettings {
    /// Whether every adjustment is at its neutral value.
    pub fn is_neutral(&self) -> bool {
        self.brightness == 100.0
            && self.contrast == 100.0
            && self.saturation == 100.0
            && self.vibrance == 0.0
    }
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            brightness: 100.0,
            contrast: 100.0,
            saturation: 100.0,
            vibrance: 0.0,
        }
    }
}

/// Vignette and inner glow. Intensities and the glow radius are
/// percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EffectSettings {
    pub vignette_enabled: bool,
    pub vignette_intensity: f32,
    pub vignette_color: Color,
    pub inner_glow_enabled: bool,
    pub inner_glow_radius: f32,
    pub inner_glow_intensity: f32,
    pub inner_glow_color: Color,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            vignette_enabled: false,
            vignette_intensity: 50.0,
            vignette_color: Color::BLACK,
            inner_glow_enabled: false,
            inner_glow_radius: 20.0,
            inner_glow_intensity: 50.0,
            inner_glow_color: Color::from_rgba8(0xFF, 0xE9, 0xB0, 255),
        }
    }
}

/// Procedural surface texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureType {
    #[default]
    None,
    /// Fine grain.
    Noise,
    /// Soft mottled fibres.
    Paper,
    /// Woven cross-hatch.
    Linen,
    /// Veined stone.
    Marble,
}

/// Texture overlay settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextureSettings {
    #[serde(rename = "type")]
    pub texture_type: TextureType,
    /// Percentage.
    pub intensity: f32,
    /// Feature size multiplier; 1.0 is the natural size.
    pub scale: f32,
    pub blend_mode: ImageBlendMode,
    pub seed: u64,
    pub randomize_seed_per_token: bool,
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self {
            texture_type: TextureType::None,
            intensity: 30.0,
            scale: 1.0,
            blend_mode: ImageBlendMode::Overlay,
            seed: 1,
            randomize_seed_per_token: false,
        }
    }
}

/// The complete background description of a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackgroundStyle {
    pub source_type: SourceType,
    pub mode: FillMode,
    pub solid_color: Color,
    pub gradient: GradientSettings,
    /// Reference string used when `source_type` is `image`.
    pub image_url: String,
    pub light: LightSettings,
    pub effects: EffectSettings,
    pub texture: TextureSettings,
}

impl Default for BackgroundStyle {
    fn default() -> Self {
        Self {
            source_type: SourceType::Styled,
            mode: FillMode::Solid,
            solid_color: Color::from_rgba8(0xE8, 0xDC, 0xC4, 255),
            gradient: GradientSettings::default(),
            image_url: String::new(),
            light: LightSettings::default(),
            effects: EffectSettings::default(),
            texture: TextureSettings::default(),
        }
    }
}

impl BackgroundStyle {
    /// A solid color background.
    pub fn solid(color: Color) -> Self {
        Self {
            solid_color: color,
            ..Self::default()
        }
    }

    /// A gradient background.
    pub fn gradient(gradient_type: GradientType, start: Color, end: Color, rotation: f32) -> Self {
        Self {
            mode: FillMode::Gradient,
            gradient: GradientSettings {
                gradient_type,
                color_start: start,
                color_end: end,
                rotation,
            },
            ..Self::default()
        }
    }

    /// An image background from a reference string.
    pub fn image(reference: impl Into<String>) -> Self {
        Self {
            source_type: SourceType::Image,
            image_url: reference.into(),
            ..Self::default()
        }
    }

    /// Replace the texture settings.
    #[must_use]
    pub fn with_texture(mut self, texture: TextureSettings) -> Self {
        self.texture = texture;
        self
    }

    /// Replace the effect settings.
    #[must_use]
    pub fn with_effects(mut self, effects: EffectSettings) -> Self {
        self.effects = effects;
        self
    }

    /// Replace the light settings.
    #[must_use]
    pub fn with_light(mut self, light: LightSettings) -> Self {
        self.light = light;
        self
    }
}

/// Placement of a character icon on the token.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IconSettings {
    /// Icon size relative to the token diameter.
    pub scale: f32,
    pub offset_x: f64,
    pub offset_y: f64,
    /// Unit of the offsets.
    pub unit: MeasurementUnit,
}

impl Default for IconSettings {
    fn default() -> Self {
        Self {
            scale: 0.7,
            offset_x: 0.0,
            offset_y: 0.0,
            unit: MeasurementUnit::Inches,
        }
    }
}
