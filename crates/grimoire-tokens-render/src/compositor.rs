//! Layered drawing of a token surface.
//!
//! [`CompositingEngine::render`] produces the background disc of a token:
//!
//! 1. base fill: aspect-filled image, solid color or gradient
//! 2. light adjustments
//! 3. vignette and inner glow
//! 4. procedural texture
//! 5. anti-aliased circular clip
//!
//! Icons and pre-rasterised text are layered on afterwards with
//! [`CompositingEngine::place_icon`] and [`CompositingEngine::place_layer`].
//!
//! # Example
//!
//! ```ignore
//! use grimoire_tokens_render::{BackgroundSlot, BackgroundStyle, CompositingEngine, IconSettings};
//!
//! let engine = CompositingEngine::default();
//! let mut surface = engine.render(&BackgroundStyle::default(), 525, &BackgroundSlot::Styled)?;
//! engine.place_icon(&mut surface, &icon, &IconSettings::default(), 300.0)?;
//! let png = surface.canvas().to_png()?;
//! ```

use parking_lot::Mutex;

use crate::effects::{apply_effects, apply_light, clip_to_circle};
use crate::error::{RenderError, RenderResult};
use crate::gradient::render_gradient;
use crate::image_buffer::{ImageBlendMode, ImageBuffer, ResizeFilter};
use crate::image_cache::Bitmap;
use crate::logging::targets::COMPOSITOR as TARGET;
use crate::measurement::to_pixels;
use crate::style::{BackgroundStyle, FillMode, IconSettings, SourceType};
use crate::texture::{TextureCache, apply_texture};
use crate::types::Color;

/// Largest icon box, as a multiple of the token diameter.
pub const MAX_ICON_SCALE: f32 = 4.0;

/// State of the bitmap behind an image background.
#[derive(Debug, Clone)]
pub enum BackgroundSlot {
    /// The style is not image based; nothing to resolve.
    Styled,
    /// The bitmap is available.
    Ready(Bitmap),
    /// Still loading. A placeholder is drawn and the token redrawn later.
    Pending,
    /// Resolution failed. A placeholder is drawn.
    Failed,
}

impl BackgroundSlot {
    /// Whether a placeholder stands in for missing art.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, BackgroundSlot::Pending | BackgroundSlot::Failed)
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositorConfig {
    /// Fill used when image art is missing.
    pub placeholder_color: Color,
    /// Filter for scaling art.
    pub resize_filter: ResizeFilter,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            placeholder_color: Color::from_rgba8(0x3A, 0x3A, 0x3A, 255),
            resize_filter: ResizeFilter::CatmullRom,
        }
    }
}

impl CompositorConfig {
    /// Set the placeholder fill.
    #[must_use]
    pub fn with_placeholder_color(mut self, color: Color) -> Self {
        self.placeholder_color = color;
        self
    }

    /// Set the resize filter.
    #[must_use]
    pub fn with_resize_filter(mut self, filter: ResizeFilter) -> Self {
        self.resize_filter = filter;
        self
    }
}

/// A square canvas holding one circular token.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSurface {
    canvas: ImageBuffer,
}

impl TokenSurface {
    /// Diameter in pixels.
    pub fn diameter(&self) -> u32 {
        self.canvas.width()
    }

    /// The pixels drawn so far.
    pub fn canvas(&self) -> &ImageBuffer {
        &self.canvas
    }

    /// Take the finished pixels.
    pub fn into_canvas(self) -> ImageBuffer {
        self.canvas
    }
}

/// Draws token surfaces. Cheap to share; texture tiles are memoised
/// internally.
#[derive(Debug, Default)]
pub struct CompositingEngine {
    config: CompositorConfig,
    textures: Mutex<TextureCache>,
}

impl CompositingEngine {
    /// Create an engine.
    pub fn new(config: CompositorConfig) -> Self {
        Self {
            config,
            textures: Mutex::new(TextureCache::new()),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Number of texture tiles generated so far.
    pub fn textures_generated(&self) -> u64 {
        self.textures.lock().generated()
    }

    /// Draw the background disc of a token.
    pub fn render(
        &self,
        style: &BackgroundStyle,
        diameter: u32,
        background: &BackgroundSlot,
    ) -> RenderResult<TokenSurface> {
        if diameter == 0 {
            return Err(RenderError::InvalidDimensions {
                width: diameter,
                height: diameter,
            });
        }

        let mut canvas = self.base_layer(style, diameter, background);
        apply_light(&mut canvas, &style.light);
        apply_effects(&mut canvas, &style.effects);

        let seed = if style.texture.randomize_seed_per_token {
            rand::random::<u64>()
        } else {
            style.texture.seed
        };
        apply_texture(&mut canvas, &style.texture, seed, &mut self.textures.lock());

        clip_to_circle(&mut canvas);

        tracing::debug!(
            target: TARGET,
            diameter,
            source = ?style.source_type,
            mode = ?style.mode,
            placeholder = background.is_placeholder(),
            "rendered token background"
        );
        Ok(TokenSurface { canvas })
    }

    fn base_layer(&self, style: &BackgroundStyle, diameter: u32, background: &BackgroundSlot) -> ImageBuffer {
        match (style.source_type, background) {
            (SourceType::Image, BackgroundSlot::Ready(bitmap)) => {
                bitmap.resize_to_fill(diameter, diameter, self.config.resize_filter)
            }
            (SourceType::Image, _) => {
                ImageBuffer::from_color(diameter, diameter, self.config.placeholder_color)
            }
            (SourceType::Styled, _) => match style.mode {
                FillMode::Solid => ImageBuffer::from_color(diameter, diameter, style.solid_color),
                FillMode::Gradient => render_gradient(&style.gradient, diameter),
            },
        }
    }

    /// Draw an icon centred on the token, scaled and offset per `settings`.
    ///
    /// The icon is fitted (aspect preserved) into a square of
    /// `settings.scale` × diameter, then shifted by the physical offsets
    /// converted at `dpi`. Anything outside the disc is clipped.
    pub fn place_icon(
        &self,
        surface: &mut TokenSurface,
        icon: &ImageBuffer,
        settings: &IconSettings,
        dpi: f64,
    ) -> RenderResult<()> {
        let diameter = surface.diameter();
        let offset_x = to_pixels(settings.offset_x, settings.unit, dpi)?;
        let offset_y = to_pixels(settings.offset_y, settings.unit, dpi)?;

        let scale = if settings.scale.is_finite() {
            settings.scale.clamp(0.0, MAX_ICON_SCALE)
        } else {
            0.0
        };
        let box_size = ((diameter as f32 * scale).round() as u32).max(1);
        let fitted = icon.resize_to_fit(box_size, box_size, self.config.resize_filter);
        let x = (diameter as f64 - fitted.width() as f64) / 2.0 + offset_x;
        let y = (diameter as f64 - fitted.height() as f64) / 2.0 + offset_y;

        self.place_layer(
            surface,
            &fitted,
            x.round() as i64,
            y.round() as i64,
            ImageBlendMode::Normal,
            1.0,
        );
        Ok(())
    }

    /// Composite an arbitrary layer (text, overlay, accent) at pixel
    /// position (x, y), clipped to the disc.
    pub fn place_layer(
        &self,
        surface: &mut TokenSurface,
        layer: &ImageBuffer,
        x: i64,
        y: i64,
        mode: ImageBlendMode,
        opacity: f32,
    ) {
        surface.canvas.composite(layer, x, y, mode, opacity);
        clip_to_circle(&mut surface.canvas);
    }
}
