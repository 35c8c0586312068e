//! CPU-side RGBA bitmap used for every layer of a token.
//!
//! [`ImageBuffer`] wraps an `image::RgbaImage`. Decoded art, procedural
//! tiles and the finished token canvas are all stored this way so layers
//! can be blended pixel by pixel without format conversions.
//!
//! # Example
//!
//! ```ignore
//! use grimoire_tokens_render::{ImageBuffer, ImageBlendMode, OutputFormat, ResizeFilter};
//!
//! let art = ImageBuffer::from_bytes(&png_bytes)?
//!     .resize_to_fill(525, 525, ResizeFilter::CatmullRom);
//!
//! let mut canvas = ImageBuffer::new(525, 525);
//! canvas.composite(&art, 0, 0, ImageBlendMode::Normal, 1.0);
//! let webp = canvas.encode(OutputFormat::WebP)?;
//! ```

use std::io::Cursor;

use image::{ImageFormat as ImgFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};
use crate::types::Color;

/// Resampling filter for resize operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeFilter {
    /// Nearest neighbor interpolation. Fast but pixelated.
    Nearest,
    /// Bilinear interpolation. Balanced speed and quality.
    #[default]
    Triangle,
    /// Catmull-Rom bicubic interpolation. Good quality.
    CatmullRom,
    /// Lanczos interpolation with window size 3. High quality.
    Lanczos3,
}

impl ResizeFilter {
    fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            ResizeFilter::Nearest => image::imageops::FilterType::Nearest,
            ResizeFilter::Triangle => image::imageops::FilterType::Triangle,
            ResizeFilter::CatmullRom => image::imageops::FilterType::CatmullRom,
            ResizeFilter::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// Blend mode used when compositing one layer onto another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageBlendMode {
    /// Standard source-over alpha blending.
    #[default]
    Normal,
    /// Multiplicative blending; darkens.
    Multiply,
    /// Screen blending; lightens.
    Screen,
    /// Multiply in shadows, screen in highlights (keyed on the destination).
    Overlay,
    /// Gentler overlay, W3C compositing formula.
    SoftLight,
}

/// Output format for image encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// PNG format (lossless).
    Png,
    /// WebP format (lossless).
    WebP,
}

impl OutputFormat {
    fn to_image_format(self) -> ImgFormat {
        match self {
            OutputFormat::Png => ImgFormat::Png,
            OutputFormat::WebP => ImgFormat::WebP,
        }
    }

    /// The conventional file extension, without a dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }
}

/// An RGBA8 bitmap.
#[derive(Clone, PartialEq)]
pub struct ImageBuffer {
    inner: RgbaImage,
}

impl ImageBuffer {
    // ========================================================================
    // CONSTRUCTION
    // ========================================================================

    /// Create a new transparent image with the specified dimensions.
    #[inline]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            inner: RgbaImage::new(width, height),
        }
    }

    /// Create an image filled with a solid color.
    pub fn from_color(width: u32, height: u32, color: Color) -> Self {
        Self {
            inner: RgbaImage::from_pixel(width, height, color.to_pixel()),
        }
    }

    /// Decode an image from encoded bytes (PNG, WebP, JPEG, GIF...).
    pub fn from_bytes(bytes: &[u8]) -> RenderResult<Self> {
        let img = image::load_from_memory(bytes).map_err(|e| RenderError::Decode(e.to_string()))?;
        Ok(Self {
            inner: img.to_rgba8(),
        })
    }

    /// Create an image from raw RGBA pixel data.
    ///
    /// The data must be exactly `width * height * 4` bytes, row-major.
    pub fn from_rgba(data: &[u8], width: u32, height: u32) -> RenderResult<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if data.len() != expected {
            return Err(RenderError::InvalidPixelData {
                expected,
                actual: data.len(),
            });
        }
        let rgba = RgbaImage::from_raw(width, height, data.to_vec()).ok_or(
            RenderError::InvalidPixelData {
                expected,
                actual: data.len(),
            },
        )?;
        Ok(Self { inner: rgba })
    }

    /// Wrap an existing `RgbaImage`.
    #[inline]
    pub fn from_rgba_image(img: RgbaImage) -> Self {
        Self { inner: img }
    }

    // ========================================================================
    // PROPERTIES
    // ========================================================================

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    /// Dimensions as a (width, height) tuple.
    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    /// Estimated memory footprint: width × height × 4.
    #[inline]
    pub fn size_bytes(&self) -> usize {
        (self.width() as usize) * (self.height() as usize) * 4
    }

    /// Get the color at a pixel, or `None` if out of bounds.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Color> {
        self.inner.get_pixel_checked(x, y).map(|p| Color::from(*p))
    }

    /// Set the color at a pixel. Out-of-bounds writes are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if let Some(p) = self.inner.get_pixel_mut_checked(x, y) {
            *p = color.to_pixel();
        }
    }

    /// Borrow the underlying image.
    #[inline]
    pub fn as_rgba(&self) -> &RgbaImage {
        &self.inner
    }

    /// Mutably borrow the underlying image.
    #[inline]
    pub fn as_rgba_mut(&mut self) -> &mut RgbaImage {
        &mut self.inner
    }

    /// Raw RGBA bytes, row-major.
    #[inline]
    pub fn as_raw(&self) -> &[u8] {
        self.inner.as_raw()
    }

    /// Consume this buffer and return the underlying image.
    #[inline]
    pub fn into_inner(self) -> RgbaImage {
        self.inner
    }

    // ========================================================================
    // GEOMETRY
    // ========================================================================

    /// Resize to exact dimensions, ignoring aspect ratio.
    #[must_use]
    pub fn resize(&self, width: u32, height: u32, filter: ResizeFilter) -> Self {
        Self {
            inner: image::imageops::resize(&self.inner, width, height, filter.to_image_filter()),
        }
    }

    /// Aspect-fill: centre-crop the source to the target aspect ratio, then
    /// scale the crop to exactly `width` x `height`.
    #[must_use]
    pub fn resize_to_fill(&self, width: u32, height: u32, filter: ResizeFilter) -> Self {
        let (sw, sh) = self.dimensions();
        if sw == 0 || sh == 0 || width == 0 || height == 0 {
            return Self::new(width, height);
        }

        let target_aspect = width as f64 / height as f64;
        let (crop_w, crop_h) = if sw as f64 / sh as f64 > target_aspect {
            (((sh as f64 * target_aspect).round() as u32).clamp(1, sw), sh)
        } else {
            (sw, ((sw as f64 / target_aspect).round() as u32).clamp(1, sh))
        };
        let x = (sw - crop_w) / 2;
        let y = (sh - crop_h) / 2;

        let cropped = image::imageops::crop_imm(&self.inner, x, y, crop_w, crop_h).to_image();
        if (crop_w, crop_h) == (width, height) {
            return Self { inner: cropped };
        }
        Self {
            inner: image::imageops::resize(&cropped, width, height, filter.to_image_filter()),
        }
    }

    /// Resize to fit inside the box while preserving aspect ratio.
    #[must_use]
    pub fn resize_to_fit(&self, max_width: u32, max_height: u32, filter: ResizeFilter) -> Self {
        let (sw, sh) = self.dimensions();
        if sw == 0 || sh == 0 {
            return self.clone();
        }
        let scale = f64::min(max_width as f64 / sw as f64, max_height as f64 / sh as f64);
        let w = ((sw as f64 * scale).round() as u32).max(1);
        let h = ((sh as f64 * scale).round() as u32).max(1);
        self.resize(w, h, filter)
    }

    // ========================================================================
    // PIXEL OPERATIONS
    // ========================================================================

    /// Apply a function to each pixel in place. The closure receives the
    /// pixel coordinates and current value.
    pub fn map_pixels_in_place<F>(&mut self, mut f: F)
    where
        F: FnMut(u32, u32, Rgba<u8>) -> Rgba<u8>,
    {
        for (x, y, p) in self.inner.enumerate_pixels_mut() {
            *p = f(x, y, *p);
        }
    }

    // ========================================================================
    // COMPOSITION
    // ========================================================================

    /// Composite `other` onto this image at (x, y).
    ///
    /// `opacity` (0.0 to 1.0) is multiplied with the source alpha. Pixels
    /// falling outside this image are skipped.
    pub fn composite(
        &mut self,
        other: &ImageBuffer,
        x: i64,
        y: i64,
        mode: ImageBlendMode,
        opacity: f32,
    ) {
        if !(opacity > 0.0) {
            return;
        }
        let opacity = opacity.min(1.0);
        let (w, h) = (self.width() as i64, self.height() as i64);

        for (ox, oy, src) in other.inner.enumerate_pixels() {
            let dx = x.saturating_add(i64::from(ox));
            let dy = y.saturating_add(i64::from(oy));
            if dx < 0 || dy < 0 || dx >= w || dy >= h {
                continue;
            }
            let dst = self.inner.get_pixel_mut(dx as u32, dy as u32);
            *dst = blend_pixels(*dst, *src, mode, opacity);
        }
    }

    // ========================================================================
    // EXPORT
    // ========================================================================

    /// Encode the image to bytes in the specified format.
    pub fn encode(&self, format: OutputFormat) -> RenderResult<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.inner
            .write_to(&mut buffer, format.to_image_format())
            .map_err(|e| RenderError::Encode(e.to_string()))?;
        Ok(buffer.into_inner())
    }

    /// Encode the image as PNG.
    pub fn to_png(&self) -> RenderResult<Vec<u8>> {
        self.encode(OutputFormat::Png)
    }

    /// Encode the image as lossless WebP.
    pub fn to_webp(&self) -> RenderResult<Vec<u8>> {
        self.encode(OutputFormat::WebP)
    }
}

impl std::fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Separable blend function B(cb, cs) for the non-normal modes.
fn blend_channel(mode: ImageBlendMode, cb: f32, cs: f32) -> f32 {
    match mode {
        ImageBlendMode::Normal => cs,
        ImageBlendMode::Multiply => cb * cs,
        ImageBlendMode::Screen => cb + cs - cb * cs,
        ImageBlendMode::Overlay => {
            if cb <= 0.5 {
                2.0 * cb * cs
            } else {
                1.0 - 2.0 * (1.0 - cb) * (1.0 - cs)
            }
        }
        ImageBlendMode::SoftLight => {
            if cs <= 0.5 {
                cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb)
            } else {
                let d = if cb <= 0.25 {
                    ((16.0 * cb - 12.0) * cb + 4.0) * cb
                } else {
                    cb.sqrt()
                };
                cb + (2.0 * cs - 1.0) * (d - cb)
            }
        }
    }
}

/// Blend a source pixel over a destination pixel.
///
/// Implements the W3C compositing model: the blended colour is mixed with
/// the source by the backdrop alpha, then composited source-over.
pub(crate) fn blend_pixels(
    dst: Rgba<u8>,
    src: Rgba<u8>,
    mode: ImageBlendMode,
    opacity: f32,
) -> Rgba<u8> {
    let [sr, sg, sb, sa] = src.0;
    let [dr, dg, db, da] = dst.0;

    let src_a = sa as f32 / 255.0 * opacity;
    let dst_a = da as f32 / 255.0;

    if src_a <= 0.0 {
        return dst;
    }

    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |s: u8, d: u8| -> u8 {
        let cs = s as f32 / 255.0;
        let cb = d as f32 / 255.0;
        let mixed = (1.0 - dst_a) * cs + dst_a * blend_channel(mode, cb, cs);
        let result = (src_a * mixed + dst_a * cb * (1.0 - src_a)) / out_a;
        (result * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(sr, dr),
        channel(sg, dg),
        channel(sb, db),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}
